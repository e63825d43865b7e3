//! Audit log domain models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::net::IpAddr;
use std::str::FromStr;
use uuid::Uuid;

db_enum! {
    /// Who performed an audited action.
    pub enum ActorType {
        User => "USER",
        System => "SYSTEM",
    }
}

macro_rules! audit_actions {
    ($($variant:ident => $text:literal),+ $(,)?) => {
        /// Audited actions, stored as dotted `resource.verb` strings.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum AuditAction {
            $(
                #[serde(rename = $text)]
                $variant,
            )+
        }

        impl AuditAction {
            pub const ALL: &'static [AuditAction] = &[$(AuditAction::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(AuditAction::$variant => $text,)+
                }
            }
        }

        impl FromStr for AuditAction {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.to_lowercase().as_str() {
                    $($text => Ok(AuditAction::$variant),)+
                    _ => Err(format!("Unknown audit action: {}", s)),
                }
            }
        }
    };
}

audit_actions! {
    TenantCreate => "tenant.create",
    TenantUpdate => "tenant.update",
    TenantSuspend => "tenant.suspend",
    TenantReactivate => "tenant.reactivate",
    UserCreate => "user.create",
    UserLogin => "user.login",
    MemberCreate => "member.create",
    MemberUpdate => "member.update",
    MemberDelete => "member.delete",
    MemberStatusChange => "member.status_change",
    PlanCreate => "plan.create",
    PlanUpdate => "plan.update",
    PlanDelete => "plan.delete",
    SubscriptionCreate => "subscription.create",
    SubscriptionStatusChange => "subscription.status_change",
    SubscriptionRenew => "subscription.renew",
    LocationCreate => "location.create",
    LocationUpdate => "location.update",
    LocationDelete => "location.delete",
    ClassCreate => "class.create",
    ClassUpdate => "class.update",
    ClassDelete => "class.delete",
    SessionCreate => "session.create",
    SessionUpdate => "session.update",
    SessionCancel => "session.cancel",
    BookingCancel => "booking.cancel",
    BookingDelete => "booking.delete",
    ClassPackCreate => "class_pack.create",
    ClassPackUpdate => "class_pack.update",
    ClassPackDelete => "class_pack.delete",
    ClassPackGrant => "class_pack.grant",
    ContractCreate => "contract.create",
    ContractStatusChange => "contract.status_change",
    InvoiceCreate => "invoice.create",
    InvoiceIssue => "invoice.issue",
    InvoicePayment => "invoice.payment",
    InvoiceCancel => "invoice.cancel",
    InvoiceDelete => "invoice.delete",
    DunningStart => "dunning.start",
    DunningStatusChange => "dunning.status_change",
    EquipmentConfigChange => "equipment.config_change",
    WearableConnectionChange => "wearable.connection_change",
    ChurnModelChange => "churn.model_change",
    ChurnInterventionChange => "churn.intervention_change",
    ForecastModelChange => "forecast.model_change",
    ForecastGenerate => "forecast.generate",
    ForecastActualRecord => "forecast.actual_record",
    ExportRequest => "export.request",
    ExportReview => "export.review",
    SecurityEventInvestigate => "security_event.investigate",
    TenantContractChange => "tenant_contract.change",
    ZatcaSubmit => "zatca.submit",
    SettingChange => "setting.change",
    MaintenanceChange => "maintenance.change",
    KioskChange => "kiosk.change",
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl AuditAction {
    /// Resource part of the dotted action name.
    pub fn resource(&self) -> &'static str {
        let s = self.as_str();
        s.split('.').next().unwrap_or(s)
    }
}

/// Represents a change to a field with old and new values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    pub old: Option<JsonValue>,
    pub new: Option<JsonValue>,
}

impl FieldChange {
    pub fn new(old: Option<JsonValue>, new: Option<JsonValue>) -> Self {
        Self { old, new }
    }
}

/// Audit log entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLog {
    pub id: Uuid,
    /// `None` for platform-level actions.
    pub tenant_id: Option<Uuid>,
    pub timestamp: DateTime<Utc>,
    pub actor: AuditActor,
    pub action: String,
    pub resource: AuditResource,
    pub changes: Option<HashMap<String, FieldChange>>,
    pub metadata: Option<AuditMetadata>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditActor {
    pub id: Option<Uuid>,
    #[serde(rename = "type")]
    pub actor_type: ActorType,
    pub email: Option<String>,
}

impl AuditActor {
    pub fn user(id: Uuid, email: Option<String>) -> Self {
        Self {
            id: Some(id),
            actor_type: ActorType::User,
            email,
        }
    }

    pub fn system() -> Self {
        Self {
            id: None,
            actor_type: ActorType::System,
            email: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditResource {
    #[serde(rename = "type")]
    pub resource_type: String,
    pub id: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditMetadata {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub request_id: Option<String>,
}

impl AuditMetadata {
    pub fn new(ip_address: Option<IpAddr>, user_agent: Option<String>, request_id: Option<String>) -> Self {
        Self {
            ip_address: ip_address.map(|ip| ip.to_string()),
            user_agent,
            request_id,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.ip_address.is_none() && self.user_agent.is_none() && self.request_id.is_none()
    }
}

/// Input for creating a new audit log entry.
#[derive(Debug, Clone)]
pub struct CreateAuditLogInput {
    pub tenant_id: Option<Uuid>,
    pub actor_id: Option<Uuid>,
    pub actor_type: ActorType,
    pub actor_email: Option<String>,
    pub action: AuditAction,
    pub resource_type: String,
    pub resource_id: Option<String>,
    pub resource_name: Option<String>,
    pub changes: Option<HashMap<String, FieldChange>>,
    pub ip_address: Option<IpAddr>,
    pub user_agent: Option<String>,
    pub request_id: Option<String>,
}

impl CreateAuditLogInput {
    /// Starts a system-actor entry; the resource type defaults to the action's resource.
    pub fn new(tenant_id: Option<Uuid>, action: AuditAction) -> Self {
        Self {
            tenant_id,
            actor_id: None,
            actor_type: ActorType::System,
            actor_email: None,
            action,
            resource_type: action.resource().to_string(),
            resource_id: None,
            resource_name: None,
            changes: None,
            ip_address: None,
            user_agent: None,
            request_id: None,
        }
    }

    pub fn with_user_actor(mut self, user_id: Uuid, email: Option<String>) -> Self {
        self.actor_id = Some(user_id);
        self.actor_type = ActorType::User;
        self.actor_email = email;
        self
    }

    pub fn with_resource_type(mut self, resource_type: impl Into<String>) -> Self {
        self.resource_type = resource_type.into();
        self
    }

    pub fn with_resource_id(mut self, id: impl Into<String>) -> Self {
        self.resource_id = Some(id.into());
        self
    }

    pub fn with_resource_name(mut self, name: impl Into<String>) -> Self {
        self.resource_name = Some(name.into());
        self
    }

    pub fn add_change(mut self, field: impl Into<String>, old: Option<JsonValue>, new: Option<JsonValue>) -> Self {
        let changes = self.changes.get_or_insert_with(HashMap::new);
        changes.insert(field.into(), FieldChange::new(old, new));
        self
    }

    pub fn with_request_context(
        mut self,
        ip_address: Option<IpAddr>,
        user_agent: Option<String>,
        request_id: Option<String>,
    ) -> Self {
        self.ip_address = ip_address;
        self.user_agent = user_agent;
        self.request_id = request_id;
        self
    }

    /// Metadata to persist, `None` when no request context was captured.
    pub fn metadata(&self) -> Option<AuditMetadata> {
        let metadata = AuditMetadata::new(self.ip_address, self.user_agent.clone(), self.request_id.clone());
        (!metadata.is_empty()).then_some(metadata)
    }
}

/// Query parameters for listing audit logs.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ListAuditLogsQuery {
    pub actor_id: Option<Uuid>,
    pub action: Option<String>,
    pub resource_type: Option<String>,
    pub resource_id: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_actor_type_round_trip() {
        assert_eq!(ActorType::User.to_string(), "USER");
        assert_eq!(ActorType::from_str("system").unwrap(), ActorType::System);
        assert!(ActorType::from_str("api_key").is_err());
    }

    #[test]
    fn test_audit_action_strings() {
        assert_eq!(
            AuditAction::from_str("booking.cancel").unwrap(),
            AuditAction::BookingCancel
        );
        assert_eq!(AuditAction::InvoicePayment.to_string(), "invoice.payment");
        assert!(AuditAction::from_str("device.assign").is_err());
        for action in AuditAction::ALL {
            assert_eq!(AuditAction::from_str(action.as_str()).unwrap(), *action);
        }
    }

    #[test]
    fn test_action_resource() {
        assert_eq!(AuditAction::ClassPackGrant.resource(), "class_pack");
        assert_eq!(AuditAction::SecurityEventInvestigate.resource(), "security_event");
    }

    #[test]
    fn test_create_input_builder() {
        let tenant_id = Uuid::new_v4();
        let user_id = Uuid::new_v4();

        let input = CreateAuditLogInput::new(Some(tenant_id), AuditAction::MemberStatusChange)
            .with_user_actor(user_id, Some("frontdesk@club.test".to_string()))
            .with_resource_id("member-1")
            .with_resource_name("Sara Ali")
            .add_change("status", Some(serde_json::json!("ACTIVE")), Some(serde_json::json!("FROZEN")));

        assert_eq!(input.tenant_id, Some(tenant_id));
        assert_eq!(input.actor_type, ActorType::User);
        assert_eq!(input.resource_type, "member");
        assert_eq!(input.changes.as_ref().map(|c| c.len()), Some(1));
        assert!(input.metadata().is_none());
    }

    #[test]
    fn test_metadata() {
        use std::net::Ipv4Addr;

        let input = CreateAuditLogInput::new(None, AuditAction::SettingChange).with_request_context(
            Some(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 7))),
            None,
            Some("req-1".to_string()),
        );
        let metadata = input.metadata().unwrap();
        assert_eq!(metadata.ip_address.as_deref(), Some("10.0.0.7"));
        assert_eq!(metadata.request_id.as_deref(), Some("req-1"));
    }

    #[test]
    fn test_actor_constructors() {
        let id = Uuid::new_v4();
        assert_eq!(AuditActor::user(id, None).id, Some(id));
        assert_eq!(AuditActor::system().actor_type, ActorType::System);
    }
}
