//! Audit log builder used by route handlers.

use crate::models::{ActorType, AuditAction, CreateAuditLogInput, FieldChange};
use serde_json::json;
use std::collections::HashMap;
use std::net::IpAddr;
use uuid::Uuid;

/// Fluent builder for audit entries.
#[derive(Debug, Clone)]
pub struct AuditLogBuilder {
    tenant_id: Option<Uuid>,
    actor_id: Option<Uuid>,
    actor_type: ActorType,
    actor_email: Option<String>,
    action: AuditAction,
    resource_type: Option<String>,
    resource_id: Option<String>,
    resource_name: Option<String>,
    changes: Option<HashMap<String, FieldChange>>,
    ip_address: Option<IpAddr>,
    user_agent: Option<String>,
    request_id: Option<String>,
}

impl AuditLogBuilder {
    fn new(tenant_id: Option<Uuid>, actor_id: Option<Uuid>, actor_type: ActorType, action: AuditAction) -> Self {
        Self {
            tenant_id,
            actor_id,
            actor_type,
            actor_email: None,
            action,
            resource_type: None,
            resource_id: None,
            resource_name: None,
            changes: None,
            ip_address: None,
            user_agent: None,
            request_id: None,
        }
    }

    /// Action performed by a signed-in user. Platform admins pass `None` for the tenant.
    pub fn user_action(tenant_id: Option<Uuid>, user_id: Uuid, action: AuditAction) -> Self {
        Self::new(tenant_id, Some(user_id), ActorType::User, action)
    }

    /// Action performed by a background job.
    pub fn system_action(tenant_id: Option<Uuid>, action: AuditAction) -> Self {
        Self::new(tenant_id, None, ActorType::System, action)
    }

    pub fn with_actor_email(mut self, email: impl Into<String>) -> Self {
        self.actor_email = Some(email.into());
        self
    }

    /// Sets the resource id; the resource type is taken from the action.
    pub fn on(mut self, resource_id: impl ToString) -> Self {
        self.resource_id = Some(resource_id.to_string());
        self
    }

    /// Overrides both the resource type and id.
    pub fn on_resource(mut self, resource_type: impl Into<String>, resource_id: impl ToString) -> Self {
        self.resource_type = Some(resource_type.into());
        self.resource_id = Some(resource_id.to_string());
        self
    }

    pub fn with_resource_name(mut self, name: impl Into<String>) -> Self {
        self.resource_name = Some(name.into());
        self
    }

    pub fn with_change(mut self, field: impl Into<String>, old: Option<String>, new: Option<String>) -> Self {
        let changes = self.changes.get_or_insert_with(HashMap::new);
        changes.insert(
            field.into(),
            FieldChange::new(old.map(|v| json!(v)), new.map(|v| json!(v))),
        );
        self
    }

    pub fn with_json_change(
        mut self,
        field: impl Into<String>,
        old: Option<serde_json::Value>,
        new: Option<serde_json::Value>,
    ) -> Self {
        let changes = self.changes.get_or_insert_with(HashMap::new);
        changes.insert(field.into(), FieldChange::new(old, new));
        self
    }

    /// Records a status transition as a `status` change.
    pub fn with_status_change(self, from: impl ToString, to: impl ToString) -> Self {
        self.with_change("status", Some(from.to_string()), Some(to.to_string()))
    }

    pub fn with_ip(mut self, ip: IpAddr) -> Self {
        self.ip_address = Some(ip);
        self
    }

    pub fn with_user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = Some(ua.into());
        self
    }

    pub fn with_request_id(mut self, id: impl Into<String>) -> Self {
        self.request_id = Some(id.into());
        self
    }

    pub fn build(self) -> CreateAuditLogInput {
        let mut input = CreateAuditLogInput::new(self.tenant_id, self.action)
            .with_request_context(self.ip_address, self.user_agent, self.request_id);
        if let Some(actor_id) = self.actor_id {
            if self.actor_type == ActorType::User {
                input = input.with_user_actor(actor_id, self.actor_email);
            }
        }
        if let Some(resource_type) = self.resource_type {
            input = input.with_resource_type(resource_type);
        }
        if let Some(id) = self.resource_id {
            input = input.with_resource_id(id);
        }
        if let Some(name) = self.resource_name {
            input = input.with_resource_name(name);
        }
        input.changes = self.changes;
        input
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn test_user_action_builder() {
        let tenant = Uuid::new_v4();
        let user = Uuid::new_v4();
        let booking = Uuid::new_v4();

        let input = AuditLogBuilder::user_action(Some(tenant), user, AuditAction::BookingCancel)
            .on(booking)
            .with_status_change("CONFIRMED", "CANCELLED")
            .with_ip(IpAddr::V4(Ipv4Addr::LOCALHOST))
            .with_request_id("req-9")
            .build();

        assert_eq!(input.tenant_id, Some(tenant));
        assert_eq!(input.actor_id, Some(user));
        assert_eq!(input.actor_type, ActorType::User);
        assert_eq!(input.resource_type, "booking");
        assert_eq!(input.resource_id, Some(booking.to_string()));
        let change = &input.changes.as_ref().unwrap()["status"];
        assert_eq!(change.new, Some(json!("CANCELLED")));
        assert_eq!(input.request_id.as_deref(), Some("req-9"));
    }

    #[test]
    fn test_system_action_builder() {
        let input = AuditLogBuilder::system_action(Some(Uuid::new_v4()), AuditAction::DunningStatusChange)
            .on_resource("dunning_sequence", "abc")
            .with_json_change("retryCount", Some(json!(1)), Some(json!(2)))
            .build();

        assert_eq!(input.actor_type, ActorType::System);
        assert!(input.actor_id.is_none());
        assert_eq!(input.resource_type, "dunning_sequence");
    }

    #[test]
    fn test_platform_action_has_no_tenant() {
        let input = AuditLogBuilder::user_action(None, Uuid::new_v4(), AuditAction::TenantSuspend)
            .with_resource_name("Iron Gym")
            .build();
        assert!(input.tenant_id.is_none());
        assert_eq!(input.resource_name.as_deref(), Some("Iron Gym"));
    }
}
