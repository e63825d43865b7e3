//! Audit log entity.

use chrono::{DateTime, Utc};
use domain::models::audit_log::{AuditActor, AuditMetadata, AuditResource};
use domain::models::{ActorType, AuditLog, FieldChange};
use sqlx::FromRow;
use std::collections::HashMap;
use std::str::FromStr;
use uuid::Uuid;

/// Database entity for audit logs.
#[derive(Debug, Clone, FromRow)]
pub struct AuditLogEntity {
    pub id: Uuid,

    /// Absent for platform-level actions.
    pub tenant_id: Option<Uuid>,

    pub timestamp: DateTime<Utc>,
    pub actor_id: Option<Uuid>,
    pub actor_type: String,
    pub actor_email: Option<String>,

    /// Action performed (format: resource.operation).
    pub action: String,

    pub resource_type: String,
    pub resource_id: Option<String>,
    pub resource_name: Option<String>,

    /// Field changes keyed by field name, each with old/new values.
    pub changes: Option<serde_json::Value>,

    /// Request context (ip address, user agent, request id).
    pub metadata: Option<serde_json::Value>,

    pub created_at: DateTime<Utc>,
}

impl From<AuditLogEntity> for AuditLog {
    fn from(entity: AuditLogEntity) -> Self {
        let actor_type = ActorType::from_str(&entity.actor_type).unwrap_or(ActorType::System);
        let changes: Option<HashMap<String, FieldChange>> =
            entity.changes.and_then(|json| serde_json::from_value(json).ok());
        let metadata: Option<AuditMetadata> =
            entity.metadata.and_then(|json| serde_json::from_value(json).ok());

        Self {
            id: entity.id,
            tenant_id: entity.tenant_id,
            timestamp: entity.timestamp,
            actor: AuditActor {
                id: entity.actor_id,
                actor_type,
                email: entity.actor_email,
            },
            action: entity.action,
            resource: AuditResource {
                resource_type: entity.resource_type,
                id: entity.resource_id,
                name: entity.resource_name,
            },
            changes,
            metadata,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_to_domain_conversion() {
        let entity = AuditLogEntity {
            id: Uuid::new_v4(),
            tenant_id: Some(Uuid::new_v4()),
            timestamp: Utc::now(),
            actor_id: Some(Uuid::new_v4()),
            actor_type: "USER".to_string(),
            actor_email: Some("admin@club.example".to_string()),
            action: "member.status_change".to_string(),
            resource_type: "member".to_string(),
            resource_id: Some("member-123".to_string()),
            resource_name: Some("Jane Doe".to_string()),
            changes: Some(serde_json::json!({
                "status": { "old": "ACTIVE", "new": "FROZEN" }
            })),
            metadata: Some(serde_json::json!({ "requestId": "req-123" })),
            created_at: Utc::now(),
        };

        let log: AuditLog = entity.into();

        assert_eq!(log.actor.actor_type, ActorType::User);
        assert_eq!(log.action, "member.status_change");
        assert_eq!(log.resource.resource_type, "member");
        let changes = log.changes.unwrap();
        assert_eq!(changes["status"].new, Some(serde_json::json!("FROZEN")));
        assert_eq!(log.metadata.unwrap().request_id.as_deref(), Some("req-123"));
    }

    #[test]
    fn test_platform_action_without_tenant() {
        let entity = AuditLogEntity {
            id: Uuid::new_v4(),
            tenant_id: None,
            timestamp: Utc::now(),
            actor_id: None,
            actor_type: "SYSTEM".to_string(),
            actor_email: None,
            action: "tenant.suspend".to_string(),
            resource_type: "tenant".to_string(),
            resource_id: None,
            resource_name: None,
            changes: None,
            metadata: None,
            created_at: Utc::now(),
        };

        let log: AuditLog = entity.into();
        assert!(log.tenant_id.is_none());
        assert_eq!(log.actor.actor_type, ActorType::System);
        assert!(log.changes.is_none());
    }
}
