//! Dunning sequence and step entities (database row mappings).

use chrono::{DateTime, NaiveDate, Utc};
use domain::models::dunning::parse_channels;
use domain::models::{DunningSequence, DunningStatus, DunningStep};
use sqlx::FromRow;
use std::str::FromStr;
use uuid::Uuid;

/// Database row mapping for the dunning_sequences table.
///
/// Steps live in their own table; the repository attaches them.
#[derive(Debug, Clone, FromRow)]
pub struct DunningSequenceEntity {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub invoice_id: Uuid,
    pub member_id: Uuid,
    pub subscription_id: Option<Uuid>,
    pub amount: i64,
    pub currency: String,
    pub status: String,
    pub failed_at: DateTime<Utc>,
    pub failure_reason: Option<String>,
    pub retry_count: i32,
    pub max_retries: i32,
    pub next_retry_date: Option<NaiveDate>,
    pub last_retry_at: Option<DateTime<Utc>>,
    pub last_retry_result: Option<String>,
    pub suspension_day: i32,
    pub deactivation_day: i32,
    pub suspended_at: Option<DateTime<Utc>>,
    pub deactivated_at: Option<DateTime<Utc>>,
    pub recovered_at: Option<DateTime<Utc>>,
    pub recovery_method: Option<String>,
    pub escalated_to_csm: bool,
    pub escalated_at: Option<DateTime<Utc>>,
    pub csm_id: Option<Uuid>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DunningSequenceEntity {
    pub fn into_domain(self, steps: Vec<DunningStep>) -> DunningSequence {
        DunningSequence {
            id: self.id,
            tenant_id: self.tenant_id,
            invoice_id: self.invoice_id,
            member_id: self.member_id,
            subscription_id: self.subscription_id,
            amount: self.amount,
            currency: self.currency.trim().to_string(),
            status: DunningStatus::from_str(&self.status).unwrap_or(DunningStatus::Resolved),
            failed_at: self.failed_at,
            failure_reason: self.failure_reason,
            retry_count: self.retry_count,
            max_retries: self.max_retries,
            next_retry_date: self.next_retry_date,
            last_retry_at: self.last_retry_at,
            last_retry_result: self.last_retry_result,
            suspension_day: self.suspension_day,
            deactivation_day: self.deactivation_day,
            suspended_at: self.suspended_at,
            deactivated_at: self.deactivated_at,
            recovered_at: self.recovered_at,
            recovery_method: self.recovery_method,
            escalated_to_csm: self.escalated_to_csm,
            escalated_at: self.escalated_at,
            csm_id: self.csm_id,
            notes: self.notes,
            steps,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Database row mapping for the dunning_steps table.
#[derive(Debug, Clone, FromRow)]
pub struct DunningStepEntity {
    pub id: Uuid,
    pub sequence_id: Uuid,
    pub day_after_failure: i32,
    pub channels: String,
    pub description: String,
    pub template: String,
    pub include_payment_link: bool,
    pub escalate_to_csm: bool,
    pub is_sent: bool,
    pub sent_at: Option<DateTime<Utc>>,
}

impl From<DunningStepEntity> for DunningStep {
    fn from(entity: DunningStepEntity) -> Self {
        Self {
            id: entity.id,
            sequence_id: entity.sequence_id,
            day_after_failure: entity.day_after_failure,
            channels: parse_channels(&entity.channels),
            description: entity.description,
            template: entity.template,
            include_payment_link: entity.include_payment_link,
            escalate_to_csm: entity.escalate_to_csm,
            is_sent: entity.is_sent,
            sent_at: entity.sent_at,
        }
    }
}
