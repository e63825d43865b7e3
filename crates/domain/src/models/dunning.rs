//! Payment recovery after a failed invoice payment.
//!
//! A sequence is opened when a payment fails. It schedules automatic retries,
//! sends notification steps on fixed days after the failure, and suspends then
//! deactivates the member's subscription if the money is never recovered.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::error::{ensure_state, DomainError};

db_enum! {
    pub enum DunningStatus {
        Active => "ACTIVE",
        Recovered => "RECOVERED",
        Suspended => "SUSPENDED",
        Deactivated => "DEACTIVATED",
        Resolved => "RESOLVED",
    }
}

db_enum! {
    pub enum NotificationChannel {
        Email => "EMAIL",
        Sms => "SMS",
        Push => "PUSH",
        InApp => "IN_APP",
    }
}

pub const DEFAULT_MAX_RETRIES: i32 = 3;
pub const DEFAULT_SUSPENSION_DAY: i32 = 10;
pub const DEFAULT_DEACTIVATION_DAY: i32 = 30;
const FIRST_RETRY_DELAY_DAYS: i64 = 3;

/// Parses a comma separated channel list, skipping unknown entries.
pub fn parse_channels(raw: &str) -> Vec<NotificationChannel> {
    raw.split(',')
        .filter_map(|c| c.trim().parse().ok())
        .collect()
}

pub fn join_channels(channels: &[NotificationChannel]) -> String {
    channels
        .iter()
        .map(NotificationChannel::as_str)
        .collect::<Vec<_>>()
        .join(",")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DunningStep {
    pub id: Uuid,
    pub sequence_id: Uuid,
    pub day_after_failure: i32,
    pub channels: Vec<NotificationChannel>,
    pub description: String,
    pub template: String,
    pub include_payment_link: bool,
    pub escalate_to_csm: bool,
    pub is_sent: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sent_at: Option<DateTime<Utc>>,
}

impl DunningStep {
    pub fn mark_sent(&mut self, now: DateTime<Utc>) {
        self.is_sent = true;
        self.sent_at = Some(now);
    }

    /// Notification plan attached to every new sequence.
    pub fn defaults(sequence_id: Uuid) -> Vec<DunningStep> {
        use NotificationChannel::*;

        let step = |day: i32,
                    channels: Vec<NotificationChannel>,
                    description: &str,
                    template: &str,
                    link: bool,
                    escalate: bool| DunningStep {
            id: Uuid::new_v4(),
            sequence_id,
            day_after_failure: day,
            channels,
            description: description.to_string(),
            template: template.to_string(),
            include_payment_link: link,
            escalate_to_csm: escalate,
            is_sent: false,
            sent_at: None,
        };

        vec![
            step(0, vec![InApp], "In-app alert: payment failed", "payment_failed_alert", false, false),
            step(
                1,
                vec![Sms, Email],
                "SMS and email: payment failed, please update card",
                "payment_failed_day1",
                true,
                false,
            ),
            step(
                3,
                vec![Email],
                "Email: action required, update payment method",
                "payment_failed_day3",
                true,
                false,
            ),
            step(
                5,
                vec![Push, Email],
                "Push and email: service interruption warning",
                "payment_failed_day5",
                true,
                false,
            ),
            step(
                7,
                vec![Email],
                "Email: final notice before suspension",
                "payment_failed_final",
                true,
                true,
            ),
        ]
    }
}

/// One entry of a sequence's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DunningEvent {
    pub timestamp: DateTime<Utc>,
    pub event_type: &'static str,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DunningSequence {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub invoice_id: Uuid,
    pub member_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription_id: Option<Uuid>,
    pub amount: i64,
    pub currency: String,
    pub status: DunningStatus,
    pub failed_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    pub retry_count: i32,
    pub max_retries: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_retry_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_retry_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_retry_result: Option<String>,
    pub suspension_day: i32,
    pub deactivation_day: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suspended_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deactivated_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recovered_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recovery_method: Option<String>,
    pub escalated_to_csm: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub escalated_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub csm_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default)]
    pub steps: Vec<DunningStep>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DunningSequence {
    /// Opens a sequence for a failed payment with the default steps.
    #[allow(clippy::too_many_arguments)]
    pub fn open(
        tenant_id: Uuid,
        invoice_id: Uuid,
        member_id: Uuid,
        subscription_id: Option<Uuid>,
        amount: i64,
        currency: String,
        failure_reason: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        let id = Uuid::new_v4();
        Self {
            id,
            tenant_id,
            invoice_id,
            member_id,
            subscription_id,
            amount,
            currency,
            status: DunningStatus::Active,
            failed_at: now,
            failure_reason,
            retry_count: 0,
            max_retries: DEFAULT_MAX_RETRIES,
            next_retry_date: Some(now.date_naive() + Duration::days(FIRST_RETRY_DELAY_DAYS)),
            last_retry_at: None,
            last_retry_result: None,
            suspension_day: DEFAULT_SUSPENSION_DAY,
            deactivation_day: DEFAULT_DEACTIVATION_DAY,
            suspended_at: None,
            deactivated_at: None,
            recovered_at: None,
            recovery_method: None,
            escalated_to_csm: false,
            escalated_at: None,
            csm_id: None,
            notes: None,
            steps: DunningStep::defaults(id),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn days_since_failure(&self, now: DateTime<Utc>) -> i64 {
        (now - self.failed_at).num_days()
    }

    fn ensure_open(&self, action: &str) -> Result<(), DomainError> {
        ensure_state(
            matches!(self.status, DunningStatus::Active | DunningStatus::Suspended),
            format!("Cannot {} dunning sequence in status {}", action, self.status),
        )
    }

    pub fn is_retry_due(&self, today: NaiveDate) -> bool {
        self.status == DunningStatus::Active
            && self.retry_count < self.max_retries
            && self.next_retry_date.map_or(false, |d| d <= today)
    }

    /// Records an automatic retry. Failed retries are rescheduled 3 then 4 days out.
    pub fn record_retry(
        &mut self,
        success: bool,
        result: String,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        self.ensure_open("retry")?;
        ensure_state(
            self.retry_count < self.max_retries,
            "Maximum retry attempts reached",
        )?;
        self.retry_count += 1;
        self.last_retry_at = Some(now);
        self.last_retry_result = Some(result);

        if success {
            self.recover("automatic_retry", now);
            return Ok(());
        }

        let delay = match self.retry_count {
            1 => Some(3),
            2 => Some(4),
            _ => None,
        };
        self.next_retry_date = if self.retry_count < self.max_retries {
            delay.map(|d| now.date_naive() + Duration::days(d))
        } else {
            None
        };
        Ok(())
    }

    pub fn recover(&mut self, method: &str, now: DateTime<Utc>) {
        self.status = DunningStatus::Recovered;
        self.recovered_at = Some(now);
        self.recovery_method = Some(method.to_string());
        self.next_retry_date = None;
    }

    /// First unsent step whose day has been reached.
    pub fn next_pending_step(&self, now: DateTime<Utc>) -> Option<&DunningStep> {
        let days = self.days_since_failure(now);
        self.steps
            .iter()
            .filter(|s| !s.is_sent && s.day_after_failure as i64 <= days)
            .min_by_key(|s| s.day_after_failure)
    }

    /// Marks a step sent; escalates when the step asks for it.
    pub fn mark_step_sent(&mut self, step_id: Uuid, now: DateTime<Utc>) -> Result<(), DomainError> {
        let step = self
            .steps
            .iter_mut()
            .find(|s| s.id == step_id)
            .ok_or_else(|| DomainError::argument("Unknown dunning step"))?;
        ensure_state(!step.is_sent, "Dunning step was already sent")?;
        step.mark_sent(now);
        let escalate = step.escalate_to_csm;
        if escalate {
            self.escalate_to_csm(None, now);
        }
        Ok(())
    }

    pub fn is_suspension_due(&self, now: DateTime<Utc>) -> bool {
        self.status == DunningStatus::Active
            && self.suspended_at.is_none()
            && self.days_since_failure(now) >= self.suspension_day as i64
    }

    pub fn is_deactivation_due(&self, now: DateTime<Utc>) -> bool {
        self.status == DunningStatus::Suspended
            && self.days_since_failure(now) >= self.deactivation_day as i64
    }

    /// Idempotent: an already suspended sequence is left untouched.
    pub fn suspend(&mut self, now: DateTime<Utc>) -> Result<(), DomainError> {
        if self.status == DunningStatus::Suspended {
            return Ok(());
        }
        ensure_state(
            self.status == DunningStatus::Active,
            format!("Cannot suspend dunning sequence in status {}", self.status),
        )?;
        self.status = DunningStatus::Suspended;
        self.suspended_at = Some(now);
        Ok(())
    }

    pub fn deactivate(&mut self, now: DateTime<Utc>) -> Result<(), DomainError> {
        self.ensure_open("deactivate")?;
        self.status = DunningStatus::Deactivated;
        self.deactivated_at = Some(now);
        self.next_retry_date = None;
        Ok(())
    }

    pub fn resolve_manually(&mut self, notes: Option<String>) -> Result<(), DomainError> {
        self.ensure_open("resolve")?;
        self.status = DunningStatus::Resolved;
        self.notes = notes;
        self.next_retry_date = None;
        Ok(())
    }

    /// Idempotent; returns false when already escalated.
    pub fn escalate_to_csm(&mut self, csm_id: Option<Uuid>, now: DateTime<Utc>) -> bool {
        if self.escalated_to_csm {
            return false;
        }
        self.escalated_to_csm = true;
        self.escalated_at = Some(now);
        self.csm_id = csm_id;
        true
    }

    pub fn timeline(&self) -> Vec<DunningEvent> {
        let mut events = vec![DunningEvent {
            timestamp: self.failed_at,
            event_type: "PAYMENT_FAILED",
            description: format!(
                "Payment of {} {} failed: {}",
                self.amount,
                self.currency,
                self.failure_reason.as_deref().unwrap_or("unknown reason")
            ),
        }];

        if let Some(at) = self.last_retry_at {
            events.push(DunningEvent {
                timestamp: at,
                event_type: "RETRY_ATTEMPTED",
                description: format!(
                    "Retry attempt #{}: {}",
                    self.retry_count,
                    self.last_retry_result.as_deref().unwrap_or("")
                ),
            });
        }

        for step in self.steps.iter().filter(|s| s.is_sent) {
            if let Some(at) = step.sent_at {
                events.push(DunningEvent {
                    timestamp: at,
                    event_type: "NOTIFICATION_SENT",
                    description: format!(
                        "Sent via {}: {}",
                        join_channels(&step.channels),
                        step.description
                    ),
                });
            }
        }

        if let Some(at) = self.escalated_at {
            events.push(DunningEvent {
                timestamp: at,
                event_type: "CSM_ESCALATED",
                description: "Escalated to customer success".to_string(),
            });
        }
        if let Some(at) = self.suspended_at {
            events.push(DunningEvent {
                timestamp: at,
                event_type: "SUBSCRIPTION_SUSPENDED",
                description: "Subscription suspended due to non-payment".to_string(),
            });
        }
        if let Some(at) = self.deactivated_at {
            events.push(DunningEvent {
                timestamp: at,
                event_type: "ACCOUNT_DEACTIVATED",
                description: "Membership deactivated due to non-payment".to_string(),
            });
        }
        if let Some(at) = self.recovered_at {
            events.push(DunningEvent {
                timestamp: at,
                event_type: "PAYMENT_RECOVERED",
                description: format!(
                    "Payment recovered via {}",
                    self.recovery_method.as_deref().unwrap_or("unknown")
                ),
            });
        }

        events.sort_by_key(|e| e.timestamp);
        events
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct StartDunningRequest {
    pub invoice_id: Uuid,
    #[validate(length(max = 500, message = "Failure reason must be at most 500 characters"))]
    pub failure_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RecordRetryRequest {
    pub success: bool,
    #[validate(length(min = 1, max = 500, message = "Result must be 1-500 characters"))]
    pub result: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ResolveDunningRequest {
    #[validate(length(max = 2000, message = "Notes must be at most 2000 characters"))]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct EscalateDunningRequest {
    pub csm_id: Option<Uuid>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sequence(failed_at: DateTime<Utc>) -> DunningSequence {
        DunningSequence::open(
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            None,
            30000,
            "SAR".into(),
            Some("card_declined".into()),
            failed_at,
        )
    }

    fn at(day: u32) -> DateTime<Utc> {
        NaiveDate::from_ymd_opt(2024, 6, day)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap()
            .and_utc()
    }

    #[test]
    fn test_open_schedules_first_retry_and_steps() {
        let s = sequence(at(1));
        assert_eq!(s.next_retry_date, NaiveDate::from_ymd_opt(2024, 6, 4));
        let days: Vec<i32> = s.steps.iter().map(|st| st.day_after_failure).collect();
        assert_eq!(days, vec![0, 1, 3, 5, 7]);
        assert_eq!(s.steps[1].channels, vec![NotificationChannel::Sms, NotificationChannel::Email]);
        assert!(s.steps[4].escalate_to_csm);
    }

    #[test]
    fn test_retry_schedule() {
        let mut s = sequence(at(1));
        s.record_retry(false, "declined".into(), at(4)).unwrap();
        assert_eq!(s.next_retry_date, NaiveDate::from_ymd_opt(2024, 6, 7));
        s.record_retry(false, "declined".into(), at(7)).unwrap();
        assert_eq!(s.next_retry_date, NaiveDate::from_ymd_opt(2024, 6, 11));
        s.record_retry(false, "declined".into(), at(11)).unwrap();
        assert_eq!(s.next_retry_date, None);
        assert!(s.record_retry(true, "ok".into(), at(12)).is_err());
    }

    #[test]
    fn test_successful_retry_recovers() {
        let mut s = sequence(at(1));
        s.record_retry(true, "approved".into(), at(4)).unwrap();
        assert_eq!(s.status, DunningStatus::Recovered);
        assert_eq!(s.recovery_method.as_deref(), Some("automatic_retry"));
        assert!(!s.is_retry_due(NaiveDate::from_ymd_opt(2024, 6, 30).unwrap()));
    }

    #[test]
    fn test_pending_steps_by_day() {
        let mut s = sequence(at(1));
        let first = s.next_pending_step(at(1)).unwrap().id;
        assert_eq!(s.next_pending_step(at(1)).unwrap().day_after_failure, 0);
        s.mark_step_sent(first, at(1)).unwrap();
        assert!(s.next_pending_step(at(1)).is_none());
        assert_eq!(s.next_pending_step(at(4)).unwrap().day_after_failure, 1);
        assert!(s.mark_step_sent(first, at(2)).is_err());
    }

    #[test]
    fn test_final_step_escalates() {
        let mut s = sequence(at(1));
        let last = s.steps[4].id;
        s.mark_step_sent(last, at(8)).unwrap();
        assert!(s.escalated_to_csm);
        assert!(!s.escalate_to_csm(None, at(9)));
    }

    #[test]
    fn test_suspension_then_deactivation() {
        let mut s = sequence(at(1));
        assert!(!s.is_suspension_due(at(10)));
        assert!(s.is_suspension_due(at(11)));
        s.suspend(at(11)).unwrap();
        s.suspend(at(12)).unwrap();
        assert_eq!(s.suspended_at, Some(at(11)));

        let later = at(1) + Duration::days(30);
        assert!(s.is_deactivation_due(later));
        s.deactivate(later).unwrap();
        assert_eq!(s.status, DunningStatus::Deactivated);
        assert!(s.resolve_manually(None).is_err());
    }

    #[test]
    fn test_timeline_sorted() {
        let mut s = sequence(at(1));
        let first = s.steps[0].id;
        s.mark_step_sent(first, at(1)).unwrap();
        s.record_retry(false, "declined".into(), at(4)).unwrap();
        s.suspend(at(11)).unwrap();

        let types: Vec<&str> = s.timeline().iter().map(|e| e.event_type).collect();
        assert_eq!(
            types,
            vec!["PAYMENT_FAILED", "NOTIFICATION_SENT", "RETRY_ATTEMPTED", "SUBSCRIPTION_SUSPENDED"]
        );
    }

    #[test]
    fn test_channel_parsing() {
        assert_eq!(
            parse_channels("SMS, email,FAX"),
            vec![NotificationChannel::Sms, NotificationChannel::Email]
        );
        assert_eq!(join_channels(&[NotificationChannel::Push, NotificationChannel::InApp]), "PUSH,IN_APP");
    }
}
