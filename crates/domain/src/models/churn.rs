//! Churn models, ingested predictions and retention interventions.
//!
//! Scores are computed outside this service. Here they are stored, bucketed
//! into risk levels and acted upon.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;
use validator::Validate;

use crate::error::{ensure_argument, ensure_state, DomainError};

db_enum! {
    pub enum RiskLevel {
        Low => "LOW",
        Medium => "MEDIUM",
        High => "HIGH",
        Critical => "CRITICAL",
    }
}

impl RiskLevel {
    /// Bucket for a churn score in 0..=100; higher is riskier.
    pub fn from_churn_score(score: i32) -> Self {
        match score {
            s if s >= 75 => RiskLevel::Critical,
            s if s >= 50 => RiskLevel::High,
            s if s >= 25 => RiskLevel::Medium,
            _ => RiskLevel::Low,
        }
    }

    /// Bucket for an engagement score in 0..=100; lower is riskier.
    pub fn from_engagement_score(score: i32) -> Self {
        match score {
            s if s < 25 => RiskLevel::Critical,
            s if s < 40 => RiskLevel::High,
            s if s < 60 => RiskLevel::Medium,
            _ => RiskLevel::Low,
        }
    }

    pub fn is_at_risk(&self) -> bool {
        matches!(self, RiskLevel::High | RiskLevel::Critical)
    }
}

db_enum! {
    pub enum PredictionOutcome {
        Retained => "RETAINED",
        Churned => "CHURNED",
        Unknown => "UNKNOWN",
    }
}

db_enum! {
    pub enum InterventionType {
        Call => "CALL",
        Email => "EMAIL",
        Sms => "SMS",
        Offer => "OFFER",
        PersonalTraining => "PERSONAL_TRAINING",
        Other => "OTHER",
    }
}

db_enum! {
    pub enum InterventionStatus {
        Planned => "PLANNED",
        Assigned => "ASSIGNED",
        Executed => "EXECUTED",
        Cancelled => "CANCELLED",
    }
}

pub const DEFAULT_PREDICTION_VALIDITY_DAYS: i64 = 30;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChurnModel {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub version: String,
    pub algorithm: String,
    pub features: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub precision_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recall_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub f1_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trained_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ChurnModel {
    pub fn update_metrics(&mut self, metrics: &ModelMetricsRequest, now: DateTime<Utc>) {
        self.accuracy = metrics.accuracy.or(self.accuracy);
        self.precision_score = metrics.precision.or(self.precision_score);
        self.recall_score = metrics.recall.or(self.recall_score);
        self.f1_score = metrics.f1.or(self.f1_score);
        self.trained_at = Some(metrics.trained_at.unwrap_or(now));
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChurnPrediction {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub member_id: Uuid,
    pub model_id: Uuid,
    pub churn_score: i32,
    pub risk_level: RiskLevel,
    pub top_risk_factors: Value,
    pub recommended_interventions: Value,
    pub valid_until: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<PredictionOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome_recorded_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl ChurnPrediction {
    pub fn validate_score(score: i32) -> Result<(), DomainError> {
        ensure_argument(
            (0..=100).contains(&score),
            "Churn score must be between 0 and 100",
        )
    }

    pub fn record_outcome(
        &mut self,
        outcome: PredictionOutcome,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        ensure_state(
            self.outcome.map_or(true, |o| o == PredictionOutcome::Unknown),
            "Outcome has already been recorded",
        )?;
        self.outcome = Some(outcome);
        self.outcome_recorded_at = Some(now);
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChurnIntervention {
    pub id: Uuid,
    pub tenant_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prediction_id: Option<Uuid>,
    pub member_id: Uuid,
    pub intervention_type: InterventionType,
    pub status: InterventionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub executed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ChurnIntervention {
    pub fn assign(&mut self, user_id: Uuid) -> Result<(), DomainError> {
        ensure_state(
            matches!(
                self.status,
                InterventionStatus::Planned | InterventionStatus::Assigned
            ),
            format!("Cannot assign intervention in status {}", self.status),
        )?;
        self.assigned_to = Some(user_id);
        self.status = InterventionStatus::Assigned;
        Ok(())
    }

    pub fn execute(&mut self, now: DateTime<Utc>) -> Result<(), DomainError> {
        ensure_state(
            matches!(
                self.status,
                InterventionStatus::Planned | InterventionStatus::Assigned
            ),
            format!("Cannot execute intervention in status {}", self.status),
        )?;
        self.status = InterventionStatus::Executed;
        self.executed_at = Some(now);
        Ok(())
    }

    pub fn record_outcome(&mut self, outcome: String) -> Result<(), DomainError> {
        ensure_state(
            self.status == InterventionStatus::Executed,
            "Outcome can only be recorded for executed interventions",
        )?;
        self.outcome = Some(outcome);
        Ok(())
    }

    pub fn cancel(&mut self) -> Result<(), DomainError> {
        ensure_state(
            !matches!(
                self.status,
                InterventionStatus::Executed | InterventionStatus::Cancelled
            ),
            format!("Cannot cancel intervention in status {}", self.status),
        )?;
        self.status = InterventionStatus::Cancelled;
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskDistribution {
    pub low: i64,
    pub medium: i64,
    pub high: i64,
    pub critical: i64,
    pub total: i64,
}

impl RiskDistribution {
    pub fn from_counts(counts: &[(RiskLevel, i64)]) -> Self {
        let mut d = Self::default();
        for (level, n) in counts {
            match level {
                RiskLevel::Low => d.low += n,
                RiskLevel::Medium => d.medium += n,
                RiskLevel::High => d.high += n,
                RiskLevel::Critical => d.critical += n,
            }
            d.total += n;
        }
        d
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateChurnModelRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: String,
    #[validate(length(min = 1, max = 20, message = "Version must be 1-20 characters"))]
    pub version: String,
    #[validate(length(min = 1, max = 50, message = "Algorithm must be 1-50 characters"))]
    pub algorithm: String,
    pub features: Option<Value>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ModelMetricsRequest {
    #[validate(range(min = 0.0, max = 1.0))]
    pub accuracy: Option<f64>,
    #[validate(range(min = 0.0, max = 1.0))]
    pub precision: Option<f64>,
    #[validate(range(min = 0.0, max = 1.0))]
    pub recall: Option<f64>,
    #[validate(range(min = 0.0, max = 1.0))]
    pub f1: Option<f64>,
    pub trained_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RecordPredictionRequest {
    pub member_id: Uuid,
    /// Defaults to the tenant's active model.
    pub model_id: Option<Uuid>,
    #[validate(range(min = 0, max = 100, message = "Churn score must be between 0 and 100"))]
    pub churn_score: i32,
    pub top_risk_factors: Option<Value>,
    pub recommended_interventions: Option<Value>,
    #[validate(range(min = 1, max = 365))]
    pub valid_for_days: Option<i64>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PredictionOutcomeRequest {
    pub outcome: PredictionOutcome,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionQuery {
    pub risk_level: Option<RiskLevel>,
    pub member_id: Option<Uuid>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateInterventionRequest {
    pub prediction_id: Option<Uuid>,
    pub member_id: Uuid,
    pub intervention_type: InterventionType,
    #[validate(length(max = 1000))]
    pub description: Option<String>,
    pub assigned_to: Option<Uuid>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AssignInterventionRequest {
    pub user_id: Uuid,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct InterventionOutcomeRequest {
    #[validate(length(min = 1, max = 1000, message = "Outcome must be 1-1000 characters"))]
    pub outcome: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterventionQuery {
    pub status: Option<InterventionStatus>,
    pub member_id: Option<Uuid>,
    pub assigned_to: Option<Uuid>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn intervention() -> ChurnIntervention {
        ChurnIntervention {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            prediction_id: None,
            member_id: Uuid::new_v4(),
            intervention_type: InterventionType::Call,
            status: InterventionStatus::Planned,
            description: None,
            assigned_to: None,
            executed_at: None,
            outcome: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_churn_buckets() {
        assert_eq!(RiskLevel::from_churn_score(100), RiskLevel::Critical);
        assert_eq!(RiskLevel::from_churn_score(75), RiskLevel::Critical);
        assert_eq!(RiskLevel::from_churn_score(74), RiskLevel::High);
        assert_eq!(RiskLevel::from_churn_score(50), RiskLevel::High);
        assert_eq!(RiskLevel::from_churn_score(49), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_churn_score(25), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_churn_score(24), RiskLevel::Low);
        assert_eq!(RiskLevel::from_churn_score(0), RiskLevel::Low);
    }

    #[test]
    fn test_engagement_buckets() {
        assert_eq!(RiskLevel::from_engagement_score(10), RiskLevel::Critical);
        assert_eq!(RiskLevel::from_engagement_score(25), RiskLevel::High);
        assert_eq!(RiskLevel::from_engagement_score(39), RiskLevel::High);
        assert_eq!(RiskLevel::from_engagement_score(40), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_engagement_score(60), RiskLevel::Low);
    }

    #[test]
    fn test_at_risk() {
        assert!(RiskLevel::Critical.is_at_risk());
        assert!(RiskLevel::High.is_at_risk());
        assert!(!RiskLevel::Medium.is_at_risk());
    }

    #[test]
    fn test_score_range() {
        assert!(ChurnPrediction::validate_score(0).is_ok());
        assert!(ChurnPrediction::validate_score(101).is_err());
        assert!(ChurnPrediction::validate_score(-1).is_err());
    }

    #[test]
    fn test_intervention_flow() {
        let mut i = intervention();
        assert!(i.record_outcome("renewed".into()).is_err());
        i.assign(Uuid::new_v4()).unwrap();
        i.execute(Utc::now()).unwrap();
        i.record_outcome("renewed".into()).unwrap();
        assert!(i.cancel().is_err());
        assert!(i.assign(Uuid::new_v4()).is_err());
    }

    #[test]
    fn test_distribution() {
        let d = RiskDistribution::from_counts(&[(RiskLevel::Low, 5), (RiskLevel::Critical, 2)]);
        assert_eq!(d.low, 5);
        assert_eq!(d.critical, 2);
        assert_eq!(d.total, 7);
    }
}
