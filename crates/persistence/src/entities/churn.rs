//! Churn prediction entities (database row mappings).

use chrono::{DateTime, Utc};
use domain::models::churn::{InterventionStatus, InterventionType, PredictionOutcome};
use domain::models::{ChurnIntervention, ChurnModel, ChurnPrediction, RiskLevel};
use sqlx::FromRow;
use std::str::FromStr;
use uuid::Uuid;

/// Database row mapping for the churn_models table.
#[derive(Debug, Clone, FromRow)]
pub struct ChurnModelEntity {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub version: String,
    pub algorithm: String,
    pub features: serde_json::Value,
    pub accuracy: Option<f64>,
    pub precision_score: Option<f64>,
    pub recall_score: Option<f64>,
    pub f1_score: Option<f64>,
    pub trained_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ChurnModelEntity> for ChurnModel {
    fn from(entity: ChurnModelEntity) -> Self {
        Self {
            id: entity.id,
            tenant_id: entity.tenant_id,
            name: entity.name,
            version: entity.version,
            algorithm: entity.algorithm,
            features: entity.features,
            accuracy: entity.accuracy,
            precision_score: entity.precision_score,
            recall_score: entity.recall_score,
            f1_score: entity.f1_score,
            trained_at: entity.trained_at,
            is_active: entity.is_active,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        }
    }
}

/// Database row mapping for the churn_predictions table.
#[derive(Debug, Clone, FromRow)]
pub struct ChurnPredictionEntity {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub member_id: Uuid,
    pub model_id: Uuid,
    pub churn_score: i32,
    pub risk_level: String,
    pub top_risk_factors: serde_json::Value,
    pub recommended_interventions: serde_json::Value,
    pub valid_until: DateTime<Utc>,
    pub outcome: Option<String>,
    pub outcome_recorded_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<ChurnPredictionEntity> for ChurnPrediction {
    fn from(entity: ChurnPredictionEntity) -> Self {
        Self {
            id: entity.id,
            tenant_id: entity.tenant_id,
            member_id: entity.member_id,
            model_id: entity.model_id,
            churn_score: entity.churn_score,
            risk_level: RiskLevel::from_str(&entity.risk_level)
                .unwrap_or_else(|_| RiskLevel::from_churn_score(entity.churn_score)),
            top_risk_factors: entity.top_risk_factors,
            recommended_interventions: entity.recommended_interventions,
            valid_until: entity.valid_until,
            outcome: entity
                .outcome
                .as_deref()
                .and_then(|o| PredictionOutcome::from_str(o).ok()),
            outcome_recorded_at: entity.outcome_recorded_at,
            created_at: entity.created_at,
        }
    }
}

/// Database row mapping for the churn_interventions table.
#[derive(Debug, Clone, FromRow)]
pub struct ChurnInterventionEntity {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub prediction_id: Option<Uuid>,
    pub member_id: Uuid,
    pub intervention_type: String,
    pub status: String,
    pub description: Option<String>,
    pub assigned_to: Option<Uuid>,
    pub executed_at: Option<DateTime<Utc>>,
    pub outcome: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ChurnInterventionEntity> for ChurnIntervention {
    fn from(entity: ChurnInterventionEntity) -> Self {
        Self {
            id: entity.id,
            tenant_id: entity.tenant_id,
            prediction_id: entity.prediction_id,
            member_id: entity.member_id,
            intervention_type: InterventionType::from_str(&entity.intervention_type)
                .unwrap_or(InterventionType::Other),
            status: InterventionStatus::from_str(&entity.status)
                .unwrap_or(InterventionStatus::Cancelled),
            description: entity.description,
            assigned_to: entity.assigned_to,
            executed_at: entity.executed_at,
            outcome: entity.outcome,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        }
    }
}

/// Count of predictions per risk level.
#[derive(Debug, Clone, FromRow)]
pub struct RiskCountEntity {
    pub risk_level: String,
    pub count: i64,
}
