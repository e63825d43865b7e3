//! Forecasting entities (database row mappings).

use chrono::{DateTime, NaiveDate, Utc};
use domain::models::forecast::{ForecastAlgorithm, ForecastGranularity};
use domain::models::{Forecast, ForecastModel, ForecastType};
use sqlx::FromRow;
use std::str::FromStr;
use uuid::Uuid;

/// Database row mapping for the forecast_models table.
#[derive(Debug, Clone, FromRow)]
pub struct ForecastModelEntity {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub model_type: String,
    pub algorithm: String,
    pub hyperparameters: serde_json::Value,
    pub training_date: DateTime<Utc>,
    pub accuracy_mape: Option<f64>,
    pub accuracy_rmse: Option<f64>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ForecastModelEntity> for ForecastModel {
    fn from(entity: ForecastModelEntity) -> Self {
        Self {
            id: entity.id,
            tenant_id: entity.tenant_id,
            model_type: ForecastType::from_str(&entity.model_type).unwrap_or(ForecastType::Revenue),
            algorithm: ForecastAlgorithm::from_str(&entity.algorithm)
                .unwrap_or(ForecastAlgorithm::MovingAverage),
            hyperparameters: entity.hyperparameters,
            training_date: entity.training_date,
            accuracy_mape: entity.accuracy_mape,
            accuracy_rmse: entity.accuracy_rmse,
            is_active: entity.is_active,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        }
    }
}

/// Database row mapping for the forecasts table.
#[derive(Debug, Clone, FromRow)]
pub struct ForecastEntity {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub model_id: Uuid,
    pub forecast_type: String,
    pub granularity: String,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub predicted_value: f64,
    pub lower_bound: Option<f64>,
    pub upper_bound: Option<f64>,
    pub confidence_score: Option<f64>,
    pub actual_value: Option<f64>,
    pub generated_at: DateTime<Utc>,
}

impl From<ForecastEntity> for Forecast {
    fn from(entity: ForecastEntity) -> Self {
        Self {
            id: entity.id,
            tenant_id: entity.tenant_id,
            model_id: entity.model_id,
            forecast_type: ForecastType::from_str(&entity.forecast_type)
                .unwrap_or(ForecastType::Revenue),
            granularity: ForecastGranularity::from_str(&entity.granularity).unwrap_or_default(),
            period_start: entity.period_start,
            period_end: entity.period_end,
            predicted_value: entity.predicted_value,
            lower_bound: entity.lower_bound,
            upper_bound: entity.upper_bound,
            confidence_score: entity.confidence_score,
            actual_value: entity.actual_value,
            generated_at: entity.generated_at,
        }
    }
}

/// One period of history.
#[derive(Debug, Clone, FromRow)]
pub struct PeriodValueEntity {
    pub period_start: NaiveDate,
    pub value: f64,
}
