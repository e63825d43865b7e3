//! Forecast models and the forecasts they produce.
//!
//! Projections are simple baselines computed from the club's own history:
//! a moving average or a least-squares trend over the preceding periods.

use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::error::{ensure_argument, ensure_state, DomainError};

db_enum! {
    pub enum ForecastType {
        Revenue => "REVENUE",
        MembershipCount => "MEMBERSHIP_COUNT",
        Attendance => "ATTENDANCE",
    }
}

db_enum! {
    pub enum ForecastAlgorithm {
        MovingAverage => "MOVING_AVERAGE",
        LinearTrend => "LINEAR_TREND",
    }
}

db_enum! {
    pub enum ForecastGranularity {
        Daily => "DAILY",
        Weekly => "WEEKLY",
        Monthly => "MONTHLY",
    }
}

impl Default for ForecastGranularity {
    fn default() -> Self {
        ForecastGranularity::Daily
    }
}

pub const MAX_FORECAST_PERIODS: usize = 366;
pub const DEFAULT_WINDOW: usize = 3;
pub const DEFAULT_LOOKBACK_PERIODS: usize = 12;

const WINDOW_RANGE: (u64, u64) = (1, 24);
const LOOKBACK_RANGE: (u64, u64) = (2, 104);

/// Two-sided 95% band.
const Z_95: f64 = 1.96;

fn out_of_range() -> DomainError {
    DomainError::argument("Date out of range")
}

/// An inclusive date range aligned to a granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Period {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl ForecastGranularity {
    /// Weeks start on Monday; months are calendar months.
    pub fn period_containing(&self, date: NaiveDate) -> Result<Period, DomainError> {
        match self {
            ForecastGranularity::Daily => Ok(Period {
                start: date,
                end: date,
            }),
            ForecastGranularity::Weekly => {
                let offset = i64::from(date.weekday().num_days_from_monday());
                let start = date
                    .checked_sub_signed(Duration::days(offset))
                    .ok_or_else(out_of_range)?;
                let end = start
                    .checked_add_signed(Duration::days(6))
                    .ok_or_else(out_of_range)?;
                Ok(Period { start, end })
            }
            ForecastGranularity::Monthly => {
                let start = NaiveDate::from_ymd_opt(date.year(), date.month(), 1)
                    .ok_or_else(out_of_range)?;
                let end = start
                    .checked_add_months(Months::new(1))
                    .and_then(|next| next.pred_opt())
                    .ok_or_else(out_of_range)?;
                Ok(Period { start, end })
            }
        }
    }

    /// Aligned periods from the one containing `from` through the one containing `to`.
    pub fn periods_covering(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<Period>, DomainError> {
        ensure_argument(from <= to, "End date must not be before start date")?;
        let mut periods = Vec::new();
        let mut period = self.period_containing(from)?;
        while period.start <= to {
            ensure_argument(
                periods.len() < MAX_FORECAST_PERIODS,
                format!("At most {} periods can be forecast at once", MAX_FORECAST_PERIODS),
            )?;
            periods.push(period);
            let next = period.end.succ_opt().ok_or_else(out_of_range)?;
            period = self.period_containing(next)?;
        }
        Ok(periods)
    }

    /// The `count` periods right before `first`, oldest first.
    pub fn periods_before(&self, first: &Period, count: usize) -> Result<Vec<Period>, DomainError> {
        let mut periods = Vec::with_capacity(count);
        let mut anchor = first.start;
        for _ in 0..count {
            let previous = anchor.pred_opt().ok_or_else(out_of_range)?;
            let period = self.period_containing(previous)?;
            anchor = period.start;
            periods.push(period);
        }
        periods.reverse();
        Ok(periods)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForecastModel {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub model_type: ForecastType,
    pub algorithm: ForecastAlgorithm,
    pub hyperparameters: Value,
    pub training_date: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accuracy_mape: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accuracy_rmse: Option<f64>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn usize_param(hyperparameters: &Value, key: &str) -> Option<usize> {
    hyperparameters
        .get(key)
        .and_then(Value::as_u64)
        .and_then(|v| usize::try_from(v).ok())
}

impl ForecastModel {
    pub fn window(&self) -> usize {
        usize_param(&self.hyperparameters, "window").unwrap_or(DEFAULT_WINDOW)
    }

    pub fn lookback_periods(&self) -> usize {
        usize_param(&self.hyperparameters, "lookbackPeriods").unwrap_or(DEFAULT_LOOKBACK_PERIODS)
    }

    /// `hyperparameters` must be an object; known keys must be integers in range.
    pub fn validate_hyperparameters(hyperparameters: &Value) -> Result<(), DomainError> {
        let object = hyperparameters
            .as_object()
            .ok_or_else(|| DomainError::argument("Hyperparameters must be an object"))?;
        for (key, (min, max)) in [("window", WINDOW_RANGE), ("lookbackPeriods", LOOKBACK_RANGE)] {
            if let Some(value) = object.get(key) {
                ensure_argument(
                    value.as_u64().map_or(false, |v| (min..=max).contains(&v)),
                    format!("{} must be an integer between {} and {}", key, min, max),
                )?;
            }
        }
        Ok(())
    }
}

/// One projected period.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projection {
    pub predicted: f64,
    pub lower: f64,
    pub upper: f64,
    pub confidence: f64,
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn std_dev(values: &[f64], center: f64) -> f64 {
    (values.iter().map(|v| (v - center).powi(2)).sum::<f64>() / values.len() as f64).sqrt()
}

/// 1 for a flat history, falling to 0 as the spread reaches the mean.
fn confidence(center: f64, spread: f64) -> f64 {
    if center <= 0.0 {
        return if spread == 0.0 { 1.0 } else { 0.0 };
    }
    round2((1.0 - spread / center).clamp(0.0, 1.0))
}

fn band(predicted: f64, spread: f64, confidence: f64) -> Projection {
    let predicted = predicted.max(0.0);
    Projection {
        predicted: round2(predicted),
        lower: round2((predicted - Z_95 * spread).max(0.0)),
        upper: round2(predicted + Z_95 * spread),
        confidence,
    }
}

/// Projects `horizon` periods following `history` (oldest first).
pub fn project(
    algorithm: ForecastAlgorithm,
    history: &[f64],
    window: usize,
    horizon: usize,
) -> Vec<Projection> {
    if history.is_empty() {
        return vec![band(0.0, 0.0, 0.0); horizon];
    }
    match algorithm {
        ForecastAlgorithm::LinearTrend if history.len() >= 2 => {
            let n = history.len() as f64;
            let x_mean = (n - 1.0) / 2.0;
            let y_mean = mean(history);
            let (mut sxy, mut sxx) = (0.0, 0.0);
            for (x, y) in history.iter().enumerate() {
                let dx = x as f64 - x_mean;
                sxy += dx * (y - y_mean);
                sxx += dx * dx;
            }
            let slope = sxy / sxx;
            let intercept = y_mean - slope * x_mean;
            let residuals: Vec<f64> = history
                .iter()
                .enumerate()
                .map(|(x, y)| y - (intercept + slope * x as f64))
                .collect();
            let spread = std_dev(&residuals, 0.0);
            let score = confidence(y_mean, spread);
            (0..horizon)
                .map(|i| band(intercept + slope * (n + i as f64), spread, score))
                .collect()
        }
        _ => {
            let window = window.clamp(1, history.len());
            let tail = &history[history.len() - window..];
            let center = mean(tail);
            let spread = std_dev(tail, center);
            vec![band(center, spread, confidence(center, spread)); horizon]
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Forecast {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub model_id: Uuid,
    pub forecast_type: ForecastType,
    pub granularity: ForecastGranularity,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub predicted_value: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lower_bound: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upper_bound: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual_value: Option<f64>,
    pub generated_at: DateTime<Utc>,
}

impl Forecast {
    pub fn variance(&self) -> Option<f64> {
        self.actual_value.map(|actual| round2(actual - self.predicted_value))
    }

    pub fn variance_percentage(&self) -> Option<f64> {
        if self.predicted_value == 0.0 {
            return None;
        }
        self.actual_value
            .map(|actual| round2((actual - self.predicted_value) / self.predicted_value * 100.0))
    }

    /// Overwrites an earlier actual, so corrections are possible.
    pub fn record_actual(&mut self, value: f64, today: NaiveDate) -> Result<(), DomainError> {
        ensure_argument(
            value.is_finite() && value >= 0.0,
            "Actual value must be a non-negative number",
        )?;
        ensure_state(
            self.period_start <= today,
            "Cannot record an actual value before the period starts",
        )?;
        self.actual_value = Some(value);
        Ok(())
    }
}

/// A forecast with its variance against the recorded actual.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ForecastView {
    #[serde(flatten)]
    pub forecast: Forecast,
    pub variance: Option<f64>,
    pub variance_percentage: Option<f64>,
}

impl From<Forecast> for ForecastView {
    fn from(forecast: Forecast) -> Self {
        Self {
            variance: forecast.variance(),
            variance_percentage: forecast.variance_percentage(),
            forecast,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateForecastModelRequest {
    pub model_type: ForecastType,
    pub algorithm: ForecastAlgorithm,
    pub hyperparameters: Option<Value>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "validate_forecast_window"))]
pub struct GenerateForecastRequest {
    pub forecast_type: ForecastType,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub granularity: ForecastGranularity,
}

fn validate_forecast_window(request: &GenerateForecastRequest) -> Result<(), ValidationError> {
    if request.end_date < request.start_date {
        let mut err = ValidationError::new("date_order");
        err.message = Some("End date must not be before start date".into());
        return Err(err);
    }
    Ok(())
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RecordActualRequest {
    #[validate(range(min = 0.0, message = "Actual value must be non-negative"))]
    pub actual_value: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForecastQuery {
    pub forecast_type: Option<ForecastType>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn forecast(predicted: f64, period_start: NaiveDate) -> Forecast {
        Forecast {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            model_id: Uuid::new_v4(),
            forecast_type: ForecastType::Revenue,
            granularity: ForecastGranularity::Daily,
            period_start,
            period_end: period_start,
            predicted_value: predicted,
            lower_bound: None,
            upper_bound: None,
            confidence_score: None,
            actual_value: None,
            generated_at: Utc::now(),
        }
    }

    #[test]
    fn test_weekly_periods_start_on_monday() {
        // 2024-05-15 is a Wednesday
        let period = ForecastGranularity::Weekly
            .period_containing(date(2024, 5, 15))
            .unwrap();
        assert_eq!(period.start, date(2024, 5, 13));
        assert_eq!(period.end, date(2024, 5, 19));
    }

    #[test]
    fn test_monthly_period_ends_on_last_day() {
        let period = ForecastGranularity::Monthly
            .period_containing(date(2024, 2, 10))
            .unwrap();
        assert_eq!(period.start, date(2024, 2, 1));
        assert_eq!(period.end, date(2024, 2, 29));
    }

    #[test]
    fn test_periods_covering_and_before() {
        let monthly = ForecastGranularity::Monthly;
        let periods = monthly
            .periods_covering(date(2024, 11, 20), date(2025, 1, 3))
            .unwrap();
        assert_eq!(periods.len(), 3);
        assert_eq!(periods[2].start, date(2025, 1, 1));

        let history = monthly.periods_before(&periods[0], 2).unwrap();
        assert_eq!(history[0].start, date(2024, 9, 1));
        assert_eq!(history[1].end, date(2024, 10, 31));
    }

    #[test]
    fn test_period_count_is_capped() {
        let daily = ForecastGranularity::Daily;
        assert_eq!(
            daily.periods_covering(date(2024, 1, 1), date(2024, 12, 31)).unwrap().len(),
            366
        );
        assert!(daily.periods_covering(date(2024, 1, 1), date(2025, 1, 1)).is_err());
        assert!(daily.periods_covering(date(2024, 1, 2), date(2024, 1, 1)).is_err());
    }

    #[test]
    fn test_moving_average_uses_window() {
        let projections = project(ForecastAlgorithm::MovingAverage, &[100.0, 10.0, 20.0, 30.0], 3, 2);
        assert_eq!(projections.len(), 2);
        assert_eq!(projections[0].predicted, 20.0);
        assert_eq!(projections[1], projections[0]);
        assert!(projections[0].lower < 20.0 && projections[0].upper > 20.0);
    }

    #[test]
    fn test_linear_trend_extrapolates() {
        let projections = project(ForecastAlgorithm::LinearTrend, &[10.0, 20.0, 30.0, 40.0], 3, 2);
        assert_eq!(projections[0].predicted, 50.0);
        assert_eq!(projections[1].predicted, 60.0);
        assert_eq!(projections[0].lower, 50.0);
        assert_eq!(projections[0].confidence, 1.0);
    }

    #[test]
    fn test_projections_never_go_negative() {
        let projections = project(ForecastAlgorithm::LinearTrend, &[30.0, 20.0, 10.0], 3, 3);
        assert_eq!(projections[2].predicted, 0.0);
        assert_eq!(projections[2].lower, 0.0);

        let empty = project(ForecastAlgorithm::MovingAverage, &[], 3, 2);
        assert!(empty.iter().all(|p| p.predicted == 0.0 && p.confidence == 0.0));
    }

    #[test]
    fn test_hyperparameters() {
        assert!(ForecastModel::validate_hyperparameters(&json!({ "window": 6 })).is_ok());
        assert!(ForecastModel::validate_hyperparameters(&json!({ "window": 0 })).is_err());
        assert!(ForecastModel::validate_hyperparameters(&json!({ "lookbackPeriods": 500 })).is_err());
        assert!(ForecastModel::validate_hyperparameters(&json!([1, 2])).is_err());
        assert!(ForecastModel::validate_hyperparameters(&json!({ "seasonality": "weekly" })).is_ok());
    }

    #[test]
    fn test_record_actual_and_variance() {
        let today = date(2024, 6, 1);
        let mut f = forecast(200.0, today);
        assert_eq!(f.variance(), None);

        f.record_actual(250.0, today).unwrap();
        assert_eq!(f.variance(), Some(50.0));
        assert_eq!(f.variance_percentage(), Some(25.0));

        f.record_actual(180.0, today).unwrap();
        assert_eq!(f.variance_percentage(), Some(-10.0));
        assert!(f.record_actual(-1.0, today).is_err());
        assert!(f.record_actual(f64::NAN, today).is_err());
    }

    #[test]
    fn test_actual_waits_for_period_start() {
        let mut f = forecast(10.0, date(2024, 6, 2));
        assert!(matches!(
            f.record_actual(5.0, date(2024, 6, 1)),
            Err(DomainError::InvalidState(_))
        ));
    }

    #[test]
    fn test_zero_prediction_has_no_variance_percentage() {
        let mut f = forecast(0.0, date(2024, 6, 1));
        f.record_actual(3.0, date(2024, 6, 1)).unwrap();
        assert_eq!(f.variance(), Some(3.0));
        assert_eq!(f.variance_percentage(), None);
    }

    #[test]
    fn test_generate_request_date_order() {
        let request: GenerateForecastRequest = serde_json::from_value(json!({
            "forecastType": "REVENUE",
            "startDate": "2024-06-10",
            "endDate": "2024-06-01",
        }))
        .unwrap();
        assert_eq!(request.granularity, ForecastGranularity::Daily);
        assert!(request.validate().is_err());
    }
}
