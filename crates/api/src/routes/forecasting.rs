//! Forecast models, generated forecasts and recorded actuals.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{Duration, Utc};
use domain::models::forecast::{
    project, CreateForecastModelRequest, ForecastQuery, GenerateForecastRequest, RecordActualRequest,
};
use domain::models::{AuditAction, ForecastModel, ForecastType, ForecastView};
use persistence::repositories::{ForecastRepository, NewForecast};
use serde::Deserialize;
use serde_json::json;
use shared::pagination::Page;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::{Paging, UserAuth};

const DEFAULT_HORIZON_DAYS: i64 = 30;
const MAX_HORIZON_DAYS: i64 = 365;

#[derive(Debug, Deserialize)]
pub struct HorizonQuery {
    pub days: Option<i64>,
}

// Models

/// Register a model. New models start inactive.
///
/// POST /api/forecasting/models
pub async fn create_model(
    State(state): State<AppState>,
    auth: UserAuth,
    Json(request): Json<CreateForecastModelRequest>,
) -> Result<(StatusCode, Json<ForecastModel>), ApiError> {
    request.validate()?;
    let hyperparameters = request.hyperparameters.clone().unwrap_or_else(|| json!({}));
    ForecastModel::validate_hyperparameters(&hyperparameters)?;

    let model = ForecastRepository::new(state.pool.clone())
        .create_model(auth.tenant()?, &request, &hyperparameters)
        .await?;
    state.audit(
        auth.audit(AuditAction::ForecastModelChange)
            .on(model.id)
            .with_resource_name(format!("{} {}", model.model_type, model.algorithm)),
    );
    Ok((StatusCode::CREATED, Json(model)))
}

/// GET /api/forecasting/models?page=&size=
pub async fn list_models(
    State(state): State<AppState>,
    auth: UserAuth,
    Paging(page): Paging,
) -> Result<Json<Page<ForecastModel>>, ApiError> {
    let (models, total) = ForecastRepository::new(state.pool.clone())
        .list_models(auth.tenant()?, &page)
        .await?;
    Ok(Json(Page::new(models, page, total)))
}

/// GET /api/forecasting/models/:model_id
pub async fn get_model(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(model_id): Path<Uuid>,
) -> Result<Json<ForecastModel>, ApiError> {
    let model = ForecastRepository::new(state.pool.clone())
        .find_model(auth.tenant()?, model_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Forecast model not found".to_string()))?;
    Ok(Json(model))
}

/// One per forecast type at most.
///
/// GET /api/forecasting/models/active
pub async fn active_models(
    State(state): State<AppState>,
    auth: UserAuth,
) -> Result<Json<Vec<ForecastModel>>, ApiError> {
    let models = ForecastRepository::new(state.pool.clone())
        .list_active_models(auth.tenant()?)
        .await?;
    Ok(Json(models))
}

/// Make this the only active model of its type.
///
/// POST /api/forecasting/models/:model_id/activate
pub async fn activate_model(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(model_id): Path<Uuid>,
) -> Result<Json<ForecastModel>, ApiError> {
    let tenant_id = auth.tenant()?;
    let model = ForecastRepository::new(state.pool.clone())
        .activate_model(tenant_id, model_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Forecast model not found".to_string()))?;

    state.audit(
        auth.audit(AuditAction::ForecastModelChange)
            .on(model.id)
            .with_change("isActive", Some("false".into()), Some("true".into())),
    );
    info!(tenant_id = %tenant_id, model_id = %model.id, model_type = %model.model_type, "Forecast model activated");
    Ok(Json(model))
}

// Forecasts

/// Project the requested periods with the active model of the type.
///
/// POST /api/forecasting/generate
pub async fn generate(
    State(state): State<AppState>,
    auth: UserAuth,
    Json(request): Json<GenerateForecastRequest>,
) -> Result<(StatusCode, Json<Vec<ForecastView>>), ApiError> {
    request.validate()?;
    let tenant_id = auth.tenant()?;
    let granularity = request.granularity;
    let periods = granularity.periods_covering(request.start_date, request.end_date)?;
    let first = periods
        .first()
        .ok_or_else(|| ApiError::Validation("No periods to forecast".to_string()))?;

    let repo = ForecastRepository::new(state.pool.clone());
    let model = repo
        .find_active_model(tenant_id, request.forecast_type)
        .await?
        .ok_or_else(|| {
            ApiError::NotFound(format!("No active forecast model for {}", request.forecast_type))
        })?;

    let history_periods = granularity.periods_before(first, model.lookback_periods())?;
    let history = repo
        .history(tenant_id, request.forecast_type, &history_periods)
        .await?;
    let projections = project(model.algorithm, &history, model.window(), periods.len());

    let new: Vec<NewForecast> = periods
        .iter()
        .zip(projections)
        .map(|(period, projection)| NewForecast {
            model_id: model.id,
            forecast_type: request.forecast_type,
            granularity,
            period: *period,
            projection,
        })
        .collect();
    let forecasts = repo.upsert_forecasts(tenant_id, &new).await?;

    state.audit(
        auth.audit(AuditAction::ForecastGenerate)
            .on(model.id)
            .with_resource_name(format!(
                "{} {} {}..{}",
                request.forecast_type, granularity, request.start_date, request.end_date
            )),
    );
    info!(
        tenant_id = %tenant_id,
        model_id = %model.id,
        forecast_type = %request.forecast_type,
        periods = forecasts.len(),
        history_periods = history.len(),
        "Forecasts generated"
    );
    Ok((
        StatusCode::CREATED,
        Json(forecasts.into_iter().map(ForecastView::from).collect()),
    ))
}

async fn upcoming(
    state: &AppState,
    auth: &UserAuth,
    forecast_type: ForecastType,
    query: HorizonQuery,
) -> Result<Vec<ForecastView>, ApiError> {
    let days = query.days.unwrap_or(DEFAULT_HORIZON_DAYS);
    if !(1..=MAX_HORIZON_DAYS).contains(&days) {
        return Err(ApiError::Validation(format!(
            "Days must be between 1 and {}",
            MAX_HORIZON_DAYS
        )));
    }
    let today = Utc::now().date_naive();
    let forecasts = ForecastRepository::new(state.pool.clone())
        .list_forecasts(
            auth.tenant()?,
            &ForecastQuery {
                forecast_type: Some(forecast_type),
                from: Some(today),
                to: Some(today + Duration::days(days)),
            },
        )
        .await?;
    Ok(forecasts.into_iter().map(ForecastView::from).collect())
}

/// GET /api/forecasting/revenue?days=
pub async fn revenue_forecasts(
    State(state): State<AppState>,
    auth: UserAuth,
    Query(query): Query<HorizonQuery>,
) -> Result<Json<Vec<ForecastView>>, ApiError> {
    Ok(Json(upcoming(&state, &auth, ForecastType::Revenue, query).await?))
}

/// GET /api/forecasting/membership?days=
pub async fn membership_forecasts(
    State(state): State<AppState>,
    auth: UserAuth,
    Query(query): Query<HorizonQuery>,
) -> Result<Json<Vec<ForecastView>>, ApiError> {
    Ok(Json(
        upcoming(&state, &auth, ForecastType::MembershipCount, query).await?,
    ))
}

/// GET /api/forecasting/forecasts?forecastType=&from=&to=
pub async fn list_forecasts(
    State(state): State<AppState>,
    auth: UserAuth,
    Query(query): Query<ForecastQuery>,
) -> Result<Json<Vec<ForecastView>>, ApiError> {
    let forecasts = ForecastRepository::new(state.pool.clone())
        .list_forecasts(auth.tenant()?, &query)
        .await?;
    Ok(Json(forecasts.into_iter().map(ForecastView::from).collect()))
}

/// GET /api/forecasting/forecasts/:forecast_id
pub async fn get_forecast(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(forecast_id): Path<Uuid>,
) -> Result<Json<ForecastView>, ApiError> {
    let forecast = ForecastRepository::new(state.pool.clone())
        .find_forecast(auth.tenant()?, forecast_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Forecast not found".to_string()))?;
    Ok(Json(forecast.into()))
}

/// Record what actually happened in the period.
///
/// POST /api/forecasting/forecasts/:forecast_id/actual
pub async fn record_actual(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(forecast_id): Path<Uuid>,
    Json(request): Json<RecordActualRequest>,
) -> Result<Json<ForecastView>, ApiError> {
    request.validate()?;
    let repo = ForecastRepository::new(state.pool.clone());
    let mut forecast = repo
        .find_forecast(auth.tenant()?, forecast_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Forecast not found".to_string()))?;
    let previous = forecast.actual_value;
    forecast.record_actual(request.actual_value, Utc::now().date_naive())?;
    let forecast = repo.record_actual(&forecast).await?;

    state.audit(
        auth.audit(AuditAction::ForecastActualRecord)
            .on(forecast.id)
            .with_change(
                "actualValue",
                previous.map(|v| v.to_string()),
                forecast.actual_value.map(|v| v.to_string()),
            ),
    );
    Ok(Json(forecast.into()))
}
