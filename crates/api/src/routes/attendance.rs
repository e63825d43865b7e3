//! Attendance handlers: check-in, check-out and visit history.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use domain::models::attendance::{AttendanceSummary, CheckInMethod, CheckInRequest};
use domain::models::AttendanceRecord;
use persistence::repositories::AttendanceRepository;
use serde::{Deserialize, Serialize};
use shared::pagination::Page;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::{Paging, UserAuth};
use crate::middleware::record_business_event;
use crate::services::AttendanceService;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckOutRequest {
    pub member_id: Uuid,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitCount {
    pub member_id: Uuid,
    pub total_visits: i64,
}

/// Check a member in at a location.
///
/// POST /api/attendance/check-in
pub async fn check_in(
    State(state): State<AppState>,
    auth: UserAuth,
    Json(request): Json<CheckInRequest>,
) -> Result<(StatusCode, Json<AttendanceRecord>), ApiError> {
    request.validate()?;
    let record = AttendanceService::new(state.pool.clone())
        .check_in(
            auth.tenant()?,
            request.member_id,
            request.location_id,
            request.method.unwrap_or(CheckInMethod::Manual),
            Some(auth.user_id),
            Utc::now(),
        )
        .await?;

    record_business_event("check_in");
    Ok((StatusCode::CREATED, Json(record)))
}

/// Close the member's open visit.
///
/// POST /api/attendance/check-out
pub async fn check_out(
    State(state): State<AppState>,
    auth: UserAuth,
    Json(request): Json<CheckOutRequest>,
) -> Result<Json<AttendanceRecord>, ApiError> {
    let tenant_id = auth.tenant()?;
    let record = AttendanceRepository::new(state.pool.clone())
        .check_out(tenant_id, request.member_id, Utc::now())
        .await?
        .ok_or_else(|| ApiError::NotFound("Member is not checked in".to_string()))?;

    info!(
        tenant_id = %tenant_id,
        member_id = %request.member_id,
        duration_minutes = ?record.duration_minutes(),
        "Member checked out"
    );
    Ok(Json(record))
}

/// The member's open visit, if any.
///
/// GET /api/members/:member_id/attendance/current
pub async fn current_check_in(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(member_id): Path<Uuid>,
) -> Result<Json<AttendanceRecord>, ApiError> {
    let record = AttendanceRepository::new(state.pool.clone())
        .find_open_for_member(auth.tenant()?, member_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Member is not checked in".to_string()))?;
    Ok(Json(record))
}

/// GET /api/members/:member_id/attendance?page=&size=
pub async fn member_history(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(member_id): Path<Uuid>,
    Paging(page): Paging,
) -> Result<Json<Page<AttendanceRecord>>, ApiError> {
    let (records, total) = AttendanceRepository::new(state.pool.clone())
        .history_for_member(auth.tenant()?, member_id, &page)
        .await?;
    Ok(Json(Page::new(records, page, total)))
}

/// GET /api/members/:member_id/attendance/count
pub async fn member_visit_count(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(member_id): Path<Uuid>,
) -> Result<Json<VisitCount>, ApiError> {
    let total_visits = AttendanceRepository::new(state.pool.clone())
        .count_for_member(auth.tenant()?, member_id)
        .await?;
    Ok(Json(VisitCount {
        member_id,
        total_visits,
    }))
}

/// Check-ins since midnight UTC and members currently inside.
///
/// GET /api/attendance/summary
pub async fn summary(
    State(state): State<AppState>,
    auth: UserAuth,
) -> Result<Json<AttendanceSummary>, ApiError> {
    let tenant_id = auth.tenant()?;
    let repo = AttendanceRepository::new(state.pool.clone());
    let midnight = Utc::now()
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .map(|t| t.and_utc())
        .ok_or_else(|| ApiError::Internal("Invalid start of day".to_string()))?;

    Ok(Json(AttendanceSummary {
        today: repo.count_since(tenant_id, midnight).await?,
        currently_checked_in: repo.count_checked_in(tenant_id).await?,
    }))
}
