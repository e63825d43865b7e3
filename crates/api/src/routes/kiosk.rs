//! Kiosk devices and self-service check-in sessions.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use domain::models::attendance::CheckInMethod;
use domain::models::kiosk::{
    CreateKioskRequest, IdentificationMethod, IdentifyMemberRequest, StartKioskSessionRequest,
    UpdateKioskRequest,
};
use domain::models::{AttendanceRecord, AuditAction, KioskDevice, KioskSession, Member};
use persistence::repositories::{KioskRepository, MemberRepository};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::UserAuth;
use crate::routes::classes::ensure_location;
use crate::services::AttendanceService;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListKiosksQuery {
    pub location_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KioskCheckInResponse {
    pub session: KioskSession,
    pub attendance: AttendanceRecord,
}

async fn load_device(state: &AppState, tenant_id: Uuid, device_id: Uuid) -> Result<KioskDevice, ApiError> {
    KioskRepository::new(state.pool.clone())
        .find_device(tenant_id, device_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Kiosk not found".to_string()))
}

/// Loads an active session, expiring it first when it has been idle too long.
async fn load_session(
    state: &AppState,
    tenant_id: Uuid,
    session_id: Uuid,
    now: DateTime<Utc>,
) -> Result<KioskSession, ApiError> {
    let repo = KioskRepository::new(state.pool.clone());
    let mut session = repo
        .find_session(tenant_id, session_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Kiosk session not found".to_string()))?;
    if session.expire(now) {
        repo.update_session(&session).await?;
        return Err(ApiError::Conflict("Kiosk session has expired".to_string()));
    }
    Ok(session)
}

// Devices

/// POST /api/kiosks
pub async fn create_device(
    State(state): State<AppState>,
    auth: UserAuth,
    Json(request): Json<CreateKioskRequest>,
) -> Result<(StatusCode, Json<KioskDevice>), ApiError> {
    request.validate()?;
    let tenant_id = auth.tenant()?;
    ensure_location(&state, tenant_id, request.location_id).await?;

    let device = KioskRepository::new(state.pool.clone())
        .create_device(tenant_id, &request)
        .await
        .map_err(|e| match ApiError::from(e) {
            ApiError::Conflict(_) => {
                ApiError::Conflict(format!("Kiosk code {} is already in use", request.code))
            }
            other => other,
        })?;

    state.audit(
        auth.audit(AuditAction::KioskChange)
            .on(device.id)
            .with_resource_name(device.code.clone()),
    );
    info!(tenant_id = %tenant_id, code = %device.code, "Kiosk registered");
    Ok((StatusCode::CREATED, Json(device)))
}

/// GET /api/kiosks?locationId=
pub async fn list_devices(
    State(state): State<AppState>,
    auth: UserAuth,
    Query(query): Query<ListKiosksQuery>,
) -> Result<Json<Vec<KioskDevice>>, ApiError> {
    let devices = KioskRepository::new(state.pool.clone())
        .list_devices(auth.tenant()?, query.location_id)
        .await?;
    Ok(Json(devices))
}

/// GET /api/kiosks/:device_id
pub async fn get_device(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(device_id): Path<Uuid>,
) -> Result<Json<KioskDevice>, ApiError> {
    Ok(Json(load_device(&state, auth.tenant()?, device_id).await?))
}

/// GET /api/kiosks/by-code/:code
pub async fn get_device_by_code(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(code): Path<String>,
) -> Result<Json<KioskDevice>, ApiError> {
    let device = KioskRepository::new(state.pool.clone())
        .find_device_by_code(auth.tenant()?, &code)
        .await?
        .ok_or_else(|| ApiError::NotFound("Kiosk not found".to_string()))?;
    Ok(Json(device))
}

/// PUT /api/kiosks/:device_id
pub async fn update_device(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(device_id): Path<Uuid>,
    Json(request): Json<UpdateKioskRequest>,
) -> Result<Json<KioskDevice>, ApiError> {
    request.validate()?;
    let tenant_id = auth.tenant()?;
    let mut device = load_device(&state, tenant_id, device_id).await?;
    let mut audit = auth.audit(AuditAction::KioskChange).on(device.id);

    if let Some(location_id) = request.location_id {
        ensure_location(&state, tenant_id, location_id).await?;
        device.location_id = location_id;
    }
    if let Some(name) = request.name {
        device.name = name;
    }
    if let Some(status) = request.status {
        if status != device.status {
            audit = audit.with_status_change(device.status, status);
        }
        device.status = status;
    }

    let device = KioskRepository::new(state.pool.clone())
        .update_device(&device)
        .await?;
    state.audit(audit);
    Ok(Json(device))
}

/// POST /api/kiosks/:device_id/heartbeat
pub async fn heartbeat(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(device_id): Path<Uuid>,
) -> Result<Json<KioskDevice>, ApiError> {
    let mut device = load_device(&state, auth.tenant()?, device_id).await?;
    device.heartbeat(Utc::now());
    let device = KioskRepository::new(state.pool.clone())
        .update_device(&device)
        .await?;
    Ok(Json(device))
}

/// DELETE /api/kiosks/:device_id
pub async fn delete_device(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(device_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    if !KioskRepository::new(state.pool.clone())
        .delete_device(auth.tenant()?, device_id)
        .await?
    {
        return Err(ApiError::NotFound("Kiosk not found".to_string()));
    }
    state.audit(auth.audit(AuditAction::KioskChange).on(device_id));
    Ok(StatusCode::NO_CONTENT)
}

// Sessions

/// POST /api/kiosk-sessions
pub async fn start_session(
    State(state): State<AppState>,
    auth: UserAuth,
    Json(request): Json<StartKioskSessionRequest>,
) -> Result<(StatusCode, Json<KioskSession>), ApiError> {
    let tenant_id = auth.tenant()?;
    let device = load_device(&state, tenant_id, request.device_id).await?;
    let now = Utc::now();
    let session = KioskSession::start(&device, now)?;
    let session = KioskRepository::new(state.pool.clone())
        .create_session(&session)
        .await?;
    info!(tenant_id = %tenant_id, device = %device.code, session_id = %session.id, "Kiosk session started");
    Ok((StatusCode::CREATED, Json(session)))
}

/// GET /api/kiosk-sessions/:session_id
pub async fn get_session(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(session_id): Path<Uuid>,
) -> Result<Json<KioskSession>, ApiError> {
    let session = KioskRepository::new(state.pool.clone())
        .find_session(auth.tenant()?, session_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Kiosk session not found".to_string()))?;
    Ok(Json(session))
}

async fn find_member(
    state: &AppState,
    tenant_id: Uuid,
    request: &IdentifyMemberRequest,
) -> Result<Option<Member>, ApiError> {
    let repo = MemberRepository::new(state.pool.clone());
    let member = match request.method {
        IdentificationMethod::MemberId => match request.value.trim().parse::<Uuid>() {
            Ok(id) => repo.find_by_id(tenant_id, id).await?,
            Err(_) => None,
        },
        IdentificationMethod::Email => repo.find_by_email(tenant_id, request.value.trim()).await?,
    };
    Ok(member)
}

/// Identify the member at the kiosk by member id or email.
///
/// POST /api/kiosk-sessions/:session_id/identify
pub async fn identify(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(session_id): Path<Uuid>,
    Json(request): Json<IdentifyMemberRequest>,
) -> Result<Json<KioskSession>, ApiError> {
    request.validate()?;
    let tenant_id = auth.tenant()?;
    let now = Utc::now();
    let mut session = load_session(&state, tenant_id, session_id, now).await?;
    let member = find_member(&state, tenant_id, &request)
        .await?
        .ok_or_else(|| ApiError::NotFound("Member not found".to_string()))?;

    session.identify(member.id, request.method, now)?;
    let session = KioskRepository::new(state.pool.clone())
        .update_session(&session)
        .await?;
    Ok(Json(session))
}

/// Check the identified member in at the kiosk's location.
///
/// POST /api/kiosk-sessions/:session_id/check-in
pub async fn check_in(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(session_id): Path<Uuid>,
) -> Result<Json<KioskCheckInResponse>, ApiError> {
    let tenant_id = auth.tenant()?;
    let now = Utc::now();
    let mut session = load_session(&state, tenant_id, session_id, now).await?;
    let member_id = session.member_for_check_in()?;
    let device = load_device(&state, tenant_id, session.device_id).await?;

    let attendance = AttendanceService::new(state.pool.clone())
        .check_in(
            tenant_id,
            member_id,
            device.location_id,
            CheckInMethod::Kiosk,
            Some(auth.user_id),
            now,
        )
        .await?;

    session.record_check_in(attendance.id, now);
    let session = KioskRepository::new(state.pool.clone())
        .update_session(&session)
        .await?;

    info!(tenant_id = %tenant_id, member_id = %member_id, device = %device.code, "Kiosk check-in");
    Ok(Json(KioskCheckInResponse {
        session,
        attendance,
    }))
}

/// POST /api/kiosk-sessions/:session_id/end
pub async fn end_session(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(session_id): Path<Uuid>,
) -> Result<Json<KioskSession>, ApiError> {
    let now = Utc::now();
    let mut session = load_session(&state, auth.tenant()?, session_id, now).await?;
    session.end(now)?;
    let session = KioskRepository::new(state.pool.clone())
        .update_session(&session)
        .await?;
    Ok(Json(session))
}
