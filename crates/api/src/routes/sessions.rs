//! Class session handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{Duration, Utc};
use domain::models::class_session::{
    validate_time_window, CancelSessionRequest, CreateSessionRequest, SessionQuery,
};
use domain::models::{AuditAction, ClassSession, RosterEntry, SessionStatus};
use persistence::repositories::{
    BookingRepository, ClassSessionRepository, GymClassRepository, NewSession,
};
use serde::Serialize;
use shared::pagination::Page;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::{Paging, UserAuth};
use crate::routes::classes::{ensure_location, ensure_trainer};
use crate::services::BookingService;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelSessionResponse {
    pub session: ClassSession,
    pub bookings_cancelled: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NoShowResponse {
    pub session_id: Uuid,
    pub marked_no_show: u64,
}

async fn load(
    repo: &ClassSessionRepository,
    tenant_id: Uuid,
    id: Uuid,
) -> Result<ClassSession, ApiError> {
    repo.find_by_id(tenant_id, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Class session not found".to_string()))
}

/// Schedule a session of an active class.
///
/// POST /api/sessions
pub async fn create_session(
    State(state): State<AppState>,
    auth: UserAuth,
    Json(request): Json<CreateSessionRequest>,
) -> Result<(StatusCode, Json<ClassSession>), ApiError> {
    request.validate()?;
    let tenant_id = auth.tenant()?;

    let class = GymClassRepository::new(state.pool.clone())
        .find_by_id(tenant_id, request.class_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Class not found".to_string()))?;
    if !class.is_active() {
        return Err(ApiError::Conflict(format!(
            "Cannot schedule a session for a class in status {}",
            class.status
        )));
    }

    let end_time = match request.end_time {
        Some(end) => end,
        None => {
            let (end, wrapped) = request
                .start_time
                .overflowing_add_signed(Duration::minutes(class.duration_minutes as i64));
            if wrapped != 0 {
                return Err(ApiError::Validation(
                    "Session must end on the day it starts".to_string(),
                ));
            }
            end
        }
    };
    validate_time_window(request.start_time, end_time)?;

    let trainer_id = request.trainer_id.or(class.trainer_id);
    let location_id = request.location_id.or(class.location_id);
    if let Some(location_id) = request.location_id {
        ensure_location(&state, tenant_id, location_id).await?;
    }

    let repo = ClassSessionRepository::new(state.pool.clone());
    if let Some(trainer_id) = trainer_id {
        if request.trainer_id.is_some() {
            ensure_trainer(&state, tenant_id, trainer_id).await?;
        }
        if repo
            .trainer_has_overlap(
                tenant_id,
                trainer_id,
                request.session_date,
                request.start_time,
                end_time,
                None,
            )
            .await?
        {
            return Err(ApiError::Conflict(
                "Trainer already has a session at this time".to_string(),
            ));
        }
    }

    let session = repo
        .create(
            tenant_id,
            &NewSession {
                class_id: class.id,
                trainer_id,
                location_id,
                session_date: request.session_date,
                start_time: request.start_time,
                end_time,
                capacity: request.capacity.unwrap_or(class.max_capacity),
                waitlist_enabled: class.waitlist_enabled,
                max_waitlist_size: class.max_waitlist_size,
                deducts_class_from_plan: class.deducts_class_from_plan,
            },
        )
        .await?;

    state.audit(
        auth.audit(AuditAction::SessionCreate)
            .on(session.id)
            .with_resource_name(class.name.clone()),
    );
    info!(
        tenant_id = %tenant_id,
        session_id = %session.id,
        class_id = %class.id,
        date = %session.session_date,
        "Class session scheduled"
    );

    Ok((StatusCode::CREATED, Json(session)))
}

/// GET /api/sessions?classId=&trainerId=&from=&to=&status=&page=&size=
pub async fn list_sessions(
    State(state): State<AppState>,
    auth: UserAuth,
    Query(query): Query<SessionQuery>,
    Paging(page): Paging,
) -> Result<Json<Page<ClassSession>>, ApiError> {
    if let (Some(from), Some(to)) = (query.from, query.to) {
        if to < from {
            return Err(ApiError::Validation(
                "'to' must not be before 'from'".to_string(),
            ));
        }
    }
    let (sessions, total) = ClassSessionRepository::new(state.pool.clone())
        .list(auth.tenant()?, &query, &page)
        .await?;
    Ok(Json(Page::new(sessions, page, total)))
}

/// GET /api/sessions/:session_id
pub async fn get_session(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(session_id): Path<Uuid>,
) -> Result<Json<ClassSession>, ApiError> {
    let repo = ClassSessionRepository::new(state.pool.clone());
    Ok(Json(load(&repo, auth.tenant()?, session_id).await?))
}

/// Cancel a session and every open booking on it.
///
/// POST /api/sessions/:session_id/cancel
pub async fn cancel_session(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(session_id): Path<Uuid>,
    Json(request): Json<CancelSessionRequest>,
) -> Result<Json<CancelSessionResponse>, ApiError> {
    request.validate()?;
    let (session, bookings_cancelled) = BookingService::new(state.pool.clone())
        .cancel_session(auth.tenant()?, session_id, request.reason, Utc::now())
        .await?;

    state.audit(
        auth.audit(AuditAction::SessionCancel)
            .on(session.id)
            .with_status_change(SessionStatus::Scheduled, session.status),
    );

    Ok(Json(CancelSessionResponse {
        session,
        bookings_cancelled,
    }))
}

async fn change_status(
    state: &AppState,
    auth: &UserAuth,
    session_id: Uuid,
    change: fn(&mut ClassSession) -> Result<(), domain::DomainError>,
) -> Result<ClassSession, ApiError> {
    let repo = ClassSessionRepository::new(state.pool.clone());
    let mut session = load(&repo, auth.tenant()?, session_id).await?;
    let from = session.status;
    change(&mut session)?;
    let session = repo.update(&session).await?;

    state.audit(
        auth.audit(AuditAction::SessionUpdate)
            .on(session.id)
            .with_status_change(from, session.status),
    );
    Ok(session)
}

/// POST /api/sessions/:session_id/start
pub async fn start_session(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(session_id): Path<Uuid>,
) -> Result<Json<ClassSession>, ApiError> {
    Ok(Json(change_status(&state, &auth, session_id, ClassSession::start).await?))
}

/// POST /api/sessions/:session_id/complete
pub async fn complete_session(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(session_id): Path<Uuid>,
) -> Result<Json<ClassSession>, ApiError> {
    Ok(Json(change_status(&state, &auth, session_id, ClassSession::complete).await?))
}

/// Members booked on the session, seated first then by waitlist position.
///
/// GET /api/sessions/:session_id/roster
pub async fn roster(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(session_id): Path<Uuid>,
) -> Result<Json<Vec<RosterEntry>>, ApiError> {
    let tenant_id = auth.tenant()?;
    load(&ClassSessionRepository::new(state.pool.clone()), tenant_id, session_id).await?;
    let entries = BookingRepository::new(state.pool.clone())
        .roster(tenant_id, session_id)
        .await?;
    Ok(Json(entries))
}

/// Mark every confirmed booking that never checked in as a no-show.
///
/// POST /api/sessions/:session_id/no-shows
pub async fn process_no_shows(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(session_id): Path<Uuid>,
) -> Result<Json<NoShowResponse>, ApiError> {
    let tenant_id = auth.tenant()?;
    let session = load(&ClassSessionRepository::new(state.pool.clone()), tenant_id, session_id).await?;
    if !matches!(session.status, SessionStatus::InProgress | SessionStatus::Completed) {
        return Err(ApiError::Conflict(format!(
            "Cannot process no-shows for session in status {}",
            session.status
        )));
    }

    let marked_no_show = BookingRepository::new(state.pool.clone())
        .mark_no_shows_for_session(tenant_id, session_id)
        .await?;
    info!(tenant_id = %tenant_id, session_id = %session_id, marked_no_show, "No-shows processed");

    Ok(Json(NoShowResponse {
        session_id,
        marked_no_show,
    }))
}

/// Delete a session that holds no bookings.
///
/// DELETE /api/sessions/:session_id
pub async fn delete_session(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(session_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let tenant_id = auth.tenant()?;
    let repo = ClassSessionRepository::new(state.pool.clone());
    let session = load(&repo, tenant_id, session_id).await?;
    if session.booked_count > 0 || session.waitlist_count > 0 {
        return Err(ApiError::Conflict(
            "Session has bookings; cancel it instead".to_string(),
        ));
    }
    repo.delete(tenant_id, session_id).await?;

    state.audit(auth.audit(AuditAction::SessionCancel).on(session_id));
    Ok(StatusCode::NO_CONTENT)
}
