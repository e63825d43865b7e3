//! Class booking handlers.
//!
//! Members may book, cancel and list only for their own member profile;
//! staff act on behalf of any member in the club.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use domain::models::booking::{
    BulkBookingIdsRequest, BulkCreateBookingsRequest, CancelBookingRequest, CreateBookingRequest,
};
use domain::models::{
    AuditAction, Booking, BulkItemResult, BulkResponse, Role, UpcomingBooking,
};
use persistence::repositories::{BookingRepository, MemberRepository};
use shared::pagination::Page;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::{Paging, UserAuth};
use crate::services::BookingService;

/// Refuses a MEMBER acting for anyone but the member profile linked to them.
async fn ensure_self_service(
    state: &AppState,
    auth: &UserAuth,
    tenant_id: Uuid,
    member_id: Uuid,
) -> Result<(), ApiError> {
    if auth.role != Role::Member {
        return Ok(());
    }
    let own = MemberRepository::new(state.pool.clone())
        .find_by_user_id(tenant_id, auth.user_id)
        .await?;
    match own {
        Some(member) if member.id == member_id => Ok(()),
        _ => Err(ApiError::Forbidden(
            "Members can only manage their own bookings".to_string(),
        )),
    }
}

async fn load(state: &AppState, tenant_id: Uuid, booking_id: Uuid) -> Result<Booking, ApiError> {
    BookingRepository::new(state.pool.clone())
        .find_by_id(tenant_id, booking_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Booking not found".to_string()))
}

/// Book a member into a session, or onto its waitlist when full.
///
/// POST /api/bookings
pub async fn create_booking(
    State(state): State<AppState>,
    auth: UserAuth,
    Json(request): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<Booking>), ApiError> {
    request.validate()?;
    let tenant_id = auth.tenant()?;
    ensure_self_service(&state, &auth, tenant_id, request.member_id).await?;

    let booking = BookingService::new(state.pool.clone())
        .book(tenant_id, request.session_id, request.member_id, Utc::now())
        .await?;

    Ok((StatusCode::CREATED, Json(booking)))
}

/// Book several members into one session. Each member succeeds or fails on its own.
///
/// POST /api/bookings/bulk
pub async fn bulk_create_bookings(
    State(state): State<AppState>,
    auth: UserAuth,
    Json(request): Json<BulkCreateBookingsRequest>,
) -> Result<Json<BulkResponse<Booking>>, ApiError> {
    request.validate()?;
    let tenant_id = auth.tenant()?;
    let service = BookingService::new(state.pool.clone());

    let mut results = Vec::with_capacity(request.member_ids.len());
    for member_id in &request.member_ids {
        let outcome = service
            .book(tenant_id, request.session_id, *member_id, Utc::now())
            .await;
        results.push(match outcome {
            Ok(booking) => BulkItemResult::ok(*member_id, booking),
            Err(e) => BulkItemResult::failed(*member_id, e.client_message()),
        });
    }

    Ok(Json(results.into()))
}

/// GET /api/bookings/:booking_id
pub async fn get_booking(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<Booking>, ApiError> {
    let tenant_id = auth.tenant()?;
    let booking = load(&state, tenant_id, booking_id).await?;
    ensure_self_service(&state, &auth, tenant_id, booking.member_id).await?;
    Ok(Json(booking))
}

/// Cancel a booking. A freed seat passes to the head of the waitlist.
///
/// POST /api/bookings/:booking_id/cancel
pub async fn cancel_booking(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(booking_id): Path<Uuid>,
    Json(request): Json<CancelBookingRequest>,
) -> Result<Json<Booking>, ApiError> {
    request.validate()?;
    let tenant_id = auth.tenant()?;
    let booking = load(&state, tenant_id, booking_id).await?;
    ensure_self_service(&state, &auth, tenant_id, booking.member_id).await?;

    let booking = BookingService::new(state.pool.clone())
        .cancel(tenant_id, booking_id, request.reason, Utc::now())
        .await?;
    state.audit(
        auth.audit(AuditAction::BookingCancel)
            .on(booking.id)
            .with_resource_name(booking.session_id.to_string()),
    );

    Ok(Json(booking))
}

/// POST /api/bookings/bulk-cancel
pub async fn bulk_cancel_bookings(
    State(state): State<AppState>,
    auth: UserAuth,
    Json(request): Json<BulkBookingIdsRequest>,
) -> Result<Json<BulkResponse<Booking>>, ApiError> {
    request.validate()?;
    let tenant_id = auth.tenant()?;
    let service = BookingService::new(state.pool.clone());

    let mut results = Vec::with_capacity(request.booking_ids.len());
    for id in &request.booking_ids {
        results.push(match service.cancel(tenant_id, *id, None, Utc::now()).await {
            Ok(booking) => {
                state.audit(auth.audit(AuditAction::BookingCancel).on(booking.id));
                BulkItemResult::ok(*id, booking)
            }
            Err(e) => BulkItemResult::failed(*id, e.client_message()),
        });
    }

    Ok(Json(results.into()))
}

/// POST /api/bookings/:booking_id/check-in
pub async fn check_in_booking(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<Booking>, ApiError> {
    let booking = BookingService::new(state.pool.clone())
        .check_in(auth.tenant()?, booking_id, Utc::now())
        .await?;
    Ok(Json(booking))
}

/// POST /api/bookings/bulk-check-in
pub async fn bulk_check_in_bookings(
    State(state): State<AppState>,
    auth: UserAuth,
    Json(request): Json<BulkBookingIdsRequest>,
) -> Result<Json<BulkResponse<Booking>>, ApiError> {
    request.validate()?;
    let tenant_id = auth.tenant()?;
    let service = BookingService::new(state.pool.clone());

    let mut results = Vec::with_capacity(request.booking_ids.len());
    for id in &request.booking_ids {
        results.push(match service.check_in(tenant_id, *id, Utc::now()).await {
            Ok(booking) => BulkItemResult::ok(*id, booking),
            Err(e) => BulkItemResult::failed(*id, e.client_message()),
        });
    }

    Ok(Json(results.into()))
}

/// POST /api/bookings/:booking_id/no-show
pub async fn mark_no_show(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<Booking>, ApiError> {
    let booking = BookingService::new(state.pool.clone())
        .mark_no_show(auth.tenant()?, booking_id)
        .await?;
    Ok(Json(booking))
}

/// Delete a cancelled or no-show booking.
///
/// DELETE /api/bookings/:booking_id
pub async fn delete_booking(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(booking_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let tenant_id = auth.tenant()?;
    let booking = load(&state, tenant_id, booking_id).await?;
    if !booking.can_be_deleted() {
        return Err(ApiError::Conflict(format!(
            "Cannot delete booking in status {}",
            booking.status
        )));
    }
    BookingRepository::new(state.pool.clone())
        .delete(tenant_id, booking_id)
        .await?;

    state.audit(auth.audit(AuditAction::BookingDelete).on(booking_id));
    info!(tenant_id = %tenant_id, booking_id = %booking_id, "Booking deleted");

    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/sessions/:session_id/bookings
pub async fn list_session_bookings(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(session_id): Path<Uuid>,
) -> Result<Json<Vec<Booking>>, ApiError> {
    let bookings = BookingRepository::new(state.pool.clone())
        .list_by_session(auth.tenant()?, session_id, None)
        .await?;
    Ok(Json(bookings))
}

/// GET /api/members/:member_id/bookings?page=&size=
pub async fn list_member_bookings(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(member_id): Path<Uuid>,
    Paging(page): Paging,
) -> Result<Json<Page<Booking>>, ApiError> {
    let tenant_id = auth.tenant()?;
    ensure_self_service(&state, &auth, tenant_id, member_id).await?;
    let (bookings, total) = BookingRepository::new(state.pool.clone())
        .list_by_member(tenant_id, member_id, &page)
        .await?;
    Ok(Json(Page::new(bookings, page, total)))
}

/// GET /api/members/:member_id/bookings/upcoming
pub async fn upcoming_member_bookings(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(member_id): Path<Uuid>,
) -> Result<Json<Vec<UpcomingBooking>>, ApiError> {
    let tenant_id = auth.tenant()?;
    ensure_self_service(&state, &auth, tenant_id, member_id).await?;
    let bookings = BookingRepository::new(state.pool.clone())
        .upcoming_for_member(tenant_id, member_id, Utc::now().date_naive())
        .await?;
    Ok(Json(bookings))
}
