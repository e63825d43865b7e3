//! Subscription lifecycle handlers.
//!
//! Each transition loads the subscription, applies the domain rule and writes
//! the row back. Illegal transitions surface as 409 naming the current status.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{NaiveDate, Utc};
use domain::models::subscription::{
    ConfirmPaymentRequest, CreateSubscriptionRequest, NewSubscription, RenewSubscriptionRequest,
    RequestCancellationRequest, SubscriptionQuery,
};
use domain::models::{AuditAction, Subscription};
use domain::DomainError;
use persistence::repositories::{
    MemberRepository, MembershipPlanRepository, SubscriptionRepository,
};
use shared::pagination::Page;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::{Paging, UserAuth};

/// Notice period applied when a cancellation request does not name one.
const DEFAULT_NOTICE_DAYS: i64 = 30;

async fn transition<F>(
    state: &AppState,
    auth: &UserAuth,
    subscription_id: Uuid,
    action: AuditAction,
    change: F,
) -> Result<Subscription, ApiError>
where
    F: FnOnce(&mut Subscription) -> Result<(), DomainError>,
{
    let tenant_id = auth.tenant()?;
    let repo = SubscriptionRepository::new(state.pool.clone());
    let mut subscription = repo
        .find_by_id(tenant_id, subscription_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Subscription not found".to_string()))?;

    let from = subscription.status;
    change(&mut subscription)?;
    let subscription = repo.update(&subscription).await?;

    let mut entry = auth.audit(action).on(subscription.id);
    if from != subscription.status {
        entry = entry.with_status_change(from, subscription.status);
        info!(
            tenant_id = %tenant_id,
            subscription_id = %subscription.id,
            from = %from,
            to = %subscription.status,
            "Subscription status changed"
        );
    }
    state.audit(entry);

    Ok(subscription)
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// Subscribe a member to a plan. The plan's limits are copied onto the subscription.
///
/// POST /api/subscriptions
pub async fn create_subscription(
    State(state): State<AppState>,
    auth: UserAuth,
    Json(request): Json<CreateSubscriptionRequest>,
) -> Result<(StatusCode, Json<Subscription>), ApiError> {
    request.validate()?;
    let tenant_id = auth.tenant()?;

    MemberRepository::new(state.pool.clone())
        .find_by_id(tenant_id, request.member_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Member not found".to_string()))?;
    let plan = MembershipPlanRepository::new(state.pool.clone())
        .find_by_id(tenant_id, request.plan_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Membership plan not found".to_string()))?;

    let repo = SubscriptionRepository::new(state.pool.clone());
    if repo
        .find_active_for_member(tenant_id, request.member_id, today())
        .await?
        .is_some()
    {
        return Err(ApiError::Conflict(
            "Member already has an active subscription".to_string(),
        ));
    }

    let new = NewSubscription::from_plan(
        &plan,
        request.member_id,
        request.start_date.unwrap_or_else(today),
        request.awaiting_payment,
        request.auto_renew,
    )?;
    let subscription = repo.create(tenant_id, &new).await?;

    state.audit(
        auth.audit(AuditAction::SubscriptionCreate)
            .on(subscription.id)
            .with_resource_name(plan.name.clone()),
    );
    info!(
        tenant_id = %tenant_id,
        subscription_id = %subscription.id,
        member_id = %subscription.member_id,
        status = %subscription.status,
        "Subscription created"
    );

    Ok((StatusCode::CREATED, Json(subscription)))
}

/// List subscriptions, filtered by member and status.
///
/// GET /api/subscriptions?memberId=&status=&page=&size=
pub async fn list_subscriptions(
    State(state): State<AppState>,
    auth: UserAuth,
    Query(query): Query<SubscriptionQuery>,
    Paging(page): Paging,
) -> Result<Json<Page<Subscription>>, ApiError> {
    let (subscriptions, total) = SubscriptionRepository::new(state.pool.clone())
        .list(auth.tenant()?, query.member_id, query.status, &page)
        .await?;
    Ok(Json(Page::new(subscriptions, page, total)))
}

/// Get a subscription.
///
/// GET /api/subscriptions/:subscription_id
pub async fn get_subscription(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(subscription_id): Path<Uuid>,
) -> Result<Json<Subscription>, ApiError> {
    let subscription = SubscriptionRepository::new(state.pool.clone())
        .find_by_id(auth.tenant()?, subscription_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Subscription not found".to_string()))?;
    Ok(Json(subscription))
}

/// The member's current active subscription.
///
/// GET /api/members/:member_id/subscriptions/active
pub async fn get_active_subscription(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(member_id): Path<Uuid>,
) -> Result<Json<Subscription>, ApiError> {
    let subscription = SubscriptionRepository::new(state.pool.clone())
        .find_active_for_member(auth.tenant()?, member_id, today())
        .await?
        .ok_or_else(|| ApiError::NotFound("Member has no active subscription".to_string()))?;
    Ok(Json(subscription))
}

/// POST /api/subscriptions/:subscription_id/freeze
pub async fn freeze_subscription(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(id): Path<Uuid>,
) -> Result<Json<Subscription>, ApiError> {
    let today = today();
    let s = transition(&state, &auth, id, AuditAction::SubscriptionStatusChange, |s| {
        s.freeze(today)
    })
    .await?;
    Ok(Json(s))
}

/// Unfreeze; the end date moves out by the days spent frozen.
///
/// POST /api/subscriptions/:subscription_id/unfreeze
pub async fn unfreeze_subscription(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(id): Path<Uuid>,
) -> Result<Json<Subscription>, ApiError> {
    let today = today();
    let s = transition(&state, &auth, id, AuditAction::SubscriptionStatusChange, |s| {
        s.unfreeze(today)
    })
    .await?;
    Ok(Json(s))
}

/// POST /api/subscriptions/:subscription_id/cancel
pub async fn cancel_subscription(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(id): Path<Uuid>,
) -> Result<Json<Subscription>, ApiError> {
    let now = Utc::now();
    let s = transition(&state, &auth, id, AuditAction::SubscriptionStatusChange, |s| {
        s.cancel(now)
    })
    .await?;
    Ok(Json(s))
}

/// POST /api/subscriptions/:subscription_id/renew
pub async fn renew_subscription(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(id): Path<Uuid>,
    Json(request): Json<RenewSubscriptionRequest>,
) -> Result<Json<Subscription>, ApiError> {
    request.validate()?;
    let s = transition(&state, &auth, id, AuditAction::SubscriptionRenew, |s| {
        s.renew(request.new_end_date)
    })
    .await?;
    Ok(Json(s))
}

/// Expire an ACTIVE subscription whose end date has passed.
///
/// POST /api/subscriptions/:subscription_id/expire
pub async fn expire_subscription(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(id): Path<Uuid>,
) -> Result<Json<Subscription>, ApiError> {
    let today = today();
    let s = transition(&state, &auth, id, AuditAction::SubscriptionStatusChange, |s| {
        if s.expire_if_due(today) {
            Ok(())
        } else {
            Err(DomainError::InvalidState(format!(
                "Subscription in status {} ending {} is not due to expire",
                s.status, s.end_date
            )))
        }
    })
    .await?;
    Ok(Json(s))
}

/// POST /api/subscriptions/:subscription_id/confirm-payment
pub async fn confirm_payment(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(id): Path<Uuid>,
    Json(request): Json<ConfirmPaymentRequest>,
) -> Result<Json<Subscription>, ApiError> {
    request.validate()?;
    let s = transition(&state, &auth, id, AuditAction::SubscriptionStatusChange, |s| {
        s.confirm_payment(request.amount)
    })
    .await?;
    Ok(Json(s))
}

/// POST /api/subscriptions/:subscription_id/past-due
pub async fn mark_past_due(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(id): Path<Uuid>,
) -> Result<Json<Subscription>, ApiError> {
    let now = Utc::now();
    let s = transition(&state, &auth, id, AuditAction::SubscriptionStatusChange, |s| {
        s.mark_past_due(now)
    })
    .await?;
    Ok(Json(s))
}

/// POST /api/subscriptions/:subscription_id/suspend
pub async fn suspend_subscription(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(id): Path<Uuid>,
) -> Result<Json<Subscription>, ApiError> {
    let now = Utc::now();
    let s = transition(&state, &auth, id, AuditAction::SubscriptionStatusChange, |s| {
        s.suspend(now)
    })
    .await?;
    Ok(Json(s))
}

/// POST /api/subscriptions/:subscription_id/reactivate
pub async fn reactivate_subscription(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(id): Path<Uuid>,
) -> Result<Json<Subscription>, ApiError> {
    let s = transition(&state, &auth, id, AuditAction::SubscriptionStatusChange, |s| {
        s.reactivate()
    })
    .await?;
    Ok(Json(s))
}

/// Start the notice period. The subscription stays usable until the effective date.
///
/// POST /api/subscriptions/:subscription_id/request-cancellation
pub async fn request_cancellation(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(id): Path<Uuid>,
    Json(request): Json<RequestCancellationRequest>,
) -> Result<Json<Subscription>, ApiError> {
    request.validate()?;
    let now = Utc::now();
    let notice_days = request.notice_days.unwrap_or(DEFAULT_NOTICE_DAYS);
    let s = transition(&state, &auth, id, AuditAction::SubscriptionStatusChange, |s| {
        s.request_cancellation(now, notice_days, request.reason)
            .map(|_| ())
    })
    .await?;
    Ok(Json(s))
}

/// POST /api/subscriptions/:subscription_id/complete-cancellation
pub async fn complete_cancellation(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(id): Path<Uuid>,
) -> Result<Json<Subscription>, ApiError> {
    let now = Utc::now();
    let s = transition(&state, &auth, id, AuditAction::SubscriptionStatusChange, |s| {
        s.complete_cancellation(now)
    })
    .await?;
    Ok(Json(s))
}

/// POST /api/subscriptions/:subscription_id/withdraw-cancellation
pub async fn withdraw_cancellation(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(id): Path<Uuid>,
) -> Result<Json<Subscription>, ApiError> {
    let s = transition(&state, &auth, id, AuditAction::SubscriptionStatusChange, |s| {
        s.withdraw_cancellation()
    })
    .await?;
    Ok(Json(s))
}

/// Consume one class from a limited plan.
///
/// POST /api/subscriptions/:subscription_id/use-class
pub async fn use_class(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(id): Path<Uuid>,
) -> Result<Json<Subscription>, ApiError> {
    let s = transition(&state, &auth, id, AuditAction::SubscriptionStatusChange, |s| {
        s.use_class()
    })
    .await?;
    Ok(Json(s))
}

/// POST /api/subscriptions/:subscription_id/use-guest-pass
pub async fn use_guest_pass(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(id): Path<Uuid>,
) -> Result<Json<Subscription>, ApiError> {
    let s = transition(&state, &auth, id, AuditAction::SubscriptionStatusChange, |s| {
        s.use_guest_pass()
    })
    .await?;
    Ok(Json(s))
}
