//! Member endpoint handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use domain::models::bulk::{BulkItemResult, BulkResponse};
use domain::models::member::{
    BulkMemberActionRequest, CreateMemberRequest, MemberAction, MemberCounts, MemberQuery,
    UpdateMemberRequest,
};
use domain::models::{AuditAction, Member, MemberStatus};
use persistence::repositories::MemberRepository;
use shared::pagination::Page;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::{Paging, UserAuth};

async fn load(repo: &MemberRepository, tenant_id: Uuid, id: Uuid) -> Result<Member, ApiError> {
    repo.find_by_id(tenant_id, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Member not found".to_string()))
}

async fn apply_action(
    state: &AppState,
    auth: &UserAuth,
    repo: &MemberRepository,
    tenant_id: Uuid,
    member_id: Uuid,
    action: MemberAction,
) -> Result<Member, ApiError> {
    let mut member = load(repo, tenant_id, member_id).await?;
    let from = member.status;
    member.apply(action)?;
    let member = repo.update(&member).await?;

    state.audit(
        auth.audit(AuditAction::MemberStatusChange)
            .on(member.id)
            .with_status_change(from, member.status),
    );
    info!(
        tenant_id = %tenant_id,
        member_id = %member_id,
        from = %from,
        to = %member.status,
        "Member status changed"
    );
    Ok(member)
}

/// Create a member.
///
/// POST /api/members
pub async fn create_member(
    State(state): State<AppState>,
    auth: UserAuth,
    Json(request): Json<CreateMemberRequest>,
) -> Result<(StatusCode, Json<Member>), ApiError> {
    request.validate()?;
    let tenant_id = auth.tenant()?;

    let repo = MemberRepository::new(state.pool.clone());
    if repo.find_by_email(tenant_id, &request.email).await?.is_some() {
        return Err(ApiError::Conflict(
            "A member with this email already exists".to_string(),
        ));
    }

    let status = if request.activate {
        MemberStatus::Active
    } else {
        MemberStatus::Pending
    };
    let member = repo.create(tenant_id, &request, status).await?;

    state.audit(
        auth.audit(AuditAction::MemberCreate)
            .on(member.id)
            .with_resource_name(member.full_name()),
    );
    info!(tenant_id = %tenant_id, member_id = %member.id, "Member created");

    Ok((StatusCode::CREATED, Json(member)))
}

/// List members with optional search and status filter.
///
/// GET /api/members?search=&status=&page=&size=
pub async fn list_members(
    State(state): State<AppState>,
    auth: UserAuth,
    Query(query): Query<MemberQuery>,
    Paging(page): Paging,
) -> Result<Json<Page<Member>>, ApiError> {
    let tenant_id = auth.tenant()?;
    let search = query
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());

    let (members, total) = MemberRepository::new(state.pool.clone())
        .list(tenant_id, search, query.status, &page)
        .await?;

    Ok(Json(Page::new(members, page, total)))
}

/// Get a member.
///
/// GET /api/members/:member_id
pub async fn get_member(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(member_id): Path<Uuid>,
) -> Result<Json<Member>, ApiError> {
    let repo = MemberRepository::new(state.pool.clone());
    Ok(Json(load(&repo, auth.tenant()?, member_id).await?))
}

/// The member profile linked to the signed-in user.
///
/// GET /api/members/me
pub async fn get_my_member(
    State(state): State<AppState>,
    auth: UserAuth,
) -> Result<Json<Member>, ApiError> {
    let member = MemberRepository::new(state.pool.clone())
        .find_by_user_id(auth.tenant()?, auth.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("No member profile is linked to this user".to_string()))?;
    Ok(Json(member))
}

/// Update a member (partial update).
///
/// PUT /api/members/:member_id
pub async fn update_member(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(member_id): Path<Uuid>,
    Json(request): Json<UpdateMemberRequest>,
) -> Result<Json<Member>, ApiError> {
    request.validate()?;
    let tenant_id = auth.tenant()?;
    let repo = MemberRepository::new(state.pool.clone());
    let mut member = load(&repo, tenant_id, member_id).await?;

    if let Some(email) = request.email.as_deref() {
        if !email.eq_ignore_ascii_case(&member.email) {
            if let Some(other) = repo.find_by_email(tenant_id, email).await? {
                if other.id != member.id {
                    return Err(ApiError::Conflict(
                        "A member with this email already exists".to_string(),
                    ));
                }
            }
            member.email = email.to_lowercase();
        }
    }
    if let Some(first_name) = request.first_name {
        member.first_name = first_name;
    }
    if let Some(last_name) = request.last_name {
        member.last_name = last_name;
    }
    if request.phone.is_some() {
        member.phone = request.phone;
    }
    if request.date_of_birth.is_some() {
        member.date_of_birth = request.date_of_birth;
    }
    if let Some(gender) = request.gender {
        member.gender = gender;
    }
    if request.notes.is_some() {
        member.notes = request.notes;
    }

    let member = repo.update(&member).await?;
    state.audit(auth.audit(AuditAction::MemberUpdate).on(member.id));

    Ok(Json(member))
}

/// Delete a member.
///
/// DELETE /api/members/:member_id
pub async fn delete_member(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(member_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let tenant_id = auth.tenant()?;
    let deleted = MemberRepository::new(state.pool.clone())
        .delete(tenant_id, member_id)
        .await?;
    if !deleted {
        return Err(ApiError::NotFound("Member not found".to_string()));
    }

    state.audit(auth.audit(AuditAction::MemberDelete).on(member_id));
    info!(tenant_id = %tenant_id, member_id = %member_id, "Member deleted");

    Ok(StatusCode::NO_CONTENT)
}

/// Apply a status action to one member.
///
/// POST /api/members/:member_id/:action
pub async fn change_member_status(
    State(state): State<AppState>,
    auth: UserAuth,
    Path((member_id, action)): Path<(Uuid, MemberAction)>,
) -> Result<Json<Member>, ApiError> {
    let tenant_id = auth.tenant()?;
    let repo = MemberRepository::new(state.pool.clone());
    let member = apply_action(&state, &auth, &repo, tenant_id, member_id, action).await?;
    Ok(Json(member))
}

/// Apply one status action to many members.
///
/// POST /api/members/bulk-status
pub async fn bulk_change_status(
    State(state): State<AppState>,
    auth: UserAuth,
    Json(request): Json<BulkMemberActionRequest>,
) -> Result<Json<BulkResponse<Member>>, ApiError> {
    request.validate()?;
    let tenant_id = auth.tenant()?;
    let repo = MemberRepository::new(state.pool.clone());

    let mut results = Vec::with_capacity(request.member_ids.len());
    for id in &request.member_ids {
        let outcome = apply_action(&state, &auth, &repo, tenant_id, *id, request.action).await;
        results.push(match outcome {
            Ok(member) => BulkItemResult::ok(*id, member),
            Err(e) => BulkItemResult::failed(*id, e.client_message()),
        });
    }

    Ok(Json(results.into()))
}

/// Member counts by status.
///
/// GET /api/members/counts
pub async fn member_counts(
    State(state): State<AppState>,
    auth: UserAuth,
) -> Result<Json<MemberCounts>, ApiError> {
    let rows = MemberRepository::new(state.pool.clone())
        .count_by_status(auth.tenant()?)
        .await?;

    let mut counts = MemberCounts::default();
    for (status, count) in rows {
        counts.total += count;
        match status {
            MemberStatus::Pending => counts.pending = count,
            MemberStatus::Active => counts.active = count,
            MemberStatus::Suspended => counts.suspended = count,
            MemberStatus::Frozen => counts.frozen = count,
            MemberStatus::Cancelled => counts.cancelled = count,
        }
    }

    Ok(Json(counts))
}
