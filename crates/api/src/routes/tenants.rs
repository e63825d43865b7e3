//! Platform tenant management handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use domain::models::tenant::{CreateTenantRequest, UpdateTenantRequest};
use domain::models::{AuditAction, Role, Tenant, TenantStatus};
use persistence::repositories::{TenantRepository, UserRepository};
use serde::Deserialize;
use shared::pagination::Page;
use shared::password::hash_password;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::{Paging, UserAuth};

const DEFAULT_TIMEZONE: &str = "Asia/Riyadh";

#[derive(Debug, Deserialize)]
pub struct ListTenantsQuery {
    pub status: Option<TenantStatus>,
}

async fn load(repo: &TenantRepository, id: Uuid) -> Result<Tenant, ApiError> {
    repo.find_by_id(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Tenant not found".to_string()))
}

/// Create a tenant, optionally with its first club administrator.
///
/// POST /api/platform/tenants
pub async fn create_tenant(
    State(state): State<AppState>,
    auth: UserAuth,
    Json(request): Json<CreateTenantRequest>,
) -> Result<(StatusCode, Json<Tenant>), ApiError> {
    request.validate()?;
    let slug = request.slug.to_lowercase();

    let repo = TenantRepository::new(state.pool.clone());
    if repo.find_by_slug(&slug).await?.is_some() {
        return Err(ApiError::Conflict(format!("Slug '{}' is already taken", slug)));
    }

    let admin_hash = match &request.admin {
        Some(admin) => Some(hash_password(&admin.password)?),
        None => None,
    };

    let mut tx = state.pool.begin().await?;
    let tenant = TenantRepository::insert(
        &mut *tx,
        request.name.trim(),
        &slug,
        request.contact_email.as_deref(),
        request.timezone.as_deref().unwrap_or(DEFAULT_TIMEZONE),
    )
    .await?;
    if let (Some(admin), Some(hash)) = (&request.admin, &admin_hash) {
        let user = UserRepository::insert(
            &mut *tx,
            Some(tenant.id),
            &admin.email,
            hash,
            &admin.display_name,
            Role::ClubAdmin,
        )
        .await?;
        info!(tenant_id = %tenant.id, user_id = %user.id, "Club administrator created");
    }
    tx.commit().await?;

    state.audit(
        auth.audit(AuditAction::TenantCreate)
            .on(tenant.id)
            .with_resource_name(tenant.slug.clone()),
    );
    info!(tenant_id = %tenant.id, slug = %tenant.slug, "Tenant created");

    Ok((StatusCode::CREATED, Json(tenant)))
}

/// List tenants.
///
/// GET /api/platform/tenants?status=&page=&size=
pub async fn list_tenants(
    State(state): State<AppState>,
    Query(query): Query<ListTenantsQuery>,
    Paging(page): Paging,
) -> Result<Json<Page<Tenant>>, ApiError> {
    let (tenants, total) = TenantRepository::new(state.pool.clone())
        .list(query.status, &page)
        .await?;
    Ok(Json(Page::new(tenants, page, total)))
}

/// Get a tenant.
///
/// GET /api/platform/tenants/:tenant_id
pub async fn get_tenant(
    State(state): State<AppState>,
    Path(tenant_id): Path<Uuid>,
) -> Result<Json<Tenant>, ApiError> {
    let repo = TenantRepository::new(state.pool.clone());
    Ok(Json(load(&repo, tenant_id).await?))
}

/// Update a tenant's name, contact email or timezone.
///
/// PUT /api/platform/tenants/:tenant_id
pub async fn update_tenant(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(tenant_id): Path<Uuid>,
    Json(request): Json<UpdateTenantRequest>,
) -> Result<Json<Tenant>, ApiError> {
    request.validate()?;
    let repo = TenantRepository::new(state.pool.clone());
    let mut tenant = load(&repo, tenant_id).await?;

    if let Some(name) = request.name {
        tenant.name = name.trim().to_string();
    }
    if request.contact_email.is_some() {
        tenant.contact_email = request.contact_email;
    }
    if let Some(timezone) = request.timezone {
        tenant.timezone = timezone;
    }

    let tenant = repo.update(&tenant).await?;
    state.audit(auth.audit(AuditAction::TenantUpdate).on(tenant.id));

    Ok(Json(tenant))
}

/// Suspend a tenant. Its users are refused until it is reactivated.
///
/// POST /api/platform/tenants/:tenant_id/suspend
pub async fn suspend_tenant(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(tenant_id): Path<Uuid>,
) -> Result<Json<Tenant>, ApiError> {
    let repo = TenantRepository::new(state.pool.clone());
    let mut tenant = load(&repo, tenant_id).await?;
    let from = tenant.status;
    tenant.suspend()?;
    let tenant = repo.update(&tenant).await?;

    state.audit(
        auth.audit(AuditAction::TenantSuspend)
            .on(tenant.id)
            .with_status_change(from, tenant.status),
    );
    info!(tenant_id = %tenant.id, "Tenant suspended");

    Ok(Json(tenant))
}

/// Reactivate a suspended tenant.
///
/// POST /api/platform/tenants/:tenant_id/reactivate
pub async fn reactivate_tenant(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(tenant_id): Path<Uuid>,
) -> Result<Json<Tenant>, ApiError> {
    let repo = TenantRepository::new(state.pool.clone());
    let mut tenant = load(&repo, tenant_id).await?;
    let from = tenant.status;
    tenant.reactivate()?;
    let tenant = repo.update(&tenant).await?;

    state.audit(
        auth.audit(AuditAction::TenantReactivate)
            .on(tenant.id)
            .with_status_change(from, tenant.status),
    );
    info!(tenant_id = %tenant.id, "Tenant reactivated");

    Ok(Json(tenant))
}
