//! Invoice handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use domain::models::invoice::{
    CreateInvoiceRequest, CreateSubscriptionInvoiceRequest, InvoiceCounts, InvoiceQuery,
    RecordPaymentRequest,
};
use domain::models::{AuditAction, Invoice};
use persistence::repositories::InvoiceRepository;
use shared::pagination::Page;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::{Paging, UserAuth};
use crate::middleware::record_business_event;
use crate::services::BillingService;

async fn load(repo: &InvoiceRepository, tenant_id: Uuid, id: Uuid) -> Result<Invoice, ApiError> {
    repo.find_by_id(tenant_id, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Invoice not found".to_string()))
}

fn billing(state: &AppState) -> BillingService {
    BillingService::new(state.pool.clone(), state.config.billing.clone())
}

/// Create a DRAFT invoice from explicit line items.
///
/// POST /api/invoices
pub async fn create_invoice(
    State(state): State<AppState>,
    auth: UserAuth,
    Json(request): Json<CreateInvoiceRequest>,
) -> Result<(StatusCode, Json<Invoice>), ApiError> {
    request.validate()?;
    let invoice = billing(&state)
        .create_invoice(auth.tenant()?, &request, Utc::now().date_naive())
        .await?;

    state.audit(
        auth.audit(AuditAction::InvoiceCreate)
            .on(invoice.id)
            .with_resource_name(invoice.invoice_number.clone()),
    );
    Ok((StatusCode::CREATED, Json(invoice)))
}

/// POST /api/invoices/from-subscription
pub async fn create_subscription_invoice(
    State(state): State<AppState>,
    auth: UserAuth,
    Json(request): Json<CreateSubscriptionInvoiceRequest>,
) -> Result<(StatusCode, Json<Invoice>), ApiError> {
    request.validate()?;
    let invoice = billing(&state)
        .invoice_subscription(auth.tenant()?, &request, Utc::now().date_naive())
        .await?;

    state.audit(
        auth.audit(AuditAction::InvoiceCreate)
            .on(invoice.id)
            .with_resource_name(invoice.invoice_number.clone()),
    );
    Ok((StatusCode::CREATED, Json(invoice)))
}

/// GET /api/invoices?status=&memberId=&page=&size=
pub async fn list_invoices(
    State(state): State<AppState>,
    auth: UserAuth,
    Query(query): Query<InvoiceQuery>,
    Paging(page): Paging,
) -> Result<Json<Page<Invoice>>, ApiError> {
    let (invoices, total) = InvoiceRepository::new(state.pool.clone())
        .list(auth.tenant()?, &query, &page)
        .await?;
    Ok(Json(Page::new(invoices, page, total)))
}

/// GET /api/invoices/counts
pub async fn invoice_counts(
    State(state): State<AppState>,
    auth: UserAuth,
) -> Result<Json<InvoiceCounts>, ApiError> {
    let counts = InvoiceRepository::new(state.pool.clone())
        .count_by_status(auth.tenant()?)
        .await?;
    Ok(Json(counts))
}

/// GET /api/invoices/:invoice_id
pub async fn get_invoice(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(invoice_id): Path<Uuid>,
) -> Result<Json<Invoice>, ApiError> {
    let repo = InvoiceRepository::new(state.pool.clone());
    Ok(Json(load(&repo, auth.tenant()?, invoice_id).await?))
}

/// POST /api/invoices/:invoice_id/issue
pub async fn issue_invoice(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(invoice_id): Path<Uuid>,
) -> Result<Json<Invoice>, ApiError> {
    let tenant_id = auth.tenant()?;
    let repo = InvoiceRepository::new(state.pool.clone());
    let mut invoice = load(&repo, tenant_id, invoice_id).await?;
    let from = invoice.status;
    invoice.issue(Utc::now().date_naive())?;
    let invoice = repo.update(&invoice).await?;

    state.audit(
        auth.audit(AuditAction::InvoiceIssue)
            .on(invoice.id)
            .with_resource_name(invoice.invoice_number.clone())
            .with_status_change(from, invoice.status),
    );
    info!(tenant_id = %tenant_id, invoice_id = %invoice.id, "Invoice issued");

    Ok(Json(invoice))
}

/// Apply a full or partial payment.
///
/// POST /api/invoices/:invoice_id/payments
pub async fn record_payment(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(invoice_id): Path<Uuid>,
    Json(request): Json<RecordPaymentRequest>,
) -> Result<Json<Invoice>, ApiError> {
    request.validate()?;
    let tenant_id = auth.tenant()?;
    let repo = InvoiceRepository::new(state.pool.clone());
    let mut invoice = load(&repo, tenant_id, invoice_id).await?;
    let from = invoice.status;
    let now = Utc::now();
    let fully_paid = invoice.record_payment(
        request.amount,
        request.payment_method,
        request.reference,
        now,
    )?;
    let invoice = repo.update(&invoice).await?;

    state.audit(
        auth.audit(AuditAction::InvoicePayment)
            .on(invoice.id)
            .with_resource_name(invoice.invoice_number.clone())
            .with_status_change(from, invoice.status)
            .with_change(
                "paidAmount",
                Some((invoice.paid_amount - request.amount).to_string()),
                Some(invoice.paid_amount.to_string()),
            ),
    );
    if fully_paid {
        record_business_event("invoice_paid");
        billing(&state).recover_for_invoice(&invoice, now).await?;
    }
    info!(
        tenant_id = %tenant_id,
        invoice_id = %invoice.id,
        amount = request.amount,
        fully_paid,
        "Invoice payment recorded"
    );

    Ok(Json(invoice))
}

/// POST /api/invoices/:invoice_id/cancel
pub async fn cancel_invoice(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(invoice_id): Path<Uuid>,
) -> Result<Json<Invoice>, ApiError> {
    let tenant_id = auth.tenant()?;
    let repo = InvoiceRepository::new(state.pool.clone());
    let mut invoice = load(&repo, tenant_id, invoice_id).await?;
    let from = invoice.status;
    invoice.cancel()?;
    let invoice = repo.update(&invoice).await?;

    state.audit(
        auth.audit(AuditAction::InvoiceCancel)
            .on(invoice.id)
            .with_status_change(from, invoice.status),
    );
    Ok(Json(invoice))
}

/// Delete a DRAFT or CANCELLED invoice.
///
/// DELETE /api/invoices/:invoice_id
pub async fn delete_invoice(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(invoice_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let tenant_id = auth.tenant()?;
    let repo = InvoiceRepository::new(state.pool.clone());
    let invoice = load(&repo, tenant_id, invoice_id).await?;
    invoice.ensure_deletable()?;
    repo.delete(tenant_id, invoice_id).await?;

    state.audit(
        auth.audit(AuditAction::InvoiceDelete)
            .on(invoice_id)
            .with_resource_name(invoice.invoice_number),
    );
    info!(tenant_id = %tenant_id, invoice_id = %invoice_id, "Invoice deleted");

    Ok(StatusCode::NO_CONTENT)
}
