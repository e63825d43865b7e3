//! E-invoice submissions (ZATCA).
//!
//! The payload is built from the stored invoice and hashed with SHA-256; the
//! actual transmission happens outside this service, which records the
//! authority's response.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use domain::models::zatca::{CreateZatcaSubmissionRequest, ZatcaQuery, ZatcaResponseRequest};
use domain::models::{AuditAction, Invoice, InvoiceStatus, ZatcaStatus, ZatcaSubmission};
use persistence::repositories::{InvoiceRepository, ZatcaRepository};
use serde_json::{json, Value};
use shared::crypto::sha256_hex;
use shared::pagination::Page;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::{Paging, UserAuth};

/// Submission payload and its hash.
fn payload_for(invoice: &Invoice) -> (Value, String) {
    let line_items: Vec<Value> = invoice
        .line_items
        .iter()
        .map(|item| {
            json!({
                "description": item.description,
                "quantity": item.quantity,
                "unitPrice": item.unit_price,
                "lineTotal": item.line_total().ok(),
            })
        })
        .collect();
    let payload = json!({
        "invoiceNumber": invoice.invoice_number,
        "issueDate": invoice.issue_date,
        "dueDate": invoice.due_date,
        "currency": invoice.currency,
        "lineItems": line_items,
        "subtotal": invoice.subtotal,
        "vatRateBps": invoice.vat_rate_bps,
        "taxAmount": invoice.tax_amount,
        "total": invoice.total,
    });
    let hash = sha256_hex(&payload.to_string());
    (payload, hash)
}

async fn load_invoice(state: &AppState, tenant_id: Uuid, invoice_id: Uuid) -> Result<Invoice, ApiError> {
    InvoiceRepository::new(state.pool.clone())
        .find_by_id(tenant_id, invoice_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Invoice not found".to_string()))
}

async fn load(state: &AppState, tenant_id: Uuid, id: Uuid) -> Result<ZatcaSubmission, ApiError> {
    ZatcaRepository::new(state.pool.clone())
        .find_by_id(tenant_id, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("E-invoice submission not found".to_string()))
}

/// Prepare an issued invoice for submission.
///
/// POST /api/zatca/submissions
pub async fn create_submission(
    State(state): State<AppState>,
    auth: UserAuth,
    Json(request): Json<CreateZatcaSubmissionRequest>,
) -> Result<(StatusCode, Json<ZatcaSubmission>), ApiError> {
    let tenant_id = auth.tenant()?;
    let invoice = load_invoice(&state, tenant_id, request.invoice_id).await?;
    if matches!(invoice.status, InvoiceStatus::Draft | InvoiceStatus::Cancelled) {
        return Err(ApiError::Conflict(format!(
            "Cannot submit invoice in status {}",
            invoice.status
        )));
    }

    let (payload, hash) = payload_for(&invoice);
    let submission = ZatcaRepository::new(state.pool.clone())
        .create(tenant_id, invoice.id, &invoice.invoice_number, &hash, &payload)
        .await
        .map_err(|e| match ApiError::from(e) {
            ApiError::Conflict(_) => {
                ApiError::Conflict("Invoice already has an e-invoice submission".to_string())
            }
            other => other,
        })?;

    state.audit(
        auth.audit(AuditAction::ZatcaSubmit)
            .on(submission.id)
            .with_resource_name(submission.invoice_number.clone()),
    );
    info!(tenant_id = %tenant_id, invoice_number = %submission.invoice_number, hash = %submission.invoice_hash, "E-invoice prepared");
    Ok((StatusCode::CREATED, Json(submission)))
}

/// GET /api/zatca/submissions?status=&invoiceId=&page=&size=
pub async fn list_submissions(
    State(state): State<AppState>,
    auth: UserAuth,
    Query(query): Query<ZatcaQuery>,
    Paging(page): Paging,
) -> Result<Json<Page<ZatcaSubmission>>, ApiError> {
    let (items, total) = ZatcaRepository::new(state.pool.clone())
        .list(auth.tenant()?, &query, &page)
        .await?;
    Ok(Json(Page::new(items, page, total)))
}

/// GET /api/zatca/submissions/:submission_id
pub async fn get_submission(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(submission_id): Path<Uuid>,
) -> Result<Json<ZatcaSubmission>, ApiError> {
    Ok(Json(load(&state, auth.tenant()?, submission_id).await?))
}

async fn save(
    state: &AppState,
    auth: &UserAuth,
    submission: &ZatcaSubmission,
    from: ZatcaStatus,
) -> Result<ZatcaSubmission, ApiError> {
    let submission = ZatcaRepository::new(state.pool.clone())
        .update(submission)
        .await?;
    state.audit(
        auth.audit(AuditAction::ZatcaSubmit)
            .on(submission.id)
            .with_status_change(from, submission.status),
    );
    Ok(submission)
}

/// POST /api/zatca/submissions/:submission_id/submitted
pub async fn mark_submitted(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(submission_id): Path<Uuid>,
) -> Result<Json<ZatcaSubmission>, ApiError> {
    let mut submission = load(&state, auth.tenant()?, submission_id).await?;
    let from = submission.status;
    submission.mark_submitted(Utc::now())?;
    Ok(Json(save(&state, &auth, &submission, from).await?))
}

/// Record the authority's clearance decision.
///
/// POST /api/zatca/submissions/:submission_id/response
pub async fn record_response(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(submission_id): Path<Uuid>,
    Json(request): Json<ZatcaResponseRequest>,
) -> Result<Json<ZatcaSubmission>, ApiError> {
    request.validate()?;
    let mut submission = load(&state, auth.tenant()?, submission_id).await?;
    let from = submission.status;
    let now = Utc::now();
    if request.accepted {
        submission.accept(request.clearance_id, now)?;
    } else {
        let reason = request.rejection_reason.ok_or_else(|| {
            ApiError::Validation("A rejection reason is required".to_string())
        })?;
        submission.reject(reason, now)?;
    }
    let submission = save(&state, &auth, &submission, from).await?;
    info!(submission_id = %submission.id, status = %submission.status, "E-invoice response recorded");
    Ok(Json(submission))
}

/// Rebuild the payload from the current invoice and queue it again.
///
/// POST /api/zatca/submissions/:submission_id/resubmit
pub async fn resubmit(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(submission_id): Path<Uuid>,
) -> Result<Json<ZatcaSubmission>, ApiError> {
    let tenant_id = auth.tenant()?;
    let mut submission = load(&state, tenant_id, submission_id).await?;
    let invoice = load_invoice(&state, tenant_id, submission.invoice_id).await?;
    let from = submission.status;
    let (payload, hash) = payload_for(&invoice);
    submission.resubmit(payload, hash)?;
    let submission = save(&state, &auth, &submission, from).await?;
    info!(submission_id = %submission.id, attempts = submission.attempts, "E-invoice resubmitted");
    Ok(Json(submission))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use domain::models::InvoiceLineItem;

    fn invoice() -> Invoice {
        Invoice {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            invoice_number: "INV-2024-00001".into(),
            member_id: Uuid::new_v4(),
            subscription_id: None,
            status: InvoiceStatus::Issued,
            line_items: vec![InvoiceLineItem {
                description: "Monthly membership".into(),
                quantity: 1,
                unit_price: 20000,
            }],
            subtotal: 20000,
            vat_rate_bps: 1500,
            tax_amount: 3000,
            total: 23000,
            paid_amount: 0,
            currency: "SAR".into(),
            issue_date: NaiveDate::from_ymd_opt(2024, 3, 1),
            due_date: NaiveDate::from_ymd_opt(2024, 3, 15).unwrap(),
            paid_at: None,
            payment_method: None,
            payment_reference: None,
            notes: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_payload_hash_is_stable_and_content_bound() {
        let inv = invoice();
        let (payload, hash) = payload_for(&inv);
        assert_eq!(hash.len(), 64);
        assert_eq!(payload["total"], 23000);
        assert_eq!(payload_for(&inv).1, hash);

        let mut changed = inv.clone();
        changed.total = 23001;
        assert_ne!(payload_for(&changed).1, hash);
    }

    #[test]
    fn test_payment_state_is_not_hashed() {
        let inv = invoice();
        let mut paid = inv.clone();
        paid.paid_amount = paid.total;
        paid.status = InvoiceStatus::Paid;
        assert_eq!(payload_for(&paid).1, payload_for(&inv).1);
    }
}
