//! Member invoices with VAT totals and payment tracking.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::error::{ensure_argument, ensure_state, DomainError};

db_enum! {
    pub enum InvoiceStatus {
        Draft => "DRAFT",
        Issued => "ISSUED",
        Paid => "PAID",
        PartiallyPaid => "PARTIALLY_PAID",
        Overdue => "OVERDUE",
        Cancelled => "CANCELLED",
    }
}

impl InvoiceStatus {
    /// Statuses that still expect money from the member.
    pub fn is_unpaid(&self) -> bool {
        matches!(
            self,
            InvoiceStatus::Draft
                | InvoiceStatus::Issued
                | InvoiceStatus::Overdue
                | InvoiceStatus::PartiallyPaid
        )
    }
}

/// Standard VAT rate in basis points (15%).
pub const DEFAULT_VAT_RATE_BPS: i32 = 1500;
pub const DEFAULT_PAYMENT_TERMS_DAYS: i64 = 14;

/// Largest single amount accepted from requests, in minor units.
pub const MAX_AMOUNT: i64 = 100_000_000_000;

pub(crate) fn amount_too_large() -> DomainError {
    DomainError::argument("Amount too large")
}

/// Formats the per-tenant invoice number, e.g. `INV-2024-00042`.
pub fn format_invoice_number(year: i32, sequence: i64) -> String {
    format!("INV-{}-{:05}", year, sequence)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceLineItem {
    #[validate(length(min = 1, max = 255, message = "Description must be 1-255 characters"))]
    pub description: String,

    #[validate(range(min = 1, max = 1000, message = "Quantity must be 1-1000"))]
    pub quantity: i32,

    #[validate(range(min = 0, max = 100000000000i64, message = "Unit price must be 0-100000000000"))]
    pub unit_price: i64,
}

impl InvoiceLineItem {
    pub fn line_total(&self) -> Result<i64, DomainError> {
        self.unit_price
            .checked_mul(self.quantity as i64)
            .ok_or_else(amount_too_large)
    }
}

/// Subtotal, VAT and grand total in minor units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvoiceTotals {
    pub subtotal: i64,
    pub tax_amount: i64,
    pub total: i64,
}

impl InvoiceTotals {
    /// VAT is rounded half up to the nearest minor unit.
    pub fn compute(items: &[InvoiceLineItem], vat_rate_bps: i32) -> Result<Self, DomainError> {
        ensure_argument(!items.is_empty(), "Invoice must have at least one line item")?;
        ensure_argument(
            (0..=10_000).contains(&vat_rate_bps),
            "VAT rate must be between 0 and 10000 basis points",
        )?;
        let subtotal = items.iter().try_fold(0i64, |sum, item| {
            sum.checked_add(item.line_total()?).ok_or_else(amount_too_large)
        })?;
        let tax_amount = subtotal
            .checked_mul(vat_rate_bps as i64)
            .and_then(|v| v.checked_add(5_000))
            .ok_or_else(amount_too_large)?
            / 10_000;
        let total = subtotal.checked_add(tax_amount).ok_or_else(amount_too_large)?;
        Ok(Self {
            subtotal,
            tax_amount,
            total,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub invoice_number: String,
    pub member_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription_id: Option<Uuid>,
    pub status: InvoiceStatus,
    pub line_items: Vec<InvoiceLineItem>,
    pub subtotal: i64,
    pub vat_rate_bps: i32,
    pub tax_amount: i64,
    pub total: i64,
    pub paid_amount: i64,
    pub currency: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issue_date: Option<NaiveDate>,
    pub due_date: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paid_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_reference: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Invoice {
    pub fn balance_due(&self) -> i64 {
        (self.total - self.paid_amount).max(0)
    }

    pub fn issue(&mut self, today: NaiveDate) -> Result<(), DomainError> {
        ensure_state(
            self.status == InvoiceStatus::Draft,
            format!("Cannot issue invoice in status {}", self.status),
        )?;
        self.status = InvoiceStatus::Issued;
        self.issue_date = Some(today);
        Ok(())
    }

    /// Applies a payment; returns true when the invoice became fully paid.
    pub fn record_payment(
        &mut self,
        amount: i64,
        method: Option<String>,
        reference: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<bool, DomainError> {
        ensure_state(
            matches!(
                self.status,
                InvoiceStatus::Issued | InvoiceStatus::Overdue | InvoiceStatus::PartiallyPaid
            ),
            format!("Cannot record payment on invoice in status {}", self.status),
        )?;
        ensure_argument(amount > 0, "Payment amount must be positive")?;
        ensure_argument(
            amount <= self.balance_due(),
            "Payment exceeds the balance due",
        )?;

        self.paid_amount += amount;
        self.payment_method = method;
        self.payment_reference = reference;
        if self.paid_amount >= self.total {
            self.status = InvoiceStatus::Paid;
            self.paid_at = Some(now);
            Ok(true)
        } else {
            self.status = InvoiceStatus::PartiallyPaid;
            Ok(false)
        }
    }

    pub fn cancel(&mut self) -> Result<(), DomainError> {
        ensure_state(
            !matches!(self.status, InvoiceStatus::Paid | InvoiceStatus::Cancelled),
            format!("Cannot cancel invoice in status {}", self.status),
        )?;
        self.status = InvoiceStatus::Cancelled;
        Ok(())
    }

    /// Moves an issued invoice past its due date to OVERDUE.
    pub fn mark_overdue(&mut self, today: NaiveDate) -> bool {
        if self.status == InvoiceStatus::Issued && self.due_date < today {
            self.status = InvoiceStatus::Overdue;
            true
        } else {
            false
        }
    }

    pub fn ensure_deletable(&self) -> Result<(), DomainError> {
        ensure_state(
            matches!(self.status, InvoiceStatus::Draft | InvoiceStatus::Cancelled),
            format!(
                "Only DRAFT or CANCELLED invoices can be deleted. Current status: {}",
                self.status
            ),
        )
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateInvoiceRequest {
    pub member_id: Uuid,
    pub subscription_id: Option<Uuid>,

    #[validate(
        length(min = 1, max = 50, message = "Between 1 and 50 line items are required"),
        nested
    )]
    pub line_items: Vec<InvoiceLineItem>,

    #[validate(range(min = 0, max = 10000, message = "VAT rate must be 0-10000 basis points"))]
    pub vat_rate_bps: Option<i32>,

    #[validate(length(equal = 3, message = "Currency must be a 3-letter code"))]
    pub currency: Option<String>,

    pub due_date: Option<NaiveDate>,

    #[validate(length(max = 1000, message = "Notes must be at most 1000 characters"))]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateSubscriptionInvoiceRequest {
    pub subscription_id: Uuid,
    pub due_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RecordPaymentRequest {
    #[validate(range(min = 1, max = 100000000000i64, message = "Amount must be 1-100000000000"))]
    pub amount: i64,

    #[validate(length(max = 50, message = "Payment method must be at most 50 characters"))]
    pub payment_method: Option<String>,

    #[validate(length(max = 100, message = "Reference must be at most 100 characters"))]
    pub reference: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceQuery {
    pub status: Option<InvoiceStatus>,
    pub member_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceCounts {
    pub draft: i64,
    pub issued: i64,
    pub paid: i64,
    pub partially_paid: i64,
    pub overdue: i64,
    pub cancelled: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(qty: i32, price: i64) -> InvoiceLineItem {
        InvoiceLineItem {
            description: "Monthly membership".into(),
            quantity: qty,
            unit_price: price,
        }
    }

    fn invoice(status: InvoiceStatus, total: i64) -> Invoice {
        Invoice {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            invoice_number: format_invoice_number(2024, 1),
            member_id: Uuid::new_v4(),
            subscription_id: None,
            status,
            line_items: vec![item(1, total)],
            subtotal: total,
            vat_rate_bps: 0,
            tax_amount: 0,
            total,
            paid_amount: 0,
            currency: "SAR".into(),
            issue_date: None,
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
    fn test_number_format() {
        assert_eq!(format_invoice_number(2024, 42), "INV-2024-00042");
        assert_eq!(format_invoice_number(2025, 123456), "INV-2025-123456");
    }

    #[test]
    fn test_totals_with_vat() {
        let totals = InvoiceTotals::compute(&[item(2, 10000), item(1, 5000)], DEFAULT_VAT_RATE_BPS)
            .unwrap();
        assert_eq!(totals.subtotal, 25000);
        assert_eq!(totals.tax_amount, 3750);
        assert_eq!(totals.total, 28750);
    }

    #[test]
    fn test_vat_rounds_half_up() {
        let totals = InvoiceTotals::compute(&[item(1, 3)], DEFAULT_VAT_RATE_BPS).unwrap();
        // 3 * 0.15 = 0.45 -> 0
        assert_eq!(totals.tax_amount, 0);
        let totals = InvoiceTotals::compute(&[item(1, 10)], DEFAULT_VAT_RATE_BPS).unwrap();
        // 1.5 -> 2
        assert_eq!(totals.tax_amount, 2);
    }

    #[test]
    fn test_totals_reject_overflowing_amounts() {
        let huge = item(1000, 9_300_000_000_000_000);
        assert_eq!(
            InvoiceTotals::compute(&[huge], DEFAULT_VAT_RATE_BPS),
            Err(DomainError::argument("Amount too large"))
        );

        let half = item(1, i64::MAX / 2 + 1);
        assert!(InvoiceTotals::compute(&[half.clone(), half], 0).is_err());

        // The sum fits but VAT on it does not
        assert!(InvoiceTotals::compute(&[item(1, i64::MAX / 1000)], DEFAULT_VAT_RATE_BPS).is_err());
    }

    #[test]
    fn test_unit_price_is_bounded() {
        let request: CreateInvoiceRequest = serde_json::from_value(serde_json::json!({
            "memberId": Uuid::new_v4(),
            "lineItems": [{ "description": "Gear", "quantity": 1000, "unitPrice": 9300000000000000i64 }],
        }))
        .unwrap();
        assert!(request.validate().is_err());

        let ok = InvoiceLineItem {
            description: "Gear".into(),
            quantity: 1000,
            unit_price: MAX_AMOUNT,
        };
        assert!(ok.validate().is_ok());
        assert_eq!(ok.line_total(), Ok(MAX_AMOUNT * 1000));
    }

    #[test]
    fn test_totals_require_items() {
        assert!(InvoiceTotals::compute(&[], DEFAULT_VAT_RATE_BPS).is_err());
    }

    #[test]
    fn test_issue_and_pay_in_parts() {
        let mut inv = invoice(InvoiceStatus::Draft, 10000);
        assert!(inv.record_payment(100, None, None, Utc::now()).is_err());

        inv.issue(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()).unwrap();
        assert!(!inv.record_payment(4000, None, None, Utc::now()).unwrap());
        assert_eq!(inv.status, InvoiceStatus::PartiallyPaid);
        assert_eq!(inv.balance_due(), 6000);

        assert!(inv.record_payment(7000, None, None, Utc::now()).is_err());
        assert!(inv
            .record_payment(6000, Some("CARD".into()), None, Utc::now())
            .unwrap());
        assert_eq!(inv.status, InvoiceStatus::Paid);
        assert!(inv.paid_at.is_some());
    }

    #[test]
    fn test_cancel_rules() {
        assert!(invoice(InvoiceStatus::Paid, 100).cancel().is_err());
        let mut inv = invoice(InvoiceStatus::Overdue, 100);
        inv.cancel().unwrap();
        assert!(inv.cancel().is_err());
        assert!(inv.ensure_deletable().is_ok());
        assert!(invoice(InvoiceStatus::Issued, 100).ensure_deletable().is_err());
    }

    #[test]
    fn test_mark_overdue() {
        let mut inv = invoice(InvoiceStatus::Issued, 100);
        assert!(!inv.mark_overdue(NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()));
        assert!(inv.mark_overdue(NaiveDate::from_ymd_opt(2024, 3, 16).unwrap()));
        assert_eq!(inv.status, InvoiceStatus::Overdue);

        let mut draft = invoice(InvoiceStatus::Draft, 100);
        assert!(!draft.mark_overdue(NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()));
    }

    #[test]
    fn test_unpaid_statuses() {
        assert!(InvoiceStatus::PartiallyPaid.is_unpaid());
        assert!(!InvoiceStatus::Paid.is_unpaid());
        assert!(!InvoiceStatus::Cancelled.is_unpaid());
    }
}
