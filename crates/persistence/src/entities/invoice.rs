//! Invoice entity (database row mapping).

use chrono::{DateTime, NaiveDate, Utc};
use domain::models::{Invoice, InvoiceLineItem, InvoiceStatus};
use sqlx::FromRow;
use std::str::FromStr;
use uuid::Uuid;

/// Database row mapping for the invoices table.
#[derive(Debug, Clone, FromRow)]
pub struct InvoiceEntity {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub invoice_number: String,
    pub member_id: Uuid,
    pub subscription_id: Option<Uuid>,
    pub status: String,
    pub line_items: serde_json::Value,
    pub subtotal: i64,
    pub vat_rate_bps: i32,
    pub tax_amount: i64,
    pub total: i64,
    pub paid_amount: i64,
    pub currency: String,
    pub issue_date: Option<NaiveDate>,
    pub due_date: NaiveDate,
    pub paid_at: Option<DateTime<Utc>>,
    pub payment_method: Option<String>,
    pub payment_reference: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<InvoiceEntity> for Invoice {
    fn from(entity: InvoiceEntity) -> Self {
        let line_items: Vec<InvoiceLineItem> =
            serde_json::from_value(entity.line_items).unwrap_or_default();
        Self {
            id: entity.id,
            tenant_id: entity.tenant_id,
            invoice_number: entity.invoice_number,
            member_id: entity.member_id,
            subscription_id: entity.subscription_id,
            status: InvoiceStatus::from_str(&entity.status).unwrap_or(InvoiceStatus::Draft),
            line_items,
            subtotal: entity.subtotal,
            vat_rate_bps: entity.vat_rate_bps,
            tax_amount: entity.tax_amount,
            total: entity.total,
            paid_amount: entity.paid_amount,
            currency: entity.currency.trim().to_string(),
            issue_date: entity.issue_date,
            due_date: entity.due_date,
            paid_at: entity.paid_at,
            payment_method: entity.payment_method,
            payment_reference: entity.payment_reference,
            notes: entity.notes,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_line_items_decoded_from_jsonb() {
        let now = Utc::now();
        let entity = InvoiceEntity {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            invoice_number: "INV-2024-00001".into(),
            member_id: Uuid::new_v4(),
            subscription_id: None,
            status: "ISSUED".into(),
            line_items: json!([{"description": "Monthly", "quantity": 1, "unitPrice": 10000}]),
            subtotal: 10000,
            vat_rate_bps: 1500,
            tax_amount: 1500,
            total: 11500,
            paid_amount: 0,
            currency: "SAR".into(),
            issue_date: None,
            due_date: now.date_naive(),
            paid_at: None,
            payment_method: None,
            payment_reference: None,
            notes: None,
            created_at: now,
            updated_at: now,
        };

        let invoice: Invoice = entity.into();
        assert_eq!(invoice.status, InvoiceStatus::Issued);
        assert_eq!(invoice.line_items.len(), 1);
        assert_eq!(invoice.line_items[0].unit_price, 10000);
    }
}
