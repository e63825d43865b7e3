//! Yearly document number sequences.

use domain::models::invoice::format_invoice_number;
use sqlx::PgExecutor;
use uuid::Uuid;

use crate::metrics::QueryTimer;

/// A numbered document series. Invoice and membership contract numbers restart
/// every year per tenant; tenant contract numbers are platform-wide.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumberSeries {
    Invoice(Uuid),
    MembershipContract(Uuid),
    TenantContract,
}

impl NumberSeries {
    fn prefix(&self) -> &'static str {
        match self {
            NumberSeries::Invoice(_) => "INV",
            NumberSeries::MembershipContract(_) => "CON",
            NumberSeries::TenantContract => "TC",
        }
    }

    fn scope(&self) -> String {
        match self {
            NumberSeries::Invoice(tenant_id) => format!("INV:{tenant_id}"),
            NumberSeries::MembershipContract(tenant_id) => format!("CON:{tenant_id}"),
            NumberSeries::TenantContract => "TC".to_string(),
        }
    }

    pub fn format(&self, year: i32, sequence: i64) -> String {
        match self {
            NumberSeries::Invoice(_) => format_invoice_number(year, sequence),
            _ => format!("{}-{}-{:05}", self.prefix(), year, sequence),
        }
    }
}

/// Allocates the next value of the series for `year`.
///
/// The upsert takes a row lock on the counter, so concurrent callers are
/// serialized and never receive the same value. Run it inside the transaction
/// that inserts the numbered document to avoid gaps on rollback.
pub async fn next_number<'e, E: PgExecutor<'e>>(
    executor: E,
    series: NumberSeries,
    year: i32,
) -> Result<String, sqlx::Error> {
    let timer = QueryTimer::new("next_document_number");
    let value: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO number_sequences (scope, year, last_value)
        VALUES ($1, $2, 1)
        ON CONFLICT (scope, year) DO UPDATE SET last_value = number_sequences.last_value + 1
        RETURNING last_value
        "#,
    )
    .bind(series.scope())
    .bind(year)
    .fetch_one(executor)
    .await?;
    timer.record();
    Ok(series.format(year, value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_series_format() {
        let tenant = Uuid::nil();
        assert_eq!(NumberSeries::Invoice(tenant).format(2024, 42), "INV-2024-00042");
        assert_eq!(
            NumberSeries::MembershipContract(tenant).format(2025, 7),
            "CON-2025-00007"
        );
        assert_eq!(NumberSeries::TenantContract.format(2024, 123456), "TC-2024-123456");
    }

    #[test]
    fn test_scopes_are_per_tenant() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert_ne!(NumberSeries::Invoice(a).scope(), NumberSeries::Invoice(b).scope());
        assert_ne!(
            NumberSeries::Invoice(a).scope(),
            NumberSeries::MembershipContract(a).scope()
        );
        assert_eq!(NumberSeries::TenantContract.scope(), "TC");
    }
}
