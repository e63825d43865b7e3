//! Forecast model and forecast repository, plus the per-period history the
//! projections are computed from.

use chrono::NaiveDate;
use domain::models::forecast::{
    CreateForecastModelRequest, ForecastGranularity, ForecastQuery, Period, Projection,
};
use domain::models::{Forecast, ForecastModel, ForecastType};
use serde_json::Value;
use shared::pagination::PageRequest;
use sqlx::PgPool;
use uuid::Uuid;

use crate::entities::{ForecastEntity, ForecastModelEntity, PeriodValueEntity};
use crate::metrics::QueryTimer;

const MAX_LISTED_FORECASTS: i64 = 1000;

/// A projection for one period, ready to be stored.
#[derive(Debug, Clone)]
pub struct NewForecast {
    pub model_id: Uuid,
    pub forecast_type: ForecastType,
    pub granularity: ForecastGranularity,
    pub period: Period,
    pub projection: Projection,
}

fn history_sql(forecast_type: ForecastType) -> String {
    let value = match forecast_type {
        ForecastType::Revenue => {
            r#"SELECT SUM(i.paid_amount) FROM invoices i
               WHERE i.tenant_id = $1 AND i.status <> 'CANCELLED' AND i.paid_at IS NOT NULL
                 AND (i.paid_at AT TIME ZONE 'UTC')::date BETWEEN p.period_start AND p.period_end"#
        }
        ForecastType::MembershipCount => {
            r#"SELECT COUNT(*) FROM subscriptions s
               WHERE s.tenant_id = $1 AND s.status NOT IN ('CANCELLED', 'PENDING_PAYMENT')
                 AND s.start_date <= p.period_end AND s.end_date >= p.period_end"#
        }
        ForecastType::Attendance => {
            r#"SELECT COUNT(*) FROM attendance_records a
               WHERE a.tenant_id = $1
                 AND (a.check_in_time AT TIME ZONE 'UTC')::date BETWEEN p.period_start AND p.period_end"#
        }
    };
    format!(
        r#"
        SELECT p.period_start, COALESCE(({}), 0)::float8 AS value
        FROM UNNEST($2::date[], $3::date[]) AS p(period_start, period_end)
        ORDER BY p.period_start
        "#,
        value
    )
}

#[derive(Clone)]
pub struct ForecastRepository {
    pool: PgPool,
}

impl ForecastRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // Models

    pub async fn create_model(
        &self,
        tenant_id: Uuid,
        request: &CreateForecastModelRequest,
        hyperparameters: &Value,
    ) -> Result<ForecastModel, sqlx::Error> {
        let timer = QueryTimer::new("create_forecast_model");
        let result = sqlx::query_as::<_, ForecastModelEntity>(
            r#"
            INSERT INTO forecast_models (tenant_id, model_type, algorithm, hyperparameters)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(tenant_id)
        .bind(request.model_type.as_str())
        .bind(request.algorithm.as_str())
        .bind(hyperparameters)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result.map(Into::into)
    }

    pub async fn find_model(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<ForecastModel>, sqlx::Error> {
        let timer = QueryTimer::new("find_forecast_model");
        let result = sqlx::query_as::<_, ForecastModelEntity>(
            "SELECT * FROM forecast_models WHERE id = $1 AND tenant_id = $2",
        )
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        Ok(result?.map(Into::into))
    }

    pub async fn find_active_model(
        &self,
        tenant_id: Uuid,
        model_type: ForecastType,
    ) -> Result<Option<ForecastModel>, sqlx::Error> {
        let timer = QueryTimer::new("find_active_forecast_model");
        let result = sqlx::query_as::<_, ForecastModelEntity>(
            "SELECT * FROM forecast_models WHERE tenant_id = $1 AND model_type = $2 AND is_active",
        )
        .bind(tenant_id)
        .bind(model_type.as_str())
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        Ok(result?.map(Into::into))
    }

    pub async fn list_active_models(&self, tenant_id: Uuid) -> Result<Vec<ForecastModel>, sqlx::Error> {
        let timer = QueryTimer::new("list_active_forecast_models");
        let rows = sqlx::query_as::<_, ForecastModelEntity>(
            "SELECT * FROM forecast_models WHERE tenant_id = $1 AND is_active ORDER BY model_type",
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;
        timer.record();
        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Newest first.
    pub async fn list_models(
        &self,
        tenant_id: Uuid,
        page: &PageRequest,
    ) -> Result<(Vec<ForecastModel>, i64), sqlx::Error> {
        let timer = QueryTimer::new("list_forecast_models");
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM forecast_models WHERE tenant_id = $1")
            .bind(tenant_id)
            .fetch_one(&self.pool)
            .await?;
        let rows = sqlx::query_as::<_, ForecastModelEntity>(
            r#"
            SELECT * FROM forecast_models
            WHERE tenant_id = $1
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(tenant_id)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;
        timer.record();
        Ok((rows.into_iter().map(Into::into).collect(), total))
    }

    /// Makes `id` the only active model of its type.
    pub async fn activate_model(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<ForecastModel>, sqlx::Error> {
        let timer = QueryTimer::new("activate_forecast_model");
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            UPDATE forecast_models SET is_active = FALSE, updated_at = NOW()
            WHERE tenant_id = $1 AND is_active AND id <> $2
              AND model_type = (SELECT model_type FROM forecast_models WHERE id = $2 AND tenant_id = $1)
            "#,
        )
        .bind(tenant_id)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        let activated = sqlx::query_as::<_, ForecastModelEntity>(
            r#"
            UPDATE forecast_models SET is_active = TRUE, updated_at = NOW()
            WHERE id = $1 AND tenant_id = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(&mut *tx)
        .await?;

        if activated.is_some() {
            tx.commit().await?;
        } else {
            tx.rollback().await?;
        }
        timer.record();
        Ok(activated.map(Into::into))
    }

    // History

    /// One value per period, in period order.
    pub async fn history(
        &self,
        tenant_id: Uuid,
        forecast_type: ForecastType,
        periods: &[Period],
    ) -> Result<Vec<f64>, sqlx::Error> {
        let timer = QueryTimer::new("forecast_history");
        let starts: Vec<NaiveDate> = periods.iter().map(|p| p.start).collect();
        let ends: Vec<NaiveDate> = periods.iter().map(|p| p.end).collect();
        let sql = history_sql(forecast_type);
        let rows = sqlx::query_as::<_, PeriodValueEntity>(&sql)
            .bind(tenant_id)
            .bind(&starts)
            .bind(&ends)
            .fetch_all(&self.pool)
            .await?;
        timer.record();
        Ok(rows.into_iter().map(|r| r.value).collect())
    }

    // Forecasts

    /// Stores the forecasts. A period forecast earlier keeps its recorded actual.
    pub async fn upsert_forecasts(
        &self,
        tenant_id: Uuid,
        forecasts: &[NewForecast],
    ) -> Result<Vec<Forecast>, sqlx::Error> {
        let timer = QueryTimer::new("upsert_forecasts");
        let mut tx = self.pool.begin().await?;
        let mut stored = Vec::with_capacity(forecasts.len());
        for new in forecasts {
            let row = sqlx::query_as::<_, ForecastEntity>(
                r#"
                INSERT INTO forecasts (
                    tenant_id, model_id, forecast_type, granularity, period_start, period_end,
                    predicted_value, lower_bound, upper_bound, confidence_score
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                ON CONFLICT (tenant_id, forecast_type, period_start, period_end) DO UPDATE
                SET model_id = EXCLUDED.model_id,
                    granularity = EXCLUDED.granularity,
                    predicted_value = EXCLUDED.predicted_value,
                    lower_bound = EXCLUDED.lower_bound,
                    upper_bound = EXCLUDED.upper_bound,
                    confidence_score = EXCLUDED.confidence_score,
                    generated_at = NOW()
                RETURNING *
                "#,
            )
            .bind(tenant_id)
            .bind(new.model_id)
            .bind(new.forecast_type.as_str())
            .bind(new.granularity.as_str())
            .bind(new.period.start)
            .bind(new.period.end)
            .bind(new.projection.predicted)
            .bind(new.projection.lower)
            .bind(new.projection.upper)
            .bind(new.projection.confidence)
            .fetch_one(&mut *tx)
            .await?;
            stored.push(row.into());
        }
        tx.commit().await?;
        timer.record();
        Ok(stored)
    }

    pub async fn find_forecast(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<Forecast>, sqlx::Error> {
        let timer = QueryTimer::new("find_forecast");
        let result = sqlx::query_as::<_, ForecastEntity>(
            "SELECT * FROM forecasts WHERE id = $1 AND tenant_id = $2",
        )
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        Ok(result?.map(Into::into))
    }

    /// Forecasts whose period starts within the range, oldest first.
    pub async fn list_forecasts(
        &self,
        tenant_id: Uuid,
        query: &ForecastQuery,
    ) -> Result<Vec<Forecast>, sqlx::Error> {
        let timer = QueryTimer::new("list_forecasts");
        let rows = sqlx::query_as::<_, ForecastEntity>(
            r#"
            SELECT * FROM forecasts
            WHERE tenant_id = $1
              AND ($2::text IS NULL OR forecast_type = $2)
              AND ($3::date IS NULL OR period_start >= $3)
              AND ($4::date IS NULL OR period_start <= $4)
            ORDER BY period_start, forecast_type
            LIMIT $5
            "#,
        )
        .bind(tenant_id)
        .bind(query.forecast_type.map(|t| t.as_str()))
        .bind(query.from)
        .bind(query.to)
        .bind(MAX_LISTED_FORECASTS)
        .fetch_all(&self.pool)
        .await?;
        timer.record();
        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Saves the actual and refreshes the model's MAPE and RMSE from every recorded actual.
    pub async fn record_actual(&self, forecast: &Forecast) -> Result<Forecast, sqlx::Error> {
        let timer = QueryTimer::new("record_forecast_actual");
        let mut tx = self.pool.begin().await?;

        let saved = sqlx::query_as::<_, ForecastEntity>(
            r#"
            UPDATE forecasts SET actual_value = $3
            WHERE id = $1 AND tenant_id = $2
            RETURNING *
            "#,
        )
        .bind(forecast.id)
        .bind(forecast.tenant_id)
        .bind(forecast.actual_value)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            UPDATE forecast_models m
            SET accuracy_mape = stats.mape, accuracy_rmse = stats.rmse, updated_at = NOW()
            FROM (
                SELECT
                    AVG(ABS(actual_value - predicted_value) / predicted_value * 100)
                        FILTER (WHERE predicted_value > 0) AS mape,
                    SQRT(AVG(POWER(actual_value - predicted_value, 2))) AS rmse
                FROM forecasts
                WHERE model_id = $1 AND actual_value IS NOT NULL
            ) stats
            WHERE m.id = $1
            "#,
        )
        .bind(forecast.model_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        timer.record();
        Ok(saved.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_sql_is_scoped_to_tenant() {
        for forecast_type in ForecastType::ALL {
            let sql = history_sql(*forecast_type);
            assert!(sql.contains("tenant_id = $1"));
            assert!(sql.contains("UNNEST($2::date[], $3::date[])"));
        }
    }
}
