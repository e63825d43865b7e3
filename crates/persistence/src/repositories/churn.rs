//! Churn model, prediction and intervention repository.

use chrono::{DateTime, Utc};
use domain::models::churn::{
    CreateChurnModelRequest, CreateInterventionRequest, InterventionQuery, PredictionQuery,
};
use domain::models::{ChurnIntervention, ChurnModel, ChurnPrediction, RiskLevel};
use serde_json::json;
use shared::pagination::PageRequest;
use sqlx::PgPool;
use std::str::FromStr;
use uuid::Uuid;

use crate::entities::{ChurnInterventionEntity, ChurnModelEntity, ChurnPredictionEntity, RiskCountEntity};
use crate::metrics::QueryTimer;

/// Values for a new prediction; the risk level is derived from the score by the caller.
#[derive(Debug, Clone)]
pub struct NewPrediction {
    pub member_id: Uuid,
    pub model_id: Uuid,
    pub churn_score: i32,
    pub risk_level: RiskLevel,
    pub top_risk_factors: serde_json::Value,
    pub recommended_interventions: serde_json::Value,
    pub valid_until: DateTime<Utc>,
}

#[derive(Clone)]
pub struct ChurnRepository {
    pool: PgPool,
}

impl ChurnRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // Models

    pub async fn create_model(
        &self,
        tenant_id: Uuid,
        request: &CreateChurnModelRequest,
    ) -> Result<ChurnModel, sqlx::Error> {
        let timer = QueryTimer::new("create_churn_model");
        let result = sqlx::query_as::<_, ChurnModelEntity>(
            r#"
            INSERT INTO churn_models (tenant_id, name, version, algorithm, features)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(tenant_id)
        .bind(&request.name)
        .bind(&request.version)
        .bind(&request.algorithm)
        .bind(request.features.clone().unwrap_or_else(|| json!([])))
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result.map(Into::into)
    }

    pub async fn find_model(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<ChurnModel>, sqlx::Error> {
        let timer = QueryTimer::new("find_churn_model");
        let result = sqlx::query_as::<_, ChurnModelEntity>(
            "SELECT * FROM churn_models WHERE id = $1 AND tenant_id = $2",
        )
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        Ok(result?.map(Into::into))
    }

    pub async fn find_active_model(&self, tenant_id: Uuid) -> Result<Option<ChurnModel>, sqlx::Error> {
        let timer = QueryTimer::new("find_active_churn_model");
        let result = sqlx::query_as::<_, ChurnModelEntity>(
            "SELECT * FROM churn_models WHERE tenant_id = $1 AND is_active",
        )
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        Ok(result?.map(Into::into))
    }

    pub async fn list_models(&self, tenant_id: Uuid) -> Result<Vec<ChurnModel>, sqlx::Error> {
        let timer = QueryTimer::new("list_churn_models");
        let rows = sqlx::query_as::<_, ChurnModelEntity>(
            "SELECT * FROM churn_models WHERE tenant_id = $1 ORDER BY created_at DESC",
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;
        timer.record();
        Ok(rows.into_iter().map(Into::into).collect())
    }

    pub async fn update_model_metrics(&self, model: &ChurnModel) -> Result<ChurnModel, sqlx::Error> {
        let timer = QueryTimer::new("update_churn_model_metrics");
        let result = sqlx::query_as::<_, ChurnModelEntity>(
            r#"
            UPDATE churn_models
            SET accuracy = $3, precision_score = $4, recall_score = $5, f1_score = $6,
                trained_at = $7, updated_at = NOW()
            WHERE id = $1 AND tenant_id = $2
            RETURNING *
            "#,
        )
        .bind(model.id)
        .bind(model.tenant_id)
        .bind(model.accuracy)
        .bind(model.precision_score)
        .bind(model.recall_score)
        .bind(model.f1_score)
        .bind(model.trained_at)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result.map(Into::into)
    }

    /// Makes `id` the tenant's only active model.
    pub async fn activate_model(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<ChurnModel>, sqlx::Error> {
        let timer = QueryTimer::new("activate_churn_model");
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "UPDATE churn_models SET is_active = FALSE, updated_at = NOW() WHERE tenant_id = $1 AND is_active AND id <> $2",
        )
        .bind(tenant_id)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        let activated = sqlx::query_as::<_, ChurnModelEntity>(
            r#"
            UPDATE churn_models SET is_active = TRUE, updated_at = NOW()
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

    // Predictions

    pub async fn create_prediction(
        &self,
        tenant_id: Uuid,
        new: &NewPrediction,
    ) -> Result<ChurnPrediction, sqlx::Error> {
        let timer = QueryTimer::new("create_churn_prediction");
        let result = sqlx::query_as::<_, ChurnPredictionEntity>(
            r#"
            INSERT INTO churn_predictions (
                tenant_id, member_id, model_id, churn_score, risk_level, top_risk_factors,
                recommended_interventions, valid_until
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(tenant_id)
        .bind(new.member_id)
        .bind(new.model_id)
        .bind(new.churn_score)
        .bind(new.risk_level.as_str())
        .bind(&new.top_risk_factors)
        .bind(&new.recommended_interventions)
        .bind(new.valid_until)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result.map(Into::into)
    }

    pub async fn find_prediction(
        &self,
        tenant_id: Uuid,
        id: Uuid,
    ) -> Result<Option<ChurnPrediction>, sqlx::Error> {
        let timer = QueryTimer::new("find_churn_prediction");
        let result = sqlx::query_as::<_, ChurnPredictionEntity>(
            "SELECT * FROM churn_predictions WHERE id = $1 AND tenant_id = $2",
        )
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        Ok(result?.map(Into::into))
    }

    pub async fn list_predictions(
        &self,
        tenant_id: Uuid,
        query: &PredictionQuery,
        page: &PageRequest,
    ) -> Result<(Vec<ChurnPrediction>, i64), sqlx::Error> {
        let timer = QueryTimer::new("list_churn_predictions");
        let risk = query.risk_level.map(|r| r.as_str());
        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM churn_predictions
            WHERE tenant_id = $1 AND ($2::text IS NULL OR risk_level = $2) AND ($3::uuid IS NULL OR member_id = $3)
            "#,
        )
        .bind(tenant_id)
        .bind(risk)
        .bind(query.member_id)
        .fetch_one(&self.pool)
        .await?;

        let rows = sqlx::query_as::<_, ChurnPredictionEntity>(
            r#"
            SELECT * FROM churn_predictions
            WHERE tenant_id = $1 AND ($2::text IS NULL OR risk_level = $2) AND ($3::uuid IS NULL OR member_id = $3)
            ORDER BY created_at DESC
            LIMIT $4 OFFSET $5
            "#,
        )
        .bind(tenant_id)
        .bind(risk)
        .bind(query.member_id)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;
        timer.record();
        Ok((rows.into_iter().map(Into::into).collect(), total))
    }

    /// Each member's latest still-valid prediction when it is HIGH or CRITICAL, riskiest first.
    pub async fn at_risk_members(
        &self,
        tenant_id: Uuid,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<ChurnPrediction>, sqlx::Error> {
        let timer = QueryTimer::new("at_risk_members");
        let rows = sqlx::query_as::<_, ChurnPredictionEntity>(
            r#"
            SELECT * FROM (
                SELECT DISTINCT ON (member_id) *
                FROM churn_predictions
                WHERE tenant_id = $1 AND valid_until > $2
                ORDER BY member_id, created_at DESC
            ) latest
            WHERE risk_level IN ('HIGH', 'CRITICAL')
            ORDER BY churn_score DESC
            LIMIT $3
            "#,
        )
        .bind(tenant_id)
        .bind(now)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        timer.record();
        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Counts of members per risk level, using each member's latest valid prediction.
    pub async fn risk_counts(
        &self,
        tenant_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Vec<(RiskLevel, i64)>, sqlx::Error> {
        let timer = QueryTimer::new("churn_risk_counts");
        let rows = sqlx::query_as::<_, RiskCountEntity>(
            r#"
            SELECT risk_level, COUNT(*) AS count FROM (
                SELECT DISTINCT ON (member_id) risk_level
                FROM churn_predictions
                WHERE tenant_id = $1 AND valid_until > $2
                ORDER BY member_id, created_at DESC
            ) latest
            GROUP BY risk_level
            "#,
        )
        .bind(tenant_id)
        .bind(now)
        .fetch_all(&self.pool)
        .await?;
        timer.record();
        Ok(rows
            .into_iter()
            .filter_map(|r| RiskLevel::from_str(&r.risk_level).ok().map(|l| (l, r.count)))
            .collect())
    }

    pub async fn update_prediction_outcome(
        &self,
        prediction: &ChurnPrediction,
    ) -> Result<ChurnPrediction, sqlx::Error> {
        let timer = QueryTimer::new("update_churn_prediction_outcome");
        let result = sqlx::query_as::<_, ChurnPredictionEntity>(
            r#"
            UPDATE churn_predictions SET outcome = $3, outcome_recorded_at = $4
            WHERE id = $1 AND tenant_id = $2
            RETURNING *
            "#,
        )
        .bind(prediction.id)
        .bind(prediction.tenant_id)
        .bind(prediction.outcome.map(|o| o.as_str()))
        .bind(prediction.outcome_recorded_at)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result.map(Into::into)
    }

    // Interventions

    pub async fn create_intervention(
        &self,
        tenant_id: Uuid,
        request: &CreateInterventionRequest,
    ) -> Result<ChurnIntervention, sqlx::Error> {
        let timer = QueryTimer::new("create_churn_intervention");
        let status = if request.assigned_to.is_some() { "ASSIGNED" } else { "PLANNED" };
        let result = sqlx::query_as::<_, ChurnInterventionEntity>(
            r#"
            INSERT INTO churn_interventions (
                tenant_id, prediction_id, member_id, intervention_type, status, description, assigned_to
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(tenant_id)
        .bind(request.prediction_id)
        .bind(request.member_id)
        .bind(request.intervention_type.as_str())
        .bind(status)
        .bind(&request.description)
        .bind(request.assigned_to)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result.map(Into::into)
    }

    pub async fn find_intervention(
        &self,
        tenant_id: Uuid,
        id: Uuid,
    ) -> Result<Option<ChurnIntervention>, sqlx::Error> {
        let timer = QueryTimer::new("find_churn_intervention");
        let result = sqlx::query_as::<_, ChurnInterventionEntity>(
            "SELECT * FROM churn_interventions WHERE id = $1 AND tenant_id = $2",
        )
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        Ok(result?.map(Into::into))
    }

    pub async fn list_interventions(
        &self,
        tenant_id: Uuid,
        query: &InterventionQuery,
        page: &PageRequest,
    ) -> Result<(Vec<ChurnIntervention>, i64), sqlx::Error> {
        let timer = QueryTimer::new("list_churn_interventions");
        let status = query.status.map(|s| s.as_str());
        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM churn_interventions
            WHERE tenant_id = $1
              AND ($2::text IS NULL OR status = $2)
              AND ($3::uuid IS NULL OR member_id = $3)
              AND ($4::uuid IS NULL OR assigned_to = $4)
            "#,
        )
        .bind(tenant_id)
        .bind(status)
        .bind(query.member_id)
        .bind(query.assigned_to)
        .fetch_one(&self.pool)
        .await?;

        let rows = sqlx::query_as::<_, ChurnInterventionEntity>(
            r#"
            SELECT * FROM churn_interventions
            WHERE tenant_id = $1
              AND ($2::text IS NULL OR status = $2)
              AND ($3::uuid IS NULL OR member_id = $3)
              AND ($4::uuid IS NULL OR assigned_to = $4)
            ORDER BY created_at DESC
            LIMIT $5 OFFSET $6
            "#,
        )
        .bind(tenant_id)
        .bind(status)
        .bind(query.member_id)
        .bind(query.assigned_to)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;
        timer.record();
        Ok((rows.into_iter().map(Into::into).collect(), total))
    }

    pub async fn update_intervention(
        &self,
        intervention: &ChurnIntervention,
    ) -> Result<ChurnIntervention, sqlx::Error> {
        let timer = QueryTimer::new("update_churn_intervention");
        let result = sqlx::query_as::<_, ChurnInterventionEntity>(
            r#"
            UPDATE churn_interventions
            SET status = $3, description = $4, assigned_to = $5, executed_at = $6, outcome = $7,
                updated_at = NOW()
            WHERE id = $1 AND tenant_id = $2
            RETURNING *
            "#,
        )
        .bind(intervention.id)
        .bind(intervention.tenant_id)
        .bind(intervention.status.as_str())
        .bind(&intervention.description)
        .bind(intervention.assigned_to)
        .bind(intervention.executed_at)
        .bind(&intervention.outcome)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result.map(Into::into)
    }

    pub async fn delete_intervention(&self, tenant_id: Uuid, id: Uuid) -> Result<bool, sqlx::Error> {
        let timer = QueryTimer::new("delete_churn_intervention");
        let result = sqlx::query("DELETE FROM churn_interventions WHERE id = $1 AND tenant_id = $2")
            .bind(id)
            .bind(tenant_id)
            .execute(&self.pool)
            .await?;
        timer.record();
        Ok(result.rows_affected() > 0)
    }
}
