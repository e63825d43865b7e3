//! Member repository for database operations.

use domain::models::member::{CreateMemberRequest, Gender};
use domain::models::{Member, MemberStatus};
use shared::pagination::PageRequest;
use sqlx::PgPool;
use uuid::Uuid;

use crate::entities::{MemberEntity, StatusCountEntity};
use crate::metrics::QueryTimer;

/// Repository for club member database operations. Every query is tenant scoped.
#[derive(Clone)]
pub struct MemberRepository {
    pool: PgPool,
}

impl MemberRepository {
    /// Creates a new MemberRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn create(
        &self,
        tenant_id: Uuid,
        request: &CreateMemberRequest,
        status: MemberStatus,
    ) -> Result<Member, sqlx::Error> {
        let timer = QueryTimer::new("create_member");
        let result = sqlx::query_as::<_, MemberEntity>(
            r#"
            INSERT INTO members (
                tenant_id, first_name, last_name, email, phone, date_of_birth, gender, status, notes
            )
            VALUES ($1, $2, $3, LOWER($4), $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(tenant_id)
        .bind(&request.first_name)
        .bind(&request.last_name)
        .bind(&request.email)
        .bind(&request.phone)
        .bind(request.date_of_birth)
        .bind(request.gender.unwrap_or(Gender::Unspecified).as_str())
        .bind(status.as_str())
        .bind(&request.notes)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result.map(Into::into)
    }

    pub async fn find_by_id(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<Member>, sqlx::Error> {
        let timer = QueryTimer::new("find_member_by_id");
        let result = sqlx::query_as::<_, MemberEntity>(
            "SELECT * FROM members WHERE id = $1 AND tenant_id = $2",
        )
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        Ok(result?.map(Into::into))
    }

    pub async fn find_by_email(
        &self,
        tenant_id: Uuid,
        email: &str,
    ) -> Result<Option<Member>, sqlx::Error> {
        let timer = QueryTimer::new("find_member_by_email");
        let result = sqlx::query_as::<_, MemberEntity>(
            "SELECT * FROM members WHERE tenant_id = $1 AND LOWER(email) = LOWER($2)",
        )
        .bind(tenant_id)
        .bind(email)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        Ok(result?.map(Into::into))
    }

    /// Finds the member profile linked to a login account.
    pub async fn find_by_user_id(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Member>, sqlx::Error> {
        let timer = QueryTimer::new("find_member_by_user_id");
        let result = sqlx::query_as::<_, MemberEntity>(
            "SELECT * FROM members WHERE tenant_id = $1 AND user_id = $2",
        )
        .bind(tenant_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        Ok(result?.map(Into::into))
    }

    /// Lists members, optionally searching name/email (case-insensitive) and filtering by status.
    pub async fn list(
        &self,
        tenant_id: Uuid,
        search: Option<&str>,
        status: Option<MemberStatus>,
        page: &PageRequest,
    ) -> Result<(Vec<Member>, i64), sqlx::Error> {
        let timer = QueryTimer::new("list_members");
        let pattern = search
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{}%", s.to_lowercase()));
        let status = status.map(|s| s.as_str());

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM members
            WHERE tenant_id = $1
              AND ($2::text IS NULL OR LOWER(first_name || ' ' || last_name) LIKE $2 OR LOWER(email) LIKE $2)
              AND ($3::text IS NULL OR status = $3)
            "#,
        )
        .bind(tenant_id)
        .bind(&pattern)
        .bind(status)
        .fetch_one(&self.pool)
        .await?;

        let rows = sqlx::query_as::<_, MemberEntity>(
            r#"
            SELECT * FROM members
            WHERE tenant_id = $1
              AND ($2::text IS NULL OR LOWER(first_name || ' ' || last_name) LIKE $2 OR LOWER(email) LIKE $2)
              AND ($3::text IS NULL OR status = $3)
            ORDER BY last_name, first_name
            LIMIT $4 OFFSET $5
            "#,
        )
        .bind(tenant_id)
        .bind(&pattern)
        .bind(status)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;
        timer.record();

        Ok((rows.into_iter().map(Into::into).collect(), total))
    }

    pub async fn update(&self, member: &Member) -> Result<Member, sqlx::Error> {
        let timer = QueryTimer::new("update_member");
        let result = sqlx::query_as::<_, MemberEntity>(
            r#"
            UPDATE members
            SET first_name = $3, last_name = $4, email = LOWER($5), phone = $6,
                date_of_birth = $7, gender = $8, status = $9, notes = $10, user_id = $11,
                updated_at = NOW()
            WHERE id = $1 AND tenant_id = $2
            RETURNING *
            "#,
        )
        .bind(member.id)
        .bind(member.tenant_id)
        .bind(&member.first_name)
        .bind(&member.last_name)
        .bind(&member.email)
        .bind(&member.phone)
        .bind(member.date_of_birth)
        .bind(member.gender.as_str())
        .bind(member.status.as_str())
        .bind(&member.notes)
        .bind(member.user_id)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result.map(Into::into)
    }

    /// Deletes a member. Returns false when nothing matched.
    pub async fn delete(&self, tenant_id: Uuid, id: Uuid) -> Result<bool, sqlx::Error> {
        let timer = QueryTimer::new("delete_member");
        let result = sqlx::query("DELETE FROM members WHERE id = $1 AND tenant_id = $2")
            .bind(id)
            .bind(tenant_id)
            .execute(&self.pool)
            .await?;
        timer.record();
        Ok(result.rows_affected() > 0)
    }

    pub async fn count_by_status(&self, tenant_id: Uuid) -> Result<Vec<(MemberStatus, i64)>, sqlx::Error> {
        let timer = QueryTimer::new("count_members_by_status");
        let rows = sqlx::query_as::<_, StatusCountEntity>(
            "SELECT status, COUNT(*) AS count FROM members WHERE tenant_id = $1 GROUP BY status",
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;
        timer.record();

        Ok(rows
            .into_iter()
            .filter_map(|row| row.status.parse::<MemberStatus>().ok().map(|s| (s, row.count)))
            .collect())
    }
}
