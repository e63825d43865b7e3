//! User repository for database operations.

use domain::models::{Role, User};
use shared::pagination::PageRequest;
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use crate::entities::UserEntity;
use crate::metrics::QueryTimer;

/// Repository for user account database operations.
#[derive(Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    /// Creates a new UserRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Inserts a user. `tenant_id` is `None` only for platform admins.
    pub async fn insert<'e, E: PgExecutor<'e>>(
        executor: E,
        tenant_id: Option<Uuid>,
        email: &str,
        password_hash: &str,
        display_name: &str,
        role: Role,
    ) -> Result<User, sqlx::Error> {
        let timer = QueryTimer::new("insert_user");
        let result = sqlx::query_as::<_, UserEntity>(
            r#"
            INSERT INTO users (tenant_id, email, password_hash, display_name, role)
            VALUES ($1, LOWER($2), $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(tenant_id)
        .bind(email)
        .bind(password_hash)
        .bind(display_name)
        .bind(role.as_str())
        .fetch_one(executor)
        .await;
        timer.record();
        result.map(Into::into)
    }

    pub async fn create(
        &self,
        tenant_id: Option<Uuid>,
        email: &str,
        password_hash: &str,
        display_name: &str,
        role: Role,
    ) -> Result<User, sqlx::Error> {
        Self::insert(&self.pool, tenant_id, email, password_hash, display_name, role).await
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, sqlx::Error> {
        let timer = QueryTimer::new("find_user_by_id");
        let result = sqlx::query_as::<_, UserEntity>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await;
        timer.record();
        Ok(result?.map(Into::into))
    }

    pub async fn find_in_tenant(
        &self,
        tenant_id: Uuid,
        id: Uuid,
    ) -> Result<Option<User>, sqlx::Error> {
        let timer = QueryTimer::new("find_user_in_tenant");
        let result = sqlx::query_as::<_, UserEntity>(
            "SELECT * FROM users WHERE id = $1 AND tenant_id = $2",
        )
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        Ok(result?.map(Into::into))
    }

    /// Loads the credential row (including the password hash) for login.
    pub async fn find_credentials(
        &self,
        tenant_id: Option<Uuid>,
        email: &str,
    ) -> Result<Option<UserEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_user_credentials");
        let result = sqlx::query_as::<_, UserEntity>(
            r#"
            SELECT * FROM users
            WHERE LOWER(email) = LOWER($1)
              AND tenant_id IS NOT DISTINCT FROM $2
            "#,
        )
        .bind(email)
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    pub async fn list_by_tenant(
        &self,
        tenant_id: Uuid,
        role: Option<Role>,
        page: &PageRequest,
    ) -> Result<(Vec<User>, i64), sqlx::Error> {
        let timer = QueryTimer::new("list_users_by_tenant");
        let role = role.map(|r| r.as_str());
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM users WHERE tenant_id = $1 AND ($2::text IS NULL OR role = $2)",
        )
        .bind(tenant_id)
        .bind(role)
        .fetch_one(&self.pool)
        .await?;

        let rows = sqlx::query_as::<_, UserEntity>(
            r#"
            SELECT * FROM users
            WHERE tenant_id = $1 AND ($2::text IS NULL OR role = $2)
            ORDER BY display_name
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(tenant_id)
        .bind(role)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;
        timer.record();

        Ok((rows.into_iter().map(Into::into).collect(), total))
    }

    pub async fn update(&self, user: &User) -> Result<User, sqlx::Error> {
        let timer = QueryTimer::new("update_user");
        let result = sqlx::query_as::<_, UserEntity>(
            r#"
            UPDATE users
            SET display_name = $2, role = $3, is_active = $4, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(user.id)
        .bind(&user.display_name)
        .bind(user.role.as_str())
        .bind(user.is_active)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result.map(Into::into)
    }

    pub async fn record_login(&self, id: Uuid) -> Result<(), sqlx::Error> {
        let timer = QueryTimer::new("record_user_login");
        sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        timer.record();
        Ok(())
    }
}
