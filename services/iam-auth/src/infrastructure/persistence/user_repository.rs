//! PostgreSQL 凭据存储

use std::time::Duration;

use async_trait::async_trait;
use procura_adapter_postgres::map_sqlx_error;
use procura_common::{UserId, with_deadline};
use procura_errors::{AppError, AppResult};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::user::{CredentialStore, UserAccount};
use crate::domain::value_objects::{Email, HashedPassword};

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    email: String,
    password_hash: String,
    role: String,
    is_active: bool,
}

impl TryFrom<UserRow> for UserAccount {
    type Error = AppError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(UserAccount {
            id: UserId::from_uuid(row.id),
            email: Email::parse(&row.email)?,
            password_hash: HashedPassword::from_hash(row.password_hash),
            role: row.role,
            is_active: row.is_active,
        })
    }
}

pub struct PostgresCredentialStore {
    pool: PgPool,
    timeout: Duration,
}

impl PostgresCredentialStore {
    pub fn new(pool: PgPool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }
}

#[async_trait]
impl CredentialStore for PostgresCredentialStore {
    async fn find_by_email(&self, email: &Email) -> AppResult<Option<UserAccount>> {
        let row = with_deadline(self.timeout, "user.find_by_email", async {
            sqlx::query_as::<_, UserRow>(
                r#"
                SELECT id, email, password_hash, role, is_active
                FROM users
                WHERE email = $1 AND deleted_at IS NULL
                "#,
            )
            .bind(email.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)
        })
        .await?;

        row.map(UserAccount::try_from).transpose()
    }

    async fn find_by_id(&self, id: &UserId) -> AppResult<Option<UserAccount>> {
        let row = with_deadline(self.timeout, "user.find_by_id", async {
            sqlx::query_as::<_, UserRow>(
                r#"
                SELECT id, email, password_hash, role, is_active
                FROM users
                WHERE id = $1 AND deleted_at IS NULL
                "#,
            )
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)
        })
        .await?;

        row.map(UserAccount::try_from).transpose()
    }

    async fn update_password(&self, id: &UserId, hash: &HashedPassword) -> AppResult<()> {
        let result = with_deadline(self.timeout, "user.update_password", async {
            sqlx::query(
                r#"
                UPDATE users
                SET password_hash = $2, updated_at = NOW()
                WHERE id = $1 AND deleted_at IS NULL
                "#,
            )
            .bind(id.0)
            .bind(hash.as_str())
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)
        })
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("User not found"));
        }
        Ok(())
    }
}
