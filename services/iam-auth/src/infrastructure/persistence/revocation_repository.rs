//! PostgreSQL 吊销账本

use std::time::Duration;

use async_trait::async_trait;
use procura_adapter_postgres::map_sqlx_error;
use procura_common::with_deadline;
use procura_errors::AppResult;
use sqlx::PgPool;
use tracing::debug;

use crate::domain::revocation::{RevocationLedger, token_digest};

pub struct PostgresRevocationLedger {
    pool: PgPool,
    timeout: Duration,
}

impl PostgresRevocationLedger {
    pub fn new(pool: PgPool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }
}

#[async_trait]
impl RevocationLedger for PostgresRevocationLedger {
    async fn store(&self, token: &str) -> AppResult<()> {
        let digest = token_digest(token);
        with_deadline(self.timeout, "revocation.store", async {
            sqlx::query(
                r#"
                INSERT INTO revoked_tokens (token_hash, revoked_at)
                VALUES ($1, NOW())
                ON CONFLICT (token_hash) DO NOTHING
                "#,
            )
            .bind(&digest)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)
        })
        .await?;

        debug!("Token added to revocation ledger");
        Ok(())
    }

    async fn is_revoked(&self, token: &str) -> AppResult<bool> {
        let digest = token_digest(token);
        with_deadline(self.timeout, "revocation.check", async {
            sqlx::query_scalar::<_, bool>(
                "SELECT EXISTS(SELECT 1 FROM revoked_tokens WHERE token_hash = $1)",
            )
            .bind(&digest)
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)
        })
        .await
    }
}
