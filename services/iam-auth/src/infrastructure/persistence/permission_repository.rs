//! PostgreSQL 权限仓储

use std::time::Duration;

use async_trait::async_trait;
use procura_adapter_postgres::map_sqlx_error;
use procura_common::with_deadline;
use procura_errors::AppResult;
use sqlx::PgPool;
use uuid::Uuid;

use super::rows::PermissionRow;
use crate::domain::rbac::{Permission, PermissionId, PermissionRepository};

pub struct PostgresPermissionRepository {
    pool: PgPool,
    timeout: Duration,
}

impl PostgresPermissionRepository {
    pub fn new(pool: PgPool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }
}

#[async_trait]
impl PermissionRepository for PostgresPermissionRepository {
    async fn list_all(&self) -> AppResult<Vec<Permission>> {
        let rows = with_deadline(self.timeout, "permission.list", async {
            sqlx::query_as::<_, PermissionRow>(
                r#"
                SELECT id, resource, action, description
                FROM permissions
                WHERE deleted_at IS NULL
                ORDER BY resource, action
                "#,
            )
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)
        })
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn find_by_ids(&self, ids: &[PermissionId]) -> AppResult<Vec<Permission>> {
        let ids: Vec<Uuid> = ids.iter().map(|id| id.0).collect();
        let rows = with_deadline(self.timeout, "permission.find_by_ids", async {
            sqlx::query_as::<_, PermissionRow>(
                r#"
                SELECT id, resource, action, description
                FROM permissions
                WHERE id = ANY($1) AND deleted_at IS NULL
                "#,
            )
            .bind(&ids)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)
        })
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}
