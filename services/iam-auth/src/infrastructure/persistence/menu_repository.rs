//! PostgreSQL 菜单仓储

use std::time::Duration;

use async_trait::async_trait;
use procura_adapter_postgres::map_sqlx_error;
use procura_common::with_deadline;
use procura_errors::AppResult;
use sqlx::PgPool;
use uuid::Uuid;

use super::rows::MenuRow;
use crate::domain::rbac::{Menu, MenuId, MenuRepository};

pub struct PostgresMenuRepository {
    pool: PgPool,
    timeout: Duration,
}

impl PostgresMenuRepository {
    pub fn new(pool: PgPool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }
}

#[async_trait]
impl MenuRepository for PostgresMenuRepository {
    async fn find_by_ids(&self, ids: &[MenuId]) -> AppResult<Vec<Menu>> {
        let ids: Vec<Uuid> = ids.iter().map(|id| id.0).collect();
        let rows = with_deadline(self.timeout, "menu.find_by_ids", async {
            sqlx::query_as::<_, MenuRow>(
                r#"
                SELECT id, parent_id, name, path, sort_order
                FROM menus
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
