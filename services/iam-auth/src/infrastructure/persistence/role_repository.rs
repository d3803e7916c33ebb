//! PostgreSQL 角色仓储

use std::time::Duration;

use async_trait::async_trait;
use procura_adapter_postgres::map_sqlx_error;
use procura_common::with_deadline;
use procura_errors::{AppError, AppResult};
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use super::rows::{MenuRow, PermissionRow, RoleRow};
use crate::domain::rbac::{Menu, MenuId, Permission, PermissionId, Role, RoleId, RoleRepository};

const ROLE_COLUMNS: &str = "id, name, description, is_system, created_at, updated_at";

pub struct PostgresRoleRepository {
    pool: PgPool,
    timeout: Duration,
}

impl PostgresRoleRepository {
    pub fn new(pool: PgPool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }

    /// 关联表替换：软删除现有关联，再插入（或恢复）新关联，一个事务内完成
    async fn replace_links(
        &self,
        operation: &str,
        table: &str,
        column: &str,
        role_id: &RoleId,
        ids: &[Uuid],
    ) -> AppResult<()> {
        let clear_sql = format!(
            "UPDATE {table} SET deleted_at = NOW() WHERE role_id = $1 AND deleted_at IS NULL"
        );
        let insert_sql = format!(
            r#"
            INSERT INTO {table} (role_id, {column}, created_at)
            SELECT $1, unnest($2::uuid[]), NOW()
            ON CONFLICT (role_id, {column}) DO UPDATE SET deleted_at = NULL, created_at = NOW()
            "#
        );

        with_deadline(self.timeout, operation, async {
            let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

            sqlx::query(&clear_sql)
                .bind(role_id.0)
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx_error)?;

            if !ids.is_empty() {
                sqlx::query(&insert_sql)
                    .bind(role_id.0)
                    .bind(ids)
                    .execute(&mut *tx)
                    .await
                    .map_err(map_sqlx_error)?;
            }

            tx.commit().await.map_err(map_sqlx_error)
        })
        .await?;

        info!(role_id = %role_id, count = ids.len(), table, "Role links replaced");
        Ok(())
    }
}

#[async_trait]
impl RoleRepository for PostgresRoleRepository {
    async fn list(&self) -> AppResult<Vec<Role>> {
        let sql = format!(
            "SELECT {ROLE_COLUMNS} FROM roles WHERE deleted_at IS NULL ORDER BY is_system DESC, name"
        );
        let rows = with_deadline(self.timeout, "role.list", async {
            sqlx::query_as::<_, RoleRow>(&sql)
                .fetch_all(&self.pool)
                .await
                .map_err(map_sqlx_error)
        })
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn find_by_id(&self, id: &RoleId) -> AppResult<Option<Role>> {
        let sql = format!("SELECT {ROLE_COLUMNS} FROM roles WHERE id = $1 AND deleted_at IS NULL");
        let row = with_deadline(self.timeout, "role.find_by_id", async {
            sqlx::query_as::<_, RoleRow>(&sql)
                .bind(id.0)
                .fetch_optional(&self.pool)
                .await
                .map_err(map_sqlx_error)
        })
        .await?;

        Ok(row.map(Into::into))
    }

    async fn find_by_name(&self, name: &str) -> AppResult<Option<Role>> {
        let sql =
            format!("SELECT {ROLE_COLUMNS} FROM roles WHERE name = $1 AND deleted_at IS NULL");
        let row = with_deadline(self.timeout, "role.find_by_name", async {
            sqlx::query_as::<_, RoleRow>(&sql)
                .bind(name)
                .fetch_optional(&self.pool)
                .await
                .map_err(map_sqlx_error)
        })
        .await?;

        Ok(row.map(Into::into))
    }

    async fn create(&self, role: &Role) -> AppResult<()> {
        with_deadline(self.timeout, "role.create", async {
            sqlx::query(
                r#"
                INSERT INTO roles (id, name, description, is_system, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(role.id.0)
            .bind(&role.name)
            .bind(&role.description)
            .bind(role.is_system)
            .bind(role.created_at)
            .bind(role.updated_at)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)
        })
        .await
        .map_err(|e| match e {
            AppError::Conflict(_) => AppError::conflict(format!("Role '{}' already exists", role.name)),
            other => other,
        })?;

        Ok(())
    }

    async fn update(&self, role: &Role) -> AppResult<()> {
        let result = with_deadline(self.timeout, "role.update", async {
            sqlx::query(
                r#"
                UPDATE roles
                SET name = $2, description = $3, updated_at = $4
                WHERE id = $1 AND deleted_at IS NULL
                "#,
            )
            .bind(role.id.0)
            .bind(&role.name)
            .bind(&role.description)
            .bind(role.updated_at)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)
        })
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found(format!("Role {}", role.id)));
        }
        Ok(())
    }

    async fn soft_delete(&self, id: &RoleId) -> AppResult<()> {
        let affected = with_deadline(self.timeout, "role.delete", async {
            let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

            let result = sqlx::query(
                "UPDATE roles SET deleted_at = NOW() WHERE id = $1 AND deleted_at IS NULL",
            )
            .bind(id.0)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

            for table in ["role_permissions", "role_menus"] {
                sqlx::query(&format!(
                    "UPDATE {table} SET deleted_at = NOW() WHERE role_id = $1 AND deleted_at IS NULL"
                ))
                .bind(id.0)
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx_error)?;
            }

            tx.commit().await.map_err(map_sqlx_error)?;
            Ok(result.rows_affected())
        })
        .await?;

        if affected == 0 {
            return Err(AppError::not_found(format!("Role {}", id)));
        }
        Ok(())
    }

    async fn permissions_of(&self, id: &RoleId) -> AppResult<Vec<Permission>> {
        let rows = with_deadline(self.timeout, "role.permissions", async {
            sqlx::query_as::<_, PermissionRow>(
                r#"
                SELECT p.id, p.resource, p.action, p.description
                FROM permissions p
                INNER JOIN role_permissions rp ON p.id = rp.permission_id
                WHERE rp.role_id = $1 AND rp.deleted_at IS NULL AND p.deleted_at IS NULL
                ORDER BY p.resource, p.action
                "#,
            )
            .bind(id.0)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)
        })
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn menus_of(&self, id: &RoleId) -> AppResult<Vec<Menu>> {
        let rows = with_deadline(self.timeout, "role.menus", async {
            sqlx::query_as::<_, MenuRow>(
                r#"
                SELECT m.id, m.parent_id, m.name, m.path, m.sort_order
                FROM menus m
                INNER JOIN role_menus rm ON m.id = rm.menu_id
                WHERE rm.role_id = $1 AND rm.deleted_at IS NULL AND m.deleted_at IS NULL
                ORDER BY m.sort_order, m.name
                "#,
            )
            .bind(id.0)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)
        })
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn permissions_for_role_name(&self, name: &str) -> AppResult<Vec<Permission>> {
        let rows = with_deadline(self.timeout, "role.permissions_by_name", async {
            sqlx::query_as::<_, PermissionRow>(
                r#"
                SELECT p.id, p.resource, p.action, p.description
                FROM permissions p
                INNER JOIN role_permissions rp ON p.id = rp.permission_id
                INNER JOIN roles r ON r.id = rp.role_id
                WHERE r.name = $1
                  AND r.deleted_at IS NULL
                  AND rp.deleted_at IS NULL
                  AND p.deleted_at IS NULL
                "#,
            )
            .bind(name)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)
        })
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn menus_for_role_name(&self, name: &str) -> AppResult<Vec<Menu>> {
        let rows = with_deadline(self.timeout, "role.menus_by_name", async {
            sqlx::query_as::<_, MenuRow>(
                r#"
                SELECT m.id, m.parent_id, m.name, m.path, m.sort_order
                FROM menus m
                INNER JOIN role_menus rm ON m.id = rm.menu_id
                INNER JOIN roles r ON r.id = rm.role_id
                WHERE r.name = $1
                  AND r.deleted_at IS NULL
                  AND rm.deleted_at IS NULL
                  AND m.deleted_at IS NULL
                ORDER BY m.sort_order, m.name
                "#,
            )
            .bind(name)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)
        })
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn replace_permissions(
        &self,
        id: &RoleId,
        permission_ids: &[PermissionId],
    ) -> AppResult<()> {
        let ids: Vec<Uuid> = permission_ids.iter().map(|p| p.0).collect();
        self.replace_links(
            "role.replace_permissions",
            "role_permissions",
            "permission_id",
            id,
            &ids,
        )
        .await
    }

    async fn replace_menus(&self, id: &RoleId, menu_ids: &[MenuId]) -> AppResult<()> {
        let ids: Vec<Uuid> = menu_ids.iter().map(|m| m.0).collect();
        self.replace_links("role.replace_menus", "role_menus", "menu_id", id, &ids)
            .await
    }
}
