//! 数据行映射

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::rbac::{Menu, MenuId, Permission, PermissionId, Role, RoleId};

#[derive(sqlx::FromRow)]
pub(super) struct RoleRow {
    id: Uuid,
    name: String,
    description: Option<String>,
    is_system: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<RoleRow> for Role {
    fn from(row: RoleRow) -> Self {
        Role {
            id: RoleId(row.id),
            name: row.name,
            description: row.description,
            is_system: row.is_system,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
pub(super) struct PermissionRow {
    id: Uuid,
    resource: String,
    action: String,
    description: Option<String>,
}

impl From<PermissionRow> for Permission {
    fn from(row: PermissionRow) -> Self {
        Permission {
            id: PermissionId(row.id),
            resource: row.resource,
            action: row.action,
            description: row.description,
        }
    }
}

#[derive(sqlx::FromRow)]
pub(super) struct MenuRow {
    id: Uuid,
    parent_id: Option<Uuid>,
    name: String,
    path: String,
    sort_order: i32,
}

impl From<MenuRow> for Menu {
    fn from(row: MenuRow) -> Self {
        Menu {
            id: MenuId(row.id),
            parent_id: row.parent_id.map(MenuId),
            name: row.name,
            path: row.path,
            sort_order: row.sort_order,
        }
    }
}
