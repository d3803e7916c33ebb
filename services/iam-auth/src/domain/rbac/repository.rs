//! RBAC 仓储接口

use async_trait::async_trait;
use procura_errors::AppResult;

use super::menu::{Menu, MenuId};
use super::permission::{Permission, PermissionId};
use super::role::{Role, RoleId};

/// 角色仓储接口
///
/// 所有查询排除已软删除的记录
#[async_trait]
pub trait RoleRepository: Send + Sync {
    async fn list(&self) -> AppResult<Vec<Role>>;

    async fn find_by_id(&self, id: &RoleId) -> AppResult<Option<Role>>;

    async fn find_by_name(&self, name: &str) -> AppResult<Option<Role>>;

    /// 创建角色，名称重复返回 Conflict
    async fn create(&self, role: &Role) -> AppResult<()>;

    async fn update(&self, role: &Role) -> AppResult<()>;

    /// 软删除角色及其关联
    async fn soft_delete(&self, id: &RoleId) -> AppResult<()>;

    async fn permissions_of(&self, id: &RoleId) -> AppResult<Vec<Permission>>;

    async fn menus_of(&self, id: &RoleId) -> AppResult<Vec<Menu>>;

    /// 按角色名解析有效权限（认证中间件使用）
    async fn permissions_for_role_name(&self, name: &str) -> AppResult<Vec<Permission>>;

    async fn menus_for_role_name(&self, name: &str) -> AppResult<Vec<Menu>>;

    /// 替换角色权限：先清空再插入，在同一个事务内完成
    async fn replace_permissions(&self, id: &RoleId, permission_ids: &[PermissionId])
    -> AppResult<()>;

    /// 替换角色菜单：先清空再插入，在同一个事务内完成
    async fn replace_menus(&self, id: &RoleId, menu_ids: &[MenuId]) -> AppResult<()>;
}

/// 权限仓储接口
#[async_trait]
pub trait PermissionRepository: Send + Sync {
    async fn list_all(&self) -> AppResult<Vec<Permission>>;

    async fn find_by_ids(&self, ids: &[PermissionId]) -> AppResult<Vec<Permission>>;
}

/// 菜单仓储接口
#[async_trait]
pub trait MenuRepository: Send + Sync {
    async fn find_by_ids(&self, ids: &[MenuId]) -> AppResult<Vec<Menu>>;
}
