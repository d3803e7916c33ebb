//! RBAC 应用服务

use std::collections::BTreeSet;
use std::sync::Arc;

use procura_errors::{AppError, AppResult};
use serde::Deserialize;
use tracing::info;

use crate::domain::identity::Identity;
use crate::domain::rbac::{
    Menu, MenuId, MenuRepository, Permission, PermissionId, PermissionRepository, Role, RoleId,
    RoleRepository, ensure_can_delete, ensure_can_mutate, permission_granted,
};

/// 创建角色请求
#[derive(Debug, Clone, Deserialize)]
pub struct CreateRoleCommand {
    pub name: String,
    pub description: Option<String>,
}

/// 更新角色请求
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateRoleCommand {
    pub name: Option<String>,
    pub description: Option<String>,
}

/// RBAC 应用服务
pub struct RbacService {
    roles: Arc<dyn RoleRepository>,
    permissions: Arc<dyn PermissionRepository>,
    menus: Arc<dyn MenuRepository>,
}

impl RbacService {
    pub fn new(
        roles: Arc<dyn RoleRepository>,
        permissions: Arc<dyn PermissionRepository>,
        menus: Arc<dyn MenuRepository>,
    ) -> Self {
        Self {
            roles,
            permissions,
            menus,
        }
    }

    pub async fn list_roles(&self) -> AppResult<Vec<Role>> {
        self.roles.list().await
    }

    pub async fn get_role(&self, id: &RoleId) -> AppResult<Role> {
        self.roles
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Role {}", id)))
    }

    pub async fn create_role(&self, actor: &Identity, cmd: CreateRoleCommand) -> AppResult<Role> {
        let role = Role::new(&cmd.name, cmd.description)?;

        if self.roles.find_by_name(&role.name).await?.is_some() {
            return Err(AppError::conflict(format!("Role '{}' already exists", role.name)));
        }
        self.roles.create(&role).await?;

        info!(role_id = %role.id, name = %role.name, actor = %actor.user_id, "Role created");
        Ok(role)
    }

    pub async fn update_role(
        &self,
        actor: &Identity,
        id: &RoleId,
        cmd: UpdateRoleCommand,
    ) -> AppResult<Role> {
        let mut role = self.get_role(id).await?;
        ensure_can_mutate(&actor.role, &role)?;

        if let Some(name) = cmd.name.as_deref() {
            if let Some(existing) = self.roles.find_by_name(name.trim()).await? {
                if existing.id != role.id {
                    return Err(AppError::conflict(format!("Role '{}' already exists", existing.name)));
                }
            }
        }

        role.update(cmd.name.as_deref(), cmd.description)?;
        self.roles.update(&role).await?;

        info!(role_id = %role.id, actor = %actor.user_id, "Role updated");
        Ok(role)
    }

    pub async fn delete_role(&self, actor: &Identity, id: &RoleId) -> AppResult<()> {
        let role = self.get_role(id).await?;
        ensure_can_delete(&actor.role, &role)?;

        self.roles.soft_delete(id).await?;
        info!(role_id = %id, name = %role.name, actor = %actor.user_id, "Role deleted");
        Ok(())
    }

    pub async fn role_permissions(&self, id: &RoleId) -> AppResult<Vec<Permission>> {
        self.get_role(id).await?;
        self.roles.permissions_of(id).await
    }

    pub async fn role_menus(&self, id: &RoleId) -> AppResult<Vec<Menu>> {
        self.get_role(id).await?;
        self.roles.menus_of(id).await
    }

    /// 整体替换角色权限；所有 ID 必须存在
    pub async fn replace_role_permissions(
        &self,
        actor: &Identity,
        id: &RoleId,
        permission_ids: Vec<PermissionId>,
    ) -> AppResult<Vec<Permission>> {
        let role = self.get_role(id).await?;
        ensure_can_mutate(&actor.role, &role)?;

        let ids = dedup(permission_ids, |p| p.0);
        let found = self.permissions.find_by_ids(&ids).await?;
        if found.len() != ids.len() {
            return Err(AppError::validation("Unknown permission id in request"));
        }

        self.roles.replace_permissions(id, &ids).await?;
        info!(role_id = %id, count = ids.len(), actor = %actor.user_id, "Role permissions replaced");
        self.roles.permissions_of(id).await
    }

    /// 整体替换角色菜单；所有 ID 必须存在
    pub async fn replace_role_menus(
        &self,
        actor: &Identity,
        id: &RoleId,
        menu_ids: Vec<MenuId>,
    ) -> AppResult<Vec<Menu>> {
        let role = self.get_role(id).await?;
        ensure_can_mutate(&actor.role, &role)?;

        let ids = dedup(menu_ids, |m| m.0);
        let found = self.menus.find_by_ids(&ids).await?;
        if found.len() != ids.len() {
            return Err(AppError::validation("Unknown menu id in request"));
        }

        self.roles.replace_menus(id, &ids).await?;
        info!(role_id = %id, count = ids.len(), actor = %actor.user_id, "Role menus replaced");
        self.roles.menus_of(id).await
    }

    pub async fn list_permissions(&self) -> AppResult<Vec<Permission>> {
        self.permissions.list_all().await
    }

    pub async fn menus_for_role_name(&self, name: &str) -> AppResult<Vec<Menu>> {
        self.roles.menus_for_role_name(name).await
    }

    pub async fn permissions_for_role_name(&self, name: &str) -> AppResult<Vec<Permission>> {
        self.roles.permissions_for_role_name(name).await
    }

    /// 检查身份是否拥有 resource + action 权限
    pub async fn has_permission(
        &self,
        identity: &Identity,
        resource: &str,
        action: &str,
    ) -> AppResult<bool> {
        if identity.is_superadmin() {
            return Ok(true);
        }
        let permissions = self.permissions_for_role_name(&identity.role).await?;
        Ok(permission_granted(&identity.role, &permissions, resource, action))
    }
}

/// 去重并保持首次出现的顺序
fn dedup<T, K: Ord>(items: Vec<T>, key: impl Fn(&T) -> K) -> Vec<T> {
    let mut seen = BTreeSet::new();
    items.into_iter().filter(|item| seen.insert(key(item))).collect()
}
