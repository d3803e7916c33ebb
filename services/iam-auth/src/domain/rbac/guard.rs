//! 授权规则
//!
//! superadmin 绕过所有角色和权限检查；系统角色的修改受额外保护

use procura_auth_core::{ADMIN_ROLE, SUPERADMIN_ROLE};
use procura_errors::{AppError, AppResult};

use super::permission::Permission;
use super::role::Role;

/// 角色检查：superadmin 或角色在允许列表中
pub fn role_allowed(role: &str, allowed: &[&str]) -> bool {
    role == SUPERADMIN_ROLE || allowed.contains(&role)
}

/// 权限检查：superadmin 或有效权限集中存在精确匹配的 resource + action
pub fn permission_granted(
    role: &str,
    permissions: &[Permission],
    resource: &str,
    action: &str,
) -> bool {
    role == SUPERADMIN_ROLE || permissions.iter().any(|p| p.matches(resource, action))
}

/// 修改角色前的检查
///
/// - superadmin 角色只能由 superadmin 修改
/// - 其他系统角色需要 admin 或 superadmin
pub fn ensure_can_mutate(acting_role: &str, target: &Role) -> AppResult<()> {
    if target.name == SUPERADMIN_ROLE && acting_role != SUPERADMIN_ROLE {
        return Err(AppError::forbidden(
            "only superadmin may modify the superadmin role",
        ));
    }
    if target.is_system && acting_role != ADMIN_ROLE && acting_role != SUPERADMIN_ROLE {
        return Err(AppError::forbidden("system role requires admin"));
    }
    Ok(())
}

/// 删除角色前的检查：在修改检查之外，系统角色一律不可删除
pub fn ensure_can_delete(acting_role: &str, target: &Role) -> AppResult<()> {
    ensure_can_mutate(acting_role, target)?;
    if target.is_system {
        return Err(AppError::failed_precondition("System roles cannot be deleted"));
    }
    Ok(())
}
