//! 角色与权限守卫
//!
//! 挂在具体路由上（`route_layer`），依赖认证中间件已注入的 `Identity`

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use procura_errors::AppError;
use tracing::debug;

use crate::api::http::ApiError;
use crate::application::RbacService;
use crate::domain::identity::Identity;
use crate::domain::rbac::role_allowed;

fn identity_of(request: &Request) -> Result<&Identity, ApiError> {
    request
        .extensions()
        .get::<Identity>()
        .ok_or_else(|| AppError::unauthorized("authentication required").into())
}

/// 允许的角色列表；superadmin 总是放行
#[derive(Debug, Clone, Copy)]
pub struct RoleGuard {
    allowed: &'static [&'static str],
}

impl RoleGuard {
    pub const fn new(allowed: &'static [&'static str]) -> Self {
        Self { allowed }
    }
}

pub async fn role_guard(
    State(guard): State<RoleGuard>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let identity = identity_of(&request)?;

    if !role_allowed(&identity.role, guard.allowed) {
        return Err(AppError::forbidden(format!(
            "role '{}' not in {:?}",
            identity.role, guard.allowed
        ))
        .into());
    }

    Ok(next.run(request).await)
}

/// 需要的 resource + action；superadmin 总是放行
#[derive(Clone)]
pub struct PermissionGuard {
    rbac: Arc<RbacService>,
    resource: &'static str,
    action: &'static str,
}

impl PermissionGuard {
    pub fn new(rbac: Arc<RbacService>, resource: &'static str, action: &'static str) -> Self {
        Self {
            rbac,
            resource,
            action,
        }
    }
}

pub async fn permission_guard(
    State(guard): State<PermissionGuard>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let identity = identity_of(&request)?;

    if !guard
        .rbac
        .has_permission(identity, guard.resource, guard.action)
        .await?
    {
        return Err(AppError::forbidden(format!(
            "role '{}' lacks {}:{}",
            identity.role, guard.resource, guard.action
        ))
        .into());
    }

    debug!(role = %identity.role, resource = guard.resource, action = guard.action, "Permission granted");
    Ok(next.run(request).await)
}
