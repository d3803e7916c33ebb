//! HTTP 中间件

mod auth;
mod guard;
mod rate_limit;

pub use auth::{CurrentIdentity, auth_middleware};
pub use guard::{PermissionGuard, RoleGuard, permission_guard, role_guard};
pub use rate_limit::{EndpointClass, rate_limit_middleware};
