//! 应用层

mod auth_service;
mod rbac_service;

pub use auth_service::{AuthService, LoginCommand, LoginResult, SessionView};
pub use rbac_service::{CreateRoleCommand, RbacService, UpdateRoleCommand};
