//! 请求处理器

pub mod auth;
pub mod health;
pub mod roles;
pub mod sessions;

use procura_common::SessionId;
use procura_errors::{AppError, AppResult};
use uuid::Uuid;

use crate::domain::rbac::RoleId;

pub(crate) fn parse_role_id(raw: &str) -> AppResult<RoleId> {
    Uuid::parse_str(raw)
        .map(RoleId)
        .map_err(|_| AppError::validation(format!("Invalid role id: {}", raw)))
}

pub(crate) fn parse_session_id(raw: &str) -> AppResult<SessionId> {
    SessionId::from_string(raw).map_err(|_| AppError::validation(format!("Invalid session id: {}", raw)))
}
