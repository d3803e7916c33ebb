//! procura-errors - 统一错误处理
//!
//! 基于 RFC 7807 Problem Details 规范

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 应用错误类型
#[derive(Debug, Error)]
pub enum AppError {
    // ---- 认证失败（401） ----
    #[error("Malformed token: {0}")]
    Malformed(String),

    #[error("Token expired")]
    Expired,

    #[error("Invalid token signature")]
    InvalidSignature,

    #[error("Token revoked")]
    Revoked,

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    // ---- 授权失败（403） ----
    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Too many attempts, retry in {retry_after} seconds")]
    TooManyAttempts { retry_after: u64 },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already expired: {0}")]
    AlreadyExpired(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Failed precondition: {0}")]
    FailedPrecondition(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::Malformed(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn too_many_attempts(retry_after: u64) -> Self {
        Self::TooManyAttempts { retry_after }
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn already_expired(msg: impl Into<String>) -> Self {
        Self::AlreadyExpired(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn failed_precondition(msg: impl Into<String>) -> Self {
        Self::FailedPrecondition(msg.into())
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    pub fn backend_unavailable(msg: impl Into<String>) -> Self {
        Self::BackendUnavailable(msg.into())
    }

    pub fn database(msg: impl Into<String>) -> Self {
        Self::Database(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// 是否为认证失败（调用方需要重新登录）
    pub fn is_authentication_failure(&self) -> bool {
        matches!(
            self,
            Self::Malformed(_)
                | Self::Expired
                | Self::InvalidSignature
                | Self::Revoked
                | Self::Unauthorized(_)
        )
    }

    /// 限流错误的重试等待时间（秒）
    pub fn retry_after(&self) -> Option<u64> {
        match self {
            Self::TooManyAttempts { retry_after } => Some(*retry_after),
            _ => None,
        }
    }

    /// 转换为 HTTP 状态码
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Malformed(_)
            | Self::Expired
            | Self::InvalidSignature
            | Self::Revoked
            | Self::Unauthorized(_) => 401,
            Self::Forbidden(_) => 403,
            Self::TooManyAttempts { .. } => 429,
            Self::NotFound(_) => 404,
            Self::AlreadyExpired(_) => 422,
            Self::Validation(_) => 400,
            Self::Conflict(_) => 409,
            Self::FailedPrecondition(_) => 412,
            Self::Timeout(_) => 504,
            Self::BackendUnavailable(_) => 503,
            Self::Database(_) | Self::Internal(_) => 500,
        }
    }

    /// 对外暴露的错误描述
    ///
    /// 403 不透露缺失的具体权限，5xx 不透露内部细节
    pub fn public_detail(&self) -> String {
        match self {
            Self::Forbidden(_) => "access denied".to_string(),
            Self::Database(_) | Self::Internal(_) => "internal server error".to_string(),
            Self::Timeout(_) => "upstream store timed out".to_string(),
            Self::BackendUnavailable(_) => "service temporarily unavailable".to_string(),
            _ => self.to_string(),
        }
    }

    /// 转换为 Problem Details
    pub fn to_problem_details(&self) -> ProblemDetails {
        ProblemDetails {
            r#type: format!("https://api.procura.io/problems/{}", self.problem_slug()),
            title: self.problem_title().to_string(),
            status: self.status_code(),
            detail: self.public_detail(),
            instance: None,
        }
    }

    fn problem_slug(&self) -> &'static str {
        match self {
            Self::Malformed(_) => "malformed-token",
            Self::Expired => "token-expired",
            Self::InvalidSignature => "invalid-signature",
            Self::Revoked => "token-revoked",
            Self::Unauthorized(_) => "unauthorized",
            Self::Forbidden(_) => "forbidden",
            Self::TooManyAttempts { .. } => "too-many-attempts",
            Self::NotFound(_) => "not-found",
            Self::AlreadyExpired(_) => "already-expired",
            Self::Validation(_) => "validation",
            Self::Conflict(_) => "conflict",
            Self::FailedPrecondition(_) => "failed-precondition",
            Self::Timeout(_) => "timeout",
            Self::BackendUnavailable(_) => "backend-unavailable",
            Self::Database(_) => "database",
            Self::Internal(_) => "internal",
        }
    }

    fn problem_title(&self) -> &'static str {
        match self {
            Self::Malformed(_)
            | Self::Expired
            | Self::InvalidSignature
            | Self::Revoked
            | Self::Unauthorized(_) => "Unauthorized",
            Self::Forbidden(_) => "Forbidden",
            Self::TooManyAttempts { .. } => "Too Many Requests",
            Self::NotFound(_) => "Resource Not Found",
            Self::AlreadyExpired(_) => "Already Expired",
            Self::Validation(_) => "Validation Error",
            Self::Conflict(_) => "Conflict",
            Self::FailedPrecondition(_) => "Failed Precondition",
            Self::Timeout(_) => "Gateway Timeout",
            Self::BackendUnavailable(_) => "Service Unavailable",
            Self::Database(_) => "Database Error",
            Self::Internal(_) => "Internal Server Error",
        }
    }
}

/// RFC 7807 Problem Details
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProblemDetails {
    pub r#type: String,
    pub title: String,
    pub status: u16,
    pub detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance: Option<String>,
}

/// Result 类型别名
pub type AppResult<T> = Result<T, AppError>;
