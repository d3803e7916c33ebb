//! 请求级身份上下文

use procura_auth_core::{Claims, SUPERADMIN_ROLE};
use procura_common::{SessionId, UserId};
use procura_errors::AppResult;

/// 已认证的调用方
///
/// 由认证中间件在校验令牌和吊销状态后构建，handler 只读取此结构
#[derive(Debug, Clone, PartialEq)]
pub struct Identity {
    pub user_id: UserId,
    pub role: String,
    pub jti: String,
    /// 原始 bearer token（用于吊销和会话反查）
    pub token: String,
    /// 会话存储可用且找到对应会话时填充
    pub session_id: Option<SessionId>,
}

impl Identity {
    pub fn from_claims(claims: &Claims, token: impl Into<String>) -> AppResult<Self> {
        Ok(Self {
            user_id: claims.user_id()?,
            role: claims.role.clone(),
            jti: claims.jti.clone(),
            token: token.into(),
            session_id: None,
        })
    }

    pub fn is_superadmin(&self) -> bool {
        self.role == SUPERADMIN_ROLE
    }
}
