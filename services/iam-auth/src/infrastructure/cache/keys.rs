//! 缓存键布局

use procura_common::{SessionId, UserId};

use crate::domain::revocation::token_digest;

/// 统一前缀下的缓存键
#[derive(Debug, Clone)]
pub struct CacheKeys {
    prefix: String,
}

impl CacheKeys {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// `{prefix}:session:{sessionId}` -> 会话 JSON
    pub fn session(&self, session_id: &SessionId) -> String {
        format!("{}:session:{}", self.prefix, session_id)
    }

    /// `{prefix}:session:token:{sha256(token)}` -> sessionId
    pub fn session_token(&self, token: &str) -> String {
        format!("{}:session:token:{}", self.prefix, token_digest(token))
    }

    /// `{prefix}:session:user:{userId}` -> sessionId 集合
    pub fn user_sessions(&self, user_id: &UserId) -> String {
        format!("{}:session:user:{}", self.prefix, user_id)
    }

    pub fn login_failures(&self, identifier: &str) -> String {
        format!("{}:login:fail:{}", self.prefix, identifier)
    }

    pub fn login_block(&self, identifier: &str) -> String {
        format!("{}:login:block:{}", self.prefix, identifier)
    }

    pub fn rate_limit(&self, class: &str, client: &str) -> String {
        format!("{}:rl:{}:{}", self.prefix, class, client)
    }
}
