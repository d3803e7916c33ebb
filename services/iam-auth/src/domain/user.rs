//! 用户账号（只读取登录所需字段）

use async_trait::async_trait;
use procura_common::UserId;
use procura_errors::AppResult;

use super::value_objects::{Email, HashedPassword};

/// 用户账号
#[derive(Debug, Clone)]
pub struct UserAccount {
    pub id: UserId,
    pub email: Email,
    pub password_hash: HashedPassword,
    pub role: String,
    pub is_active: bool,
}

/// 凭据存储
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_by_email(&self, email: &Email) -> AppResult<Option<UserAccount>>;

    async fn find_by_id(&self, id: &UserId) -> AppResult<Option<UserAccount>>;

    async fn update_password(&self, id: &UserId, hash: &HashedPassword) -> AppResult<()>;
}
