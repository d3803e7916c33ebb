//! 邮箱值对象

use procura_common::normalize_email;
use procura_errors::{AppError, AppResult};
use serde::{Deserialize, Serialize};

/// 规范化后的邮箱（去除首尾空白，小写）
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Email(String);

impl Email {
    pub fn parse(raw: &str) -> AppResult<Self> {
        let email = normalize_email(raw);

        let Some((local, domain)) = email.split_once('@') else {
            return Err(AppError::validation("Invalid email format"));
        };
        if local.is_empty() || !domain.contains('.') || domain.starts_with('.') {
            return Err(AppError::validation("Invalid email format"));
        }
        if email.len() > 255 {
            return Err(AppError::validation("Email too long"));
        }

        Ok(Self(email))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Email {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
