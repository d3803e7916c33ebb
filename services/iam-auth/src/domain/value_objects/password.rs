//! 密码值对象

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use procura_errors::{AppError, AppResult};

/// argon2 PHC 格式的密码哈希
#[derive(Clone)]
pub struct HashedPassword(String);

impl std::fmt::Debug for HashedPassword {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("HashedPassword(***)")
    }
}

impl HashedPassword {
    /// 从明文密码创建哈希密码（先校验强度）
    pub fn from_plain(password: &str) -> AppResult<Self> {
        validate_password_strength(password)?;

        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AppError::internal(format!("Failed to hash password: {}", e)))?;

        Ok(Self(hash.to_string()))
    }

    pub fn from_hash(hash: impl Into<String>) -> Self {
        Self(hash.into())
    }

    /// 校验明文密码；哈希本身损坏时返回内部错误
    pub fn verify(&self, password: &str) -> AppResult<bool> {
        let parsed = PasswordHash::new(&self.0)
            .map_err(|e| AppError::internal(format!("Invalid password hash: {}", e)))?;

        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// 密码强度：8-128 个字符，包含大写、小写和数字
pub fn validate_password_strength(password: &str) -> AppResult<()> {
    let length = password.chars().count();
    if length < 8 {
        return Err(AppError::validation("Password must be at least 8 characters"));
    }
    if length > 128 {
        return Err(AppError::validation("Password must be at most 128 characters"));
    }

    let has_uppercase = password.chars().any(|c| c.is_uppercase());
    let has_lowercase = password.chars().any(|c| c.is_lowercase());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());

    if !has_uppercase || !has_lowercase || !has_digit {
        return Err(AppError::validation(
            "Password must contain uppercase, lowercase, and digit",
        ));
    }

    Ok(())
}
