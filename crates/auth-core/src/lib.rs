//! procura-auth-core - 认证核心库
//!
//! 签发和校验 bearer token；无状态，可任意并发调用

use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use procura_common::UserId;
use procura_errors::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 保留角色：绕过所有角色和权限检查
pub const SUPERADMIN_ROLE: &str = "superadmin";

/// 系统管理员角色：可管理除 superadmin 以外的系统角色
pub const ADMIN_ROLE: &str = "admin";

/// JWT Claims
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    /// 登录时的角色快照
    pub role: String,
    /// JWT ID
    pub jti: String,
    /// Issued at
    pub iat: i64,
    /// Expiration time
    pub exp: i64,
    /// Issuer
    pub iss: String,
}

impl Claims {
    pub fn user_id(&self) -> AppResult<UserId> {
        Uuid::parse_str(&self.sub)
            .map(UserId::from_uuid)
            .map_err(|_| AppError::malformed("Invalid user ID in token"))
    }

    pub fn is_superadmin(&self) -> bool {
        self.role == SUPERADMIN_ROLE
    }

    /// 剩余有效期（秒），已过期时为 0
    pub fn remaining_secs(&self) -> i64 {
        (self.exp - Utc::now().timestamp()).max(0)
    }
}

/// Token 服务
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
    issuer: String,
}

impl TokenService {
    pub fn new(secret: &str, ttl: Duration, issuer: impl Into<String>) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
            issuer: issuer.into(),
        }
    }

    /// 签发令牌
    ///
    /// 过期时间 = 签发时间 + 配置的 TTL
    pub fn issue(&self, user_id: &UserId, role: &str, token_id: &str) -> AppResult<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            role: role.to_string(),
            jti: token_id.to_string(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
            iss: self.issuer.clone(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AppError::internal(format!("Failed to generate token: {}", e)))
    }

    /// 校验令牌
    ///
    /// 签名错误、过期、格式错误分别返回不同的错误类型
    pub fn verify(&self, token: &str) -> AppResult<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.issuer]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);
        validation.validate_exp = true;
        validation.validate_nbf = false;
        validation.leeway = 0; // 不允许时间偏差

        let token_data =
            decode::<Claims>(token, &self.decoding_key, &validation).map_err(|e| {
                match e.kind() {
                    ErrorKind::ExpiredSignature => AppError::Expired,
                    ErrorKind::InvalidSignature => AppError::InvalidSignature,
                    _ => AppError::malformed(e.to_string()),
                }
            })?;

        let claims = token_data.claims;

        if claims.jti.is_empty() {
            return Err(AppError::malformed("Token ID (jti) missing"));
        }
        if claims.role.is_empty() {
            return Err(AppError::malformed("Token role missing"));
        }
        claims.user_id()?;

        Ok(claims)
    }

    /// 令牌有效期（秒）
    pub fn ttl_secs(&self) -> i64 {
        self.ttl.num_seconds()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;

    const SECRET: &str = "test_secret_that_is_long_enough_0123";

    fn service() -> TokenService {
        TokenService::new(SECRET, Duration::hours(24), "procura-iam")
    }

    #[test]
    fn test_issue_and_verify() {
        let svc = service();
        let user_id = UserId::new();
        let token = svc.issue(&user_id, "admin", "jti-1").unwrap();

        let claims = svc.verify(&token).unwrap();
        assert_eq!(claims.user_id().unwrap(), user_id);
        assert_eq!(claims.role, "admin");
        assert_eq!(claims.jti, "jti-1");
        assert_eq!(claims.exp - claims.iat, 24 * 3600);
        assert!(!claims.is_superadmin());
    }

    #[test]
    fn test_expired_token() {
        let svc = TokenService::new(SECRET, Duration::seconds(-60), "procura-iam");
        let token = svc.issue(&UserId::new(), "staff", "jti-2").unwrap();

        assert!(matches!(svc.verify(&token), Err(AppError::Expired)));
    }

    #[test]
    fn test_wrong_secret_is_invalid_signature() {
        let other = TokenService::new("another_secret_that_is_long_enough", Duration::hours(1), "procura-iam");
        let token = other.issue(&UserId::new(), "staff", "jti-3").unwrap();

        assert!(matches!(service().verify(&token), Err(AppError::InvalidSignature)));
    }

    #[test]
    fn test_garbage_is_malformed() {
        assert!(matches!(service().verify("invalid_token"), Err(AppError::Malformed(_))));
        assert!(matches!(service().verify(""), Err(AppError::Malformed(_))));
    }

    #[test]
    fn test_wrong_issuer_is_malformed() {
        let other = TokenService::new(SECRET, Duration::hours(1), "someone-else");
        let token = other.issue(&UserId::new(), "staff", "jti-4").unwrap();

        assert!(matches!(service().verify(&token), Err(AppError::Malformed(_))));
    }

    #[test]
    fn test_empty_jti_is_malformed() {
        let svc = service();
        let token = svc.issue(&UserId::new(), "staff", "").unwrap();

        assert!(matches!(svc.verify(&token), Err(AppError::Malformed(_))));
    }

    #[test]
    fn test_non_uuid_subject_is_malformed() {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: "not-a-uuid".to_string(),
            role: "staff".to_string(),
            jti: "jti-5".to_string(),
            iat: now,
            exp: now + 3600,
            iss: "procura-iam".to_string(),
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();

        assert!(matches!(service().verify(&token), Err(AppError::Malformed(_))));
    }

    #[test]
    fn test_tampered_payload_is_invalid_signature() {
        let svc = service();
        let token = svc.issue(&UserId::new(), "staff", "jti-6").unwrap();
        let parts: Vec<&str> = token.split('.').collect();

        // 提权为 superadmin 但保留原签名
        let payload = String::from_utf8(URL_SAFE_NO_PAD.decode(parts[1]).unwrap()).unwrap();
        let forged_payload = payload.replace("\"role\":\"staff\"", "\"role\":\"superadmin\"");
        assert_ne!(payload, forged_payload);
        let forged = format!(
            "{}.{}.{}",
            parts[0],
            URL_SAFE_NO_PAD.encode(forged_payload.as_bytes()),
            parts[2]
        );

        assert!(matches!(svc.verify(&forged), Err(AppError::InvalidSignature)));
    }
}
