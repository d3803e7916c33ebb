//! 吊销账本

use async_trait::async_trait;
use procura_errors::AppResult;
use sha2::{Digest, Sha256};

/// 令牌摘要（SHA-256 十六进制）
///
/// 账本表和会话反向索引的键只使用摘要；会话记录本身保留原始令牌，
/// 吊销会话时据此写入账本
pub fn token_digest(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// 已吊销令牌的持久化记录，只追加不删除
#[async_trait]
pub trait RevocationLedger: Send + Sync {
    /// 记录吊销；重复吊销同一令牌不是错误
    async fn store(&self, token: &str) -> AppResult<()>;

    async fn is_revoked(&self, token: &str) -> AppResult<bool>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_is_stable_hex() {
        let digest = token_digest("abc");
        assert_eq!(
            digest,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_ne!(token_digest("abd"), digest);
    }
}
