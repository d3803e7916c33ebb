//! 存储调用超时控制
//!
//! 所有缓存和数据库调用都必须带有有限的截止时间，
//! 超时返回 `AppError::Timeout`，与 NotFound/Unauthorized 区分

use std::future::Future;
use std::time::Duration;

use procura_errors::{AppError, AppResult};
use tracing::warn;

/// 默认存储调用超时
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(2);

/// 在截止时间内执行存储操作
pub async fn with_deadline<F, T>(timeout: Duration, operation: &str, fut: F) -> AppResult<T>
where
    F: Future<Output = AppResult<T>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => {
            warn!(
                operation,
                timeout_ms = timeout.as_millis() as u64,
                "Store call exceeded deadline"
            );
            Err(AppError::timeout(format!(
                "{} exceeded {}ms",
                operation,
                timeout.as_millis()
            )))
        }
    }
}
