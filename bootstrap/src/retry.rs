//! 启动期连接重试
//!
//! 数据库和 Redis 可能晚于服务就绪，启动时按指数退避重试

use std::future::Future;
use std::time::Duration;

use tracing::{info, warn};

/// 重试策略
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// 最多尝试次数（含第一次），至少为 1
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay,
            max_delay,
        }
    }

    /// 第 n 次失败后的等待时间（翻倍，封顶）
    fn backoff(&self, failed_attempts: u32) -> Duration {
        let factor = 2u32.saturating_pow(failed_attempts.saturating_sub(1));
        self.initial_delay
            .saturating_mul(factor)
            .min(self.max_delay)
    }
}

/// 按策略重试，返回第一次成功的结果或最后一次的错误
pub async fn with_retry<F, Fut, T, E>(
    policy: &RetryPolicy,
    operation_name: &str,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt = 1;
    loop {
        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    info!(operation = operation_name, attempt, "Operation succeeded after retry");
                }
                return Ok(value);
            }
            Err(e) if attempt >= policy.max_attempts => {
                warn!(
                    operation = operation_name,
                    attempt,
                    error = %e,
                    "Operation failed, no more retries"
                );
                return Err(e);
            }
            Err(e) => {
                let delay = policy.backoff(attempt);
                warn!(
                    operation = operation_name,
                    attempt,
                    max_attempts = policy.max_attempts,
                    error = %e,
                    delay_ms = delay.as_millis() as u64,
                    "Operation failed, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

/// 可选组件版本：全部失败时返回 None，服务继续启动
pub async fn with_retry_optional<F, Fut, T, E>(
    policy: &RetryPolicy,
    operation_name: &str,
    operation: F,
) -> Option<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    match with_retry(policy, operation_name, operation).await {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(
                operation = operation_name,
                error = %e,
                "Optional component unavailable, continuing without it"
            );
            None
        }
    }
}
