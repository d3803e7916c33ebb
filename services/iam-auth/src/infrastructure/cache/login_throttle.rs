//! 登录限流
//!
//! 失败计数器（窗口 TTL）与封禁标记（固定 TTL）分开存放：
//! 封禁期间的继续尝试不会延长封禁

use std::sync::Arc;
use std::time::Duration;

use procura_common::with_deadline;
use procura_config::{AuthConfig, ThrottleFailMode};
use procura_errors::{AppError, AppResult};
use procura_ports::{CacheCommand, CachePort};
use tracing::{info, warn};

use super::keys::CacheKeys;
use crate::domain::throttle::{BlockStatus, FailureOutcome};

/// 限流参数
#[derive(Debug, Clone, Copy)]
pub struct ThrottlePolicy {
    pub limit: u32,
    pub window: Duration,
    pub block: Duration,
    pub fail_mode: ThrottleFailMode,
}

impl ThrottlePolicy {
    pub fn from_config(config: &AuthConfig) -> Self {
        Self {
            limit: config.login_attempt_limit,
            window: Duration::from_secs(config.login_attempt_window_secs),
            block: Duration::from_secs(config.login_block_secs),
            fail_mode: config.throttle_fail_mode,
        }
    }
}

/// 向上取整到秒
pub(crate) fn ceil_secs(duration: Duration) -> u64 {
    duration.as_secs() + u64::from(duration.subsec_nanos() > 0)
}

/// 登录限流器
pub struct LoginThrottle {
    cache: Arc<dyn CachePort>,
    keys: CacheKeys,
    policy: ThrottlePolicy,
    timeout: Duration,
}

impl LoginThrottle {
    pub fn new(
        cache: Arc<dyn CachePort>,
        keys: CacheKeys,
        policy: ThrottlePolicy,
        timeout: Duration,
    ) -> Self {
        Self {
            cache,
            keys,
            policy,
            timeout,
        }
    }

    pub fn policy(&self) -> &ThrottlePolicy {
        &self.policy
    }

    /// 查询封禁状态（无副作用）
    ///
    /// 缓存故障时按策略处理：open 视为未封禁，closed 返回 BackendUnavailable
    pub async fn is_blocked(&self, identifier: &str) -> AppResult<BlockStatus> {
        match self.block_ttl(identifier).await {
            Ok(Some(remaining)) => Ok(BlockStatus {
                blocked: true,
                remaining_secs: ceil_secs(remaining).max(1),
            }),
            Ok(None) => Ok(BlockStatus::CLEAR),
            Err(e) => match self.policy.fail_mode {
                ThrottleFailMode::Open => {
                    warn!(error = %e, "Login throttle unavailable, failing open");
                    Ok(BlockStatus::CLEAR)
                }
                ThrottleFailMode::Closed => {
                    warn!(error = %e, "Login throttle unavailable, failing closed");
                    Err(AppError::backend_unavailable("login throttle unavailable"))
                }
            },
        }
    }

    /// 登记一次失败
    ///
    /// 自增后的计数达到上限时设置封禁标记并清空计数器
    pub async fn register_failure(&self, identifier: &str) -> AppResult<FailureOutcome> {
        // 已在封禁中：不计数，不延长封禁
        if let Some(remaining) = self.block_ttl(identifier).await? {
            return Ok(FailureOutcome {
                blocked_now: false,
                retry_after: ceil_secs(remaining).max(1),
                remaining_attempts: 0,
            });
        }

        let fail_key = self.keys.login_failures(identifier);
        let count = with_deadline(
            self.timeout,
            "throttle.incr",
            self.cache.incr_with_ttl(&fail_key, self.policy.window),
        )
        .await?;
        let count = u32::try_from(count.max(0)).unwrap_or(u32::MAX);

        if count >= self.policy.limit {
            let commands = vec![
                CacheCommand::set(
                    self.keys.login_block(identifier),
                    "1",
                    Some(self.policy.block),
                ),
                CacheCommand::delete(&fail_key),
            ];
            with_deadline(
                self.timeout,
                "throttle.block",
                self.cache.execute_batch(commands),
            )
            .await?;

            metrics::counter!("login_throttle_blocks_total").increment(1);
            info!(
                identifier = %identifier,
                block_secs = self.policy.block.as_secs(),
                "Login blocked after repeated failures"
            );
            return Ok(FailureOutcome {
                blocked_now: true,
                retry_after: self.policy.block.as_secs(),
                remaining_attempts: 0,
            });
        }

        let window_left = with_deadline(self.timeout, "throttle.ttl", self.cache.ttl(&fail_key))
            .await?
            .unwrap_or(self.policy.window);

        Ok(FailureOutcome {
            blocked_now: false,
            retry_after: ceil_secs(window_left),
            remaining_attempts: self.policy.limit - count,
        })
    }

    /// 清除计数器和封禁标记
    pub async fn reset(&self, identifier: &str) -> AppResult<()> {
        let commands = vec![
            CacheCommand::delete(self.keys.login_failures(identifier)),
            CacheCommand::delete(self.keys.login_block(identifier)),
        ];
        with_deadline(
            self.timeout,
            "throttle.reset",
            self.cache.execute_batch(commands),
        )
        .await
    }

    /// 当前失败次数
    pub async fn failure_count(&self, identifier: &str) -> AppResult<u32> {
        let raw = with_deadline(
            self.timeout,
            "throttle.count",
            self.cache.get(&self.keys.login_failures(identifier)),
        )
        .await?;

        Ok(raw.and_then(|v| v.parse().ok()).unwrap_or(0))
    }

    async fn block_ttl(&self, identifier: &str) -> AppResult<Option<Duration>> {
        with_deadline(
            self.timeout,
            "throttle.block_ttl",
            self.cache.ttl(&self.keys.login_block(identifier)),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use procura_ports::MemoryCache;

    const ID: &str = "10.0.0.1:buyer@procura.io";

    fn throttle_with(fail_mode: ThrottleFailMode) -> (LoginThrottle, Arc<MemoryCache>) {
        let cache = Arc::new(MemoryCache::new());
        let policy = ThrottlePolicy {
            limit: 5,
            window: Duration::from_secs(60),
            block: Duration::from_secs(300),
            fail_mode,
        };
        let throttle = LoginThrottle::new(
            cache.clone(),
            CacheKeys::new("procura"),
            policy,
            Duration::from_secs(2),
        );
        (throttle, cache)
    }

    fn throttle() -> (LoginThrottle, Arc<MemoryCache>) {
        throttle_with(ThrottleFailMode::Open)
    }

    #[tokio::test(start_paused = true)]
    async fn test_fifth_failure_blocks() {
        let (throttle, _) = throttle();

        for attempt in 1..=4 {
            let outcome = throttle.register_failure(ID).await.unwrap();
            assert!(!outcome.blocked_now);
            assert_eq!(outcome.remaining_attempts, 5 - attempt);
            assert!(!throttle.is_blocked(ID).await.unwrap().blocked);
        }

        let outcome = throttle.register_failure(ID).await.unwrap();
        assert!(outcome.blocked_now);
        assert_eq!(outcome.retry_after, 300);

        let status = throttle.is_blocked(ID).await.unwrap();
        assert!(status.blocked);
        assert!(status.remaining_secs <= 300 && status.remaining_secs > 0);
        // 封禁后计数器被清空
        assert_eq!(throttle.failure_count(ID).await.unwrap(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_block_expires_after_block_duration() {
        let (throttle, _) = throttle();
        for _ in 0..5 {
            throttle.register_failure(ID).await.unwrap();
        }

        tokio::time::advance(Duration::from_secs(299)).await;
        assert!(throttle.is_blocked(ID).await.unwrap().blocked);

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(throttle.is_blocked(ID).await.unwrap(), BlockStatus::CLEAR);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_during_block_do_not_extend_it() {
        let (throttle, _) = throttle();
        for _ in 0..5 {
            throttle.register_failure(ID).await.unwrap();
        }

        tokio::time::advance(Duration::from_secs(200)).await;
        for _ in 0..10 {
            let outcome = throttle.register_failure(ID).await.unwrap();
            assert!(!outcome.blocked_now);
            assert_eq!(outcome.retry_after, 100);
        }

        tokio::time::advance(Duration::from_secs(101)).await;
        assert!(!throttle.is_blocked(ID).await.unwrap().blocked);
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_expiry_resets_counter() {
        let (throttle, _) = throttle();
        for _ in 0..4 {
            throttle.register_failure(ID).await.unwrap();
        }

        tokio::time::advance(Duration::from_secs(61)).await;
        assert_eq!(throttle.failure_count(ID).await.unwrap(), 0);

        let outcome = throttle.register_failure(ID).await.unwrap();
        assert!(!outcome.blocked_now);
        assert_eq!(outcome.remaining_attempts, 4);
        assert_eq!(outcome.retry_after, 60);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_from_any_state() {
        let (throttle, _) = throttle();

        // 计数中
        throttle.register_failure(ID).await.unwrap();
        throttle.reset(ID).await.unwrap();
        assert_eq!(throttle.failure_count(ID).await.unwrap(), 0);

        // 封禁中
        for _ in 0..5 {
            throttle.register_failure(ID).await.unwrap();
        }
        throttle.reset(ID).await.unwrap();
        assert!(!throttle.is_blocked(ID).await.unwrap().blocked);

        // 空状态
        throttle.reset(ID).await.unwrap();
        assert_eq!(throttle.is_blocked(ID).await.unwrap(), BlockStatus::CLEAR);
    }

    #[tokio::test(start_paused = true)]
    async fn test_identifiers_are_independent() {
        let (throttle, _) = throttle();
        for _ in 0..5 {
            throttle.register_failure(ID).await.unwrap();
        }

        assert!(!throttle.is_blocked("10.0.0.2:buyer@procura.io").await.unwrap().blocked);
    }

    #[tokio::test]
    async fn test_fail_open() {
        let (throttle, cache) = throttle();
        cache.set_failing(true);

        assert_eq!(throttle.is_blocked(ID).await.unwrap(), BlockStatus::CLEAR);
    }

    #[tokio::test]
    async fn test_fail_closed() {
        let (throttle, cache) = throttle_with(ThrottleFailMode::Closed);
        cache.set_failing(true);

        assert!(matches!(
            throttle.is_blocked(ID).await,
            Err(AppError::BackendUnavailable(_))
        ));
    }

    #[test]
    fn test_ceil_secs() {
        assert_eq!(ceil_secs(Duration::from_millis(1500)), 2);
        assert_eq!(ceil_secs(Duration::from_secs(3)), 3);
        assert_eq!(ceil_secs(Duration::ZERO), 0);
    }
}
