//! 固定窗口限流器

use std::sync::Arc;
use std::time::Duration;

use procura_common::with_deadline;
use procura_config::RateLimitRule;
use procura_errors::AppResult;
use procura_ports::CachePort;

use super::keys::CacheKeys;
use super::login_throttle::ceil_secs;

/// 限流检查结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    /// 当前窗口内的请求数（含本次）
    pub count: u64,
    pub limit: u64,
    /// 拒绝时为窗口剩余秒数
    pub retry_after: Option<u64>,
}

/// 按 `{prefix}:rl:{class}:{client}` 计数的固定窗口限流器
pub struct RateLimiter {
    cache: Arc<dyn CachePort>,
    keys: CacheKeys,
    timeout: Duration,
}

impl RateLimiter {
    pub fn new(cache: Arc<dyn CachePort>, keys: CacheKeys, timeout: Duration) -> Self {
        Self {
            cache,
            keys,
            timeout,
        }
    }

    pub async fn check(
        &self,
        class: &str,
        client: &str,
        rule: RateLimitRule,
    ) -> AppResult<RateLimitDecision> {
        let key = self.keys.rate_limit(class, client);
        let window = Duration::from_secs(rule.window_secs.max(1));

        let count = with_deadline(
            self.timeout,
            "rate_limit.incr",
            self.cache.incr_with_ttl(&key, window),
        )
        .await?;
        let count = count.max(0) as u64;

        if count <= rule.max_requests {
            return Ok(RateLimitDecision {
                allowed: true,
                count,
                limit: rule.max_requests,
                retry_after: None,
            });
        }

        let remaining = with_deadline(self.timeout, "rate_limit.ttl", self.cache.ttl(&key))
            .await?
            .unwrap_or(window);

        Ok(RateLimitDecision {
            allowed: false,
            count,
            limit: rule.max_requests,
            retry_after: Some(ceil_secs(remaining).max(1)),
        })
    }
}
