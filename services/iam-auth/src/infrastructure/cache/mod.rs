//! 缓存层实现（基于 CachePort）

mod keys;
mod login_throttle;
mod rate_limiter;
mod session_store;

pub use keys::CacheKeys;
pub use login_throttle::{LoginThrottle, ThrottlePolicy};
pub use rate_limiter::{RateLimitDecision, RateLimiter};
pub use session_store::SessionStore;
