//! IAM 认证服务
//!
//! 令牌签发与校验、吊销账本、会话管理、登录限流和 RBAC

pub mod api;
pub mod application;
pub mod domain;
pub mod infrastructure;

#[cfg(test)]
pub(crate) mod test_support;

use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusHandle;
use procura_bootstrap::Infrastructure;

use crate::api::http::{AppState, TrustedProxies};
use crate::application::{AuthService, RbacService};
use crate::infrastructure::cache::{CacheKeys, LoginThrottle, RateLimiter, SessionStore, ThrottlePolicy};
use crate::infrastructure::persistence::{
    PostgresCredentialStore, PostgresMenuRepository, PostgresPermissionRepository,
    PostgresRevocationLedger, PostgresRoleRepository,
};

/// 按基础设施装配服务和路由状态
///
/// 缓存不可用时会话、登录限流和接口限流关闭，其余功能不受影响
pub fn build_state(infra: Arc<Infrastructure>, metrics: Option<PrometheusHandle>) -> AppState {
    let config = infra.config();
    let timeout = config.store.timeout();
    let pool = infra.postgres_pool();
    let rate_limit = config.rate_limit.clone();
    let trusted_proxies = TrustedProxies::new(config.server.trusted_proxies.iter().copied());

    let ledger = Arc::new(PostgresRevocationLedger::new(pool.clone(), timeout));
    let credentials = Arc::new(PostgresCredentialStore::new(pool.clone(), timeout));
    let mut auth = AuthService::new(infra.token_service(), ledger, credentials);

    let rate_limiter = match infra.cache() {
        Some(cache) => {
            let keys = CacheKeys::new(infra.key_prefix());
            let sessions = Arc::new(SessionStore::new(cache.clone(), keys.clone(), timeout));
            let throttle = Arc::new(LoginThrottle::new(
                cache.clone(),
                keys.clone(),
                ThrottlePolicy::from_config(&config.auth),
                timeout,
            ));
            auth = auth.with_sessions(sessions).with_throttle(throttle);
            Some(Arc::new(RateLimiter::new(cache, keys, timeout)))
        }
        None => None,
    };

    let roles = Arc::new(PostgresRoleRepository::new(pool.clone(), timeout));
    let permissions = Arc::new(PostgresPermissionRepository::new(pool.clone(), timeout));
    let menus = Arc::new(PostgresMenuRepository::new(pool, timeout));
    let rbac = RbacService::new(roles, permissions, menus);

    AppState {
        auth: Arc::new(auth),
        rbac: Arc::new(rbac),
        rate_limiter,
        rate_limit,
        trusted_proxies,
        health: infra,
        metrics,
    }
}
