//! 路由共享状态

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::FromRef;
use metrics_exporter_prometheus::PrometheusHandle;
use procura_bootstrap::Infrastructure;
use procura_config::RateLimitConfig;
use procura_telemetry::HealthStatus;

use super::TrustedProxies;
use crate::application::{AuthService, RbacService};
use crate::infrastructure::cache::RateLimiter;

/// 依赖健康检查
#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn check(&self) -> HealthStatus;
}

#[async_trait]
impl HealthProbe for Infrastructure {
    async fn check(&self) -> HealthStatus {
        self.health().await
    }
}

#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthService>,
    pub rbac: Arc<RbacService>,
    /// 缓存未配置时为 None（不限流）
    pub rate_limiter: Option<Arc<RateLimiter>>,
    pub rate_limit: RateLimitConfig,
    pub trusted_proxies: TrustedProxies,
    pub health: Arc<dyn HealthProbe>,
    pub metrics: Option<PrometheusHandle>,
}

impl FromRef<AppState> for TrustedProxies {
    fn from_ref(state: &AppState) -> Self {
        state.trusted_proxies.clone()
    }
}
