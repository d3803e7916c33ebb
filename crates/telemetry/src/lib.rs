//! telemetry - 可观测性库

use serde::Serialize;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// 初始化 tracing
pub fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// 初始化 JSON 格式的 tracing（生产环境）
pub fn init_tracing_json(log_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().json())
        .init();
}

/// 按配置选择日志格式
pub fn init(log_level: &str, json: bool) {
    if json {
        init_tracing_json(log_level);
    } else {
        init_tracing(log_level);
    }
}

/// 初始化 Prometheus metrics
pub fn init_metrics() -> Result<metrics_exporter_prometheus::PrometheusHandle, String> {
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {}", e))
}

/// 健康检查状态
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    pub healthy: bool,
    pub checks: Vec<HealthCheck>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthCheck {
    pub name: String,
    pub healthy: bool,
    /// 可选依赖故障时服务降级运行，不影响整体健康
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl HealthStatus {
    pub fn new() -> Self {
        Self {
            healthy: true,
            checks: Vec::new(),
        }
    }

    pub fn add_check(&mut self, name: impl Into<String>, healthy: bool, message: Option<String>) {
        self.push(name.into(), healthy, true, message);
    }

    /// 添加可选依赖检查（失败只记录，不标记为不健康）
    pub fn add_optional_check(
        &mut self,
        name: impl Into<String>,
        healthy: bool,
        message: Option<String>,
    ) {
        self.push(name.into(), healthy, false, message);
    }

    fn push(&mut self, name: String, healthy: bool, required: bool, message: Option<String>) {
        if required && !healthy {
            self.healthy = false;
        }
        self.checks.push(HealthCheck {
            name,
            healthy,
            required,
            message,
        });
    }
}

impl Default for HealthStatus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_failure_marks_unhealthy() {
        let mut status = HealthStatus::new();
        status.add_check("postgres", false, Some("connection refused".to_string()));
        assert!(!status.healthy);
    }

    #[test]
    fn test_optional_failure_keeps_healthy() {
        let mut status = HealthStatus::new();
        status.add_check("postgres", true, None);
        status.add_optional_check("redis", false, Some("not configured".to_string()));

        assert!(status.healthy);
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["checks"][1]["name"], "redis");
        assert_eq!(json["checks"][1]["required"], false);
        assert!(json["checks"][0].get("message").is_none());
    }
}
