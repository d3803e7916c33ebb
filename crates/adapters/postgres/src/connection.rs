//! PostgreSQL 连接管理

use procura_errors::{AppError, AppResult};
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::info;

/// PostgreSQL 连接池配置
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout: Duration,
    pub idle_timeout: Duration,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: 10,
            min_connections: 1,
            acquire_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(600),
        }
    }
}

impl PostgresConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn with_max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// 获取连接的等待上限，应不超过存储调用超时
    pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }
}

/// 创建 PostgreSQL 连接池
pub async fn create_pool(config: &PostgresConfig) -> AppResult<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(config.acquire_timeout)
        .idle_timeout(config.idle_timeout)
        .connect(&config.url)
        .await
        .map_err(|e| AppError::backend_unavailable(format!("Failed to create pool: {}", e)))?;

    info!(
        max_connections = config.max_connections,
        "PostgreSQL pool created"
    );
    Ok(pool)
}

/// 检查数据库连接
pub async fn check_connection(pool: &PgPool) -> AppResult<()> {
    sqlx::query("SELECT 1")
        .execute(pool)
        .await
        .map_err(|e| AppError::backend_unavailable(format!("Database health check failed: {}", e)))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = PostgresConfig::new("postgres://localhost/procura")
            .with_max_connections(50)
            .with_acquire_timeout(Duration::from_secs(2));

        assert_eq!(config.url, "postgres://localhost/procura");
        assert_eq!(config.max_connections, 50);
        assert_eq!(config.min_connections, 1);
        assert_eq!(config.acquire_timeout, Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_create_pool_unreachable_host() {
        let config = PostgresConfig::new("postgres://nobody@127.0.0.1:1/procura")
            .with_acquire_timeout(Duration::from_millis(200));

        let result = create_pool(&config).await;
        assert!(matches!(result, Err(AppError::BackendUnavailable(_))));
    }
}
