//! 基础设施资源管理
//!
//! PostgreSQL 为必需组件，Redis 为可选组件

use std::sync::Arc;

use procura_adapter_postgres::{PostgresConfig, check_connection, create_pool};
use procura_adapter_redis::{RedisCache, create_connection_manager};
use procura_auth_core::TokenService;
use procura_config::AppConfig;
use procura_errors::AppResult;
use procura_ports::CachePort;
use procura_telemetry::HealthStatus;
use secrecy::ExposeSecret;
use sqlx::PgPool;
use tracing::info;

use crate::retry::{RetryPolicy, with_retry, with_retry_optional};

/// 基础设施资源容器
pub struct Infrastructure {
    config: AppConfig,
    postgres_pool: PgPool,
    /// Redis 未配置或连接失败时为 None
    cache: Option<Arc<dyn CachePort>>,
    token_service: Arc<TokenService>,
}

impl Infrastructure {
    /// 从配置创建基础设施资源（带重试）
    pub async fn from_config(config: AppConfig) -> AppResult<Self> {
        let policy = RetryPolicy::default();

        let pg_config = PostgresConfig::new(config.database.url.expose_secret())
            .with_max_connections(config.database.max_connections)
            .with_acquire_timeout(config.store.timeout());
        let postgres_pool = with_retry(&policy, "PostgreSQL connection", || {
            let cfg = pg_config.clone();
            async move { create_pool(&cfg).await }
        })
        .await?;

        let cache: Option<Arc<dyn CachePort>> = match &config.redis {
            Some(redis_config) => {
                let url = redis_config.url.expose_secret().clone();
                let timeout = config.store.timeout();
                with_retry_optional(&policy, "Redis connection", || {
                    let url = url.clone();
                    async move { create_connection_manager(&url, timeout).await }
                })
                .await
                .map(|conn| Arc::new(RedisCache::new(conn)) as Arc<dyn CachePort>)
            }
            None => {
                info!("Redis not configured, sessions and throttling disabled");
                None
            }
        };

        let token_service = Arc::new(TokenService::new(
            config.jwt.secret.expose_secret(),
            chrono::Duration::hours(config.auth.token_ttl_hours as i64),
            config.auth.issuer.clone(),
        ));

        Ok(Self {
            config,
            postgres_pool,
            cache,
            token_service,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn postgres_pool(&self) -> PgPool {
        self.postgres_pool.clone()
    }

    /// Redis 缓存（实现 CachePort trait）
    pub fn cache(&self) -> Option<Arc<dyn CachePort>> {
        self.cache.clone()
    }

    /// Redis 键前缀
    pub fn key_prefix(&self) -> String {
        self.config
            .redis
            .as_ref()
            .map(|r| r.key_prefix.clone())
            .unwrap_or_else(|| "procura".to_string())
    }

    pub fn token_service(&self) -> Arc<TokenService> {
        self.token_service.clone()
    }

    /// 运行时健康检查
    pub async fn health(&self) -> HealthStatus {
        let mut status = HealthStatus::new();

        let db = check_connection(&self.postgres_pool).await;
        status.add_check("postgres", db.is_ok(), db.err().map(|e| e.to_string()));

        match &self.cache {
            Some(cache) => {
                let ping = cache.ping().await;
                status.add_optional_check("redis", ping.is_ok(), ping.err().map(|e| e.to_string()));
            }
            None => status.add_optional_check(
                "redis",
                false,
                Some("not configured".to_string()),
            ),
        }

        status
    }
}
