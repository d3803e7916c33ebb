//! procura-config - 配置加载库
//!
//! 加载顺序: `{dir}/default.toml` -> `{dir}/{APP_ENV}.toml` -> `PROCURA_*` 环境变量
//! （嵌套字段使用 `__` 分隔，例如 `PROCURA_AUTH__LOGIN_ATTEMPT_LIMIT=10`）

use std::net::IpAddr;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load config: {0}")]
    Load(#[from] figment::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// 数据库配置
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: Secret<String>,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    // 开发环境: 10, 生产环境: 50
    match std::env::var("APP_ENV").as_deref() {
        Ok("production") => 50,
        _ => 10,
    }
}

/// Redis 配置
///
/// 未配置时会话存储、登录限流和接口限流全部关闭，服务照常启动
#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    pub url: Secret<String>,
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
}

fn default_key_prefix() -> String {
    "procura".to_string()
}

/// JWT 配置
#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: Secret<String>,
}

/// 登录限流在缓存故障时的行为
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThrottleFailMode {
    /// 视为未封禁（可用性优先）
    #[default]
    Open,
    /// 拒绝登录（安全优先）
    Closed,
}

/// 认证配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub token_ttl_hours: u64,
    pub login_attempt_limit: u32,
    pub login_attempt_window_secs: u64,
    pub login_block_secs: u64,
    pub throttle_fail_mode: ThrottleFailMode,
    pub issuer: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_ttl_hours: 24,
            login_attempt_limit: 5,
            login_attempt_window_secs: 60,
            login_block_secs: 300,
            throttle_fail_mode: ThrottleFailMode::Open,
            issuer: "procura-iam".to_string(),
        }
    }
}

impl AuthConfig {
    pub fn token_ttl(&self) -> Duration {
        Duration::from_secs(self.token_ttl_hours * 3600)
    }
}

/// 单个限流规则
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RateLimitRule {
    pub max_requests: u64,
    pub window_secs: u64,
}

impl Default for RateLimitRule {
    fn default() -> Self {
        Self::new(60, 60)
    }
}

impl RateLimitRule {
    pub const fn new(max_requests: u64, window_secs: u64) -> Self {
        Self {
            max_requests,
            window_secs,
        }
    }
}

/// 按接口类别的限流阈值
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub auth: RateLimitRule,
    pub query: RateLimitRule,
    pub write: RateLimitRule,
    pub admin: RateLimitRule,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            auth: RateLimitRule::new(20, 60),
            query: RateLimitRule::new(300, 60),
            write: RateLimitRule::new(120, 60),
            admin: RateLimitRule::new(60, 60),
        }
    }
}

/// 存储调用配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { timeout_ms: 2000 }
    }
}

impl StoreConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// 服务器配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub request_timeout_secs: u64,
    pub metrics_enabled: bool,
    /// 受信任的反向代理，只有来自这些地址的请求才读取转发头；默认不信任任何代理
    pub trusted_proxies: Vec<IpAddr>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            request_timeout_secs: 10,
            metrics_enabled: false,
            trusted_proxies: Vec::new(),
        }
    }
}

/// 遥测配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub log_level: String,
    pub json: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json: false,
        }
    }
}

/// 应用配置
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_app_name")]
    pub app_name: String,
    #[serde(default = "default_app_env")]
    pub app_env: String,
    pub database: DatabaseConfig,
    pub redis: Option<RedisConfig>,
    pub jwt: JwtConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

fn default_app_name() -> String {
    "procura-iam".to_string()
}

fn default_app_env() -> String {
    "development".to_string()
}

impl AppConfig {
    /// 从配置文件和环境变量加载配置
    pub fn load(config_dir: &str) -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config: Self = Figment::new()
            .merge(Toml::file(format!("{}/default.toml", config_dir)))
            .merge(Toml::file(format!("{}/{}.toml", config_dir, env)))
            .merge(Env::prefixed("PROCURA_").split("__"))
            .extract()?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.jwt.secret.expose_secret().len() < 32 {
            return Err(ConfigError::Invalid(
                "jwt.secret must be at least 32 characters".to_string(),
            ));
        }
        if self.auth.login_attempt_limit == 0 {
            return Err(ConfigError::Invalid(
                "auth.login_attempt_limit must be greater than 0".to_string(),
            ));
        }
        if self.auth.token_ttl_hours == 0 {
            return Err(ConfigError::Invalid(
                "auth.token_ttl_hours must be greater than 0".to_string(),
            ));
        }
        // 存储调用超时必须短于请求超时
        if self.store.timeout_ms >= self.server.request_timeout_secs * 1000 {
            return Err(ConfigError::Invalid(
                "store.timeout_ms must be shorter than server.request_timeout_secs".to_string(),
            ));
        }
        Ok(())
    }

    /// 是否为生产环境
    pub fn is_production(&self) -> bool {
        self.app_env == "production"
    }

    /// 是否启用缓存
    pub fn cache_enabled(&self) -> bool {
        self.redis.is_some()
    }
}
