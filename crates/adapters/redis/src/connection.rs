//! Redis 连接管理

use procura_errors::{AppError, AppResult};
use redis::Client;
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use std::time::Duration;
use tracing::info;

/// 创建 Redis 连接管理器
///
/// `response_timeout` 限制单条命令的等待时间，连接断开后自动重连
pub async fn create_connection_manager(
    url: &str,
    response_timeout: Duration,
) -> AppResult<ConnectionManager> {
    let client = Client::open(url)
        .map_err(|e| AppError::internal(format!("Failed to create Redis client: {}", e)))?;

    let config = ConnectionManagerConfig::new()
        .set_response_timeout(response_timeout)
        .set_connection_timeout(response_timeout)
        .set_number_of_retries(2);

    let manager = ConnectionManager::new_with_config(client, config)
        .await
        .map_err(|e| {
            AppError::backend_unavailable(format!(
                "Failed to create Redis connection manager: {}",
                e
            ))
        })?;

    info!("Redis connection manager created");
    Ok(manager)
}

/// 检查 Redis 连接
pub async fn check_connection(conn: &mut ConnectionManager) -> AppResult<()> {
    redis::cmd("PING")
        .query_async::<String>(conn)
        .await
        .map_err(|e| AppError::backend_unavailable(format!("Redis health check failed: {}", e)))?;
    Ok(())
}
