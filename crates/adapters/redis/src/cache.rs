//! Redis Cache 实现

use async_trait::async_trait;
use procura_errors::{AppError, AppResult};
use procura_ports::{CacheCommand, CachePort};
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Pipeline, RedisError, Script};
use std::time::Duration;

/// 原子性递增计数器，如果键不存在则创建并设置 TTL（毫秒）
/// 如果键存在，递增并保持原有 TTL
const INCR_WITH_TTL_SCRIPT: &str = r"
local current = redis.call('INCR', KEYS[1])
if current == 1 then
    redis.call('PEXPIRE', KEYS[1], ARGV[1])
end
return current
";

/// Redis Cache
#[derive(Clone)]
pub struct RedisCache {
    conn: ConnectionManager,
}

impl RedisCache {
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }
}

/// Redis 错误映射
///
/// 连接类错误视为后端不可用，超时单独映射，其余为内部错误
pub fn map_redis_error(op: &str, e: RedisError) -> AppError {
    if e.is_timeout() {
        AppError::timeout(format!("Redis {} timed out", op))
    } else if e.is_io_error() || e.is_connection_dropped() || e.is_connection_refusal() {
        AppError::backend_unavailable(format!("Redis {} failed: {}", op, e))
    } else {
        AppError::internal(format!("Redis {} failed: {}", op, e))
    }
}

/// Redis 返回的 PTTL：-2 表示键不存在，-1 表示没有过期时间
fn pttl_to_duration(pttl: i64) -> Option<Duration> {
    if pttl < 0 {
        None
    } else {
        Some(Duration::from_millis(pttl as u64))
    }
}

fn ttl_millis(ttl: Duration) -> u64 {
    // PX 不接受 0
    (ttl.as_millis() as u64).max(1)
}

fn push_command(pipe: &mut Pipeline, command: CacheCommand) {
    match command {
        CacheCommand::Set { key, value, ttl } => match ttl {
            Some(ttl) => {
                pipe.cmd("SET")
                    .arg(key)
                    .arg(value)
                    .arg("PX")
                    .arg(ttl_millis(ttl))
                    .ignore();
            }
            None => {
                pipe.cmd("SET").arg(key).arg(value).ignore();
            }
        },
        CacheCommand::Delete { key } => {
            pipe.cmd("DEL").arg(key).ignore();
        }
        CacheCommand::SetAdd { key, member } => {
            pipe.cmd("SADD").arg(key).arg(member).ignore();
        }
        CacheCommand::SetRemove { key, member } => {
            pipe.cmd("SREM").arg(key).arg(member).ignore();
        }
        CacheCommand::Expire { key, ttl } => {
            pipe.cmd("PEXPIRE").arg(key).arg(ttl_millis(ttl)).ignore();
        }
    }
}

#[async_trait]
impl CachePort for RedisCache {
    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        let mut conn = self.conn.clone();
        conn.get(key).await.map_err(|e| map_redis_error("get", e))
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> AppResult<()> {
        let mut conn = self.conn.clone();
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value);
        if let Some(ttl) = ttl {
            cmd.arg("PX").arg(ttl_millis(ttl));
        }
        cmd.query_async::<()>(&mut conn)
            .await
            .map_err(|e| map_redis_error("set", e))
    }

    async fn replace_keep_ttl(&self, key: &str, value: &str) -> AppResult<bool> {
        let mut conn = self.conn.clone();
        // 键不存在时 XX 使 SET 返回 nil
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("XX")
            .arg("KEEPTTL")
            .query_async(&mut conn)
            .await
            .map_err(|e| map_redis_error("replace", e))?;
        Ok(reply.is_some())
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(key)
            .await
            .map_err(|e| map_redis_error("delete", e))
    }

    async fn exists(&self, key: &str) -> AppResult<bool> {
        let mut conn = self.conn.clone();
        conn.exists(key)
            .await
            .map_err(|e| map_redis_error("exists", e))
    }

    async fn expire(&self, key: &str, ttl: Duration) -> AppResult<()> {
        let mut conn = self.conn.clone();
        redis::cmd("PEXPIRE")
            .arg(key)
            .arg(ttl_millis(ttl))
            .query_async::<()>(&mut conn)
            .await
            .map_err(|e| map_redis_error("expire", e))
    }

    async fn ttl(&self, key: &str) -> AppResult<Option<Duration>> {
        let mut conn = self.conn.clone();
        let pttl: i64 = redis::cmd("PTTL")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| map_redis_error("ttl", e))?;
        Ok(pttl_to_duration(pttl))
    }

    async fn incr_with_ttl(&self, key: &str, ttl: Duration) -> AppResult<i64> {
        let mut conn = self.conn.clone();
        Script::new(INCR_WITH_TTL_SCRIPT)
            .key(key)
            .arg(ttl_millis(ttl))
            .invoke_async(&mut conn)
            .await
            .map_err(|e| map_redis_error("incr_with_ttl", e))
    }

    async fn set_add(&self, key: &str, member: &str) -> AppResult<()> {
        let mut conn = self.conn.clone();
        conn.sadd::<_, _, ()>(key, member)
            .await
            .map_err(|e| map_redis_error("sadd", e))
    }

    async fn set_remove(&self, key: &str, member: &str) -> AppResult<()> {
        let mut conn = self.conn.clone();
        conn.srem::<_, _, ()>(key, member)
            .await
            .map_err(|e| map_redis_error("srem", e))
    }

    async fn set_members(&self, key: &str) -> AppResult<Vec<String>> {
        let mut conn = self.conn.clone();
        conn.smembers(key)
            .await
            .map_err(|e| map_redis_error("smembers", e))
    }

    async fn execute_batch(&self, commands: Vec<CacheCommand>) -> AppResult<()> {
        if commands.is_empty() {
            return Ok(());
        }

        // MULTI/EXEC：事务内命令要么全部执行，要么（连接失败时）全部不执行
        let mut pipe = redis::pipe();
        pipe.atomic();
        for command in commands {
            push_command(&mut pipe, command);
        }

        let mut conn = self.conn.clone();
        pipe.query_async::<()>(&mut conn)
            .await
            .map_err(|e| map_redis_error("batch", e))
    }

    async fn ping(&self) -> AppResult<()> {
        let mut conn = self.conn.clone();
        crate::check_connection(&mut conn).await
    }
}
