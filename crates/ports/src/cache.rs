//! Cache trait 定义

use async_trait::async_trait;
use procura_errors::AppResult;
use std::time::Duration;

/// 批量写入中的单条命令
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheCommand {
    Set {
        key: String,
        value: String,
        ttl: Option<Duration>,
    },
    Delete {
        key: String,
    },
    SetAdd {
        key: String,
        member: String,
    },
    SetRemove {
        key: String,
        member: String,
    },
    Expire {
        key: String,
        ttl: Duration,
    },
}

impl CacheCommand {
    pub fn set(key: impl Into<String>, value: impl Into<String>, ttl: Option<Duration>) -> Self {
        Self::Set {
            key: key.into(),
            value: value.into(),
            ttl,
        }
    }

    pub fn delete(key: impl Into<String>) -> Self {
        Self::Delete { key: key.into() }
    }

    pub fn set_add(key: impl Into<String>, member: impl Into<String>) -> Self {
        Self::SetAdd {
            key: key.into(),
            member: member.into(),
        }
    }

    pub fn set_remove(key: impl Into<String>, member: impl Into<String>) -> Self {
        Self::SetRemove {
            key: key.into(),
            member: member.into(),
        }
    }

    pub fn expire(key: impl Into<String>, ttl: Duration) -> Self {
        Self::Expire {
            key: key.into(),
            ttl,
        }
    }
}

/// 缓存 trait
///
/// 键值条目和集合条目共用一个键空间，过期后视为不存在
#[async_trait]
pub trait CachePort: Send + Sync {
    /// 获取缓存值
    async fn get(&self, key: &str) -> AppResult<Option<String>>;

    /// 设置缓存值
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> AppResult<()>;

    /// 仅当键存在时覆盖值并保留剩余存活时间（`SET XX KEEPTTL`）
    ///
    /// 返回是否写入；键不存在时不会创建
    async fn replace_keep_ttl(&self, key: &str, value: &str) -> AppResult<bool>;

    /// 删除缓存
    async fn delete(&self, key: &str) -> AppResult<()>;

    /// 检查是否存在
    async fn exists(&self, key: &str) -> AppResult<bool>;

    /// 设置过期时间，键不存在时无操作
    async fn expire(&self, key: &str, ttl: Duration) -> AppResult<()>;

    /// 剩余存活时间，键不存在或没有过期时间时返回 None
    async fn ttl(&self, key: &str) -> AppResult<Option<Duration>>;

    /// 自增计数器
    ///
    /// 仅在计数器新建时设置过期时间（固定窗口），返回自增后的值
    async fn incr_with_ttl(&self, key: &str, ttl: Duration) -> AppResult<i64>;

    /// 向集合添加成员
    async fn set_add(&self, key: &str, member: &str) -> AppResult<()>;

    /// 从集合移除成员
    async fn set_remove(&self, key: &str, member: &str) -> AppResult<()>;

    /// 获取集合所有成员
    async fn set_members(&self, key: &str) -> AppResult<Vec<String>>;

    /// 原子执行一批写命令：要么全部生效，要么全部不生效
    async fn execute_batch(&self, commands: Vec<CacheCommand>) -> AppResult<()>;

    /// 连通性检查
    async fn ping(&self) -> AppResult<()>;
}
