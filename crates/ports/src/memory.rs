//! 内存缓存实现
//!
//! 使用 tokio 时钟计算过期，配合 `start_paused` 测试可以推进时间

use std::collections::{BTreeSet, HashMap};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use procura_errors::{AppError, AppResult};
use tokio::time::Instant;

use crate::{CacheCommand, CachePort};

#[derive(Debug, Clone)]
enum Value {
    Str(String),
    Set(BTreeSet<String>),
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| at > now)
    }
}

/// 内存缓存
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, Entry>>,
    failing: AtomicBool,
    latency: Mutex<Option<Duration>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// 模拟后端不可用：之后所有调用返回 BackendUnavailable
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// 模拟慢速后端：每次调用前等待指定时间
    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.lock_latency() = latency;
    }

    /// 当前存活的键数量
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.lock().values().filter(|e| e.is_live(now)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Entry>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_latency(&self) -> std::sync::MutexGuard<'_, Option<Duration>> {
        self.latency.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn before_call(&self) -> AppResult<()> {
        let latency = *self.lock_latency();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(AppError::backend_unavailable("memory cache unavailable"));
        }
        Ok(())
    }

    fn purge_expired(map: &mut HashMap<String, Entry>, key: &str, now: Instant) {
        if map.get(key).is_some_and(|e| !e.is_live(now)) {
            map.remove(key);
        }
    }

    fn apply(map: &mut HashMap<String, Entry>, command: CacheCommand, now: Instant) -> AppResult<()> {
        match command {
            CacheCommand::Set { key, value, ttl } => {
                map.insert(
                    key,
                    Entry {
                        value: Value::Str(value),
                        expires_at: ttl.map(|t| now + t),
                    },
                );
            }
            CacheCommand::Delete { key } => {
                map.remove(&key);
            }
            CacheCommand::SetAdd { key, member } => {
                Self::purge_expired(map, &key, now);
                let entry = map.entry(key).or_insert_with(|| Entry {
                    value: Value::Set(BTreeSet::new()),
                    expires_at: None,
                });
                match &mut entry.value {
                    Value::Set(members) => {
                        members.insert(member);
                    }
                    Value::Str(_) => {
                        return Err(AppError::internal("WRONGTYPE: key holds a string"));
                    }
                }
            }
            CacheCommand::SetRemove { key, member } => {
                Self::purge_expired(map, &key, now);
                let now_empty = match map.get_mut(&key).map(|e| &mut e.value) {
                    Some(Value::Set(members)) => {
                        members.remove(&member);
                        members.is_empty()
                    }
                    Some(Value::Str(_)) => {
                        return Err(AppError::internal("WRONGTYPE: key holds a string"));
                    }
                    None => false,
                };
                if now_empty {
                    map.remove(&key);
                }
            }
            CacheCommand::Expire { key, ttl } => {
                Self::purge_expired(map, &key, now);
                if let Some(entry) = map.get_mut(&key) {
                    entry.expires_at = Some(now + ttl);
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl CachePort for MemoryCache {
    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        self.before_call().await?;
        let now = Instant::now();
        let map = self.lock();
        match map.get(key).filter(|e| e.is_live(now)).map(|e| &e.value) {
            Some(Value::Str(value)) => Ok(Some(value.clone())),
            Some(Value::Set(_)) => Err(AppError::internal("WRONGTYPE: key holds a set")),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> AppResult<()> {
        self.before_call().await?;
        let now = Instant::now();
        Self::apply(&mut self.lock(), CacheCommand::set(key, value, ttl), now)
    }

    async fn replace_keep_ttl(&self, key: &str, value: &str) -> AppResult<bool> {
        self.before_call().await?;
        let now = Instant::now();
        let mut map = self.lock();
        Self::purge_expired(&mut map, key, now);

        match map.get_mut(key) {
            Some(entry) => {
                entry.value = Value::Str(value.to_string());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        self.before_call().await?;
        self.lock().remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> AppResult<bool> {
        self.before_call().await?;
        let now = Instant::now();
        Ok(self.lock().get(key).is_some_and(|e| e.is_live(now)))
    }

    async fn expire(&self, key: &str, ttl: Duration) -> AppResult<()> {
        self.before_call().await?;
        let now = Instant::now();
        Self::apply(&mut self.lock(), CacheCommand::expire(key, ttl), now)
    }

    async fn ttl(&self, key: &str) -> AppResult<Option<Duration>> {
        self.before_call().await?;
        let now = Instant::now();
        let map = self.lock();
        Ok(map
            .get(key)
            .filter(|e| e.is_live(now))
            .and_then(|e| e.expires_at)
            .map(|at| at.saturating_duration_since(now)))
    }

    async fn incr_with_ttl(&self, key: &str, ttl: Duration) -> AppResult<i64> {
        self.before_call().await?;
        let now = Instant::now();
        let mut map = self.lock();
        Self::purge_expired(&mut map, key, now);

        match map.get_mut(key) {
            Some(entry) => {
                let Value::Str(raw) = &entry.value else {
                    return Err(AppError::internal("WRONGTYPE: key holds a set"));
                };
                let count = raw
                    .parse::<i64>()
                    .map_err(|_| AppError::internal("value is not an integer"))?
                    + 1;
                entry.value = Value::Str(count.to_string());
                Ok(count)
            }
            None => {
                map.insert(
                    key.to_string(),
                    Entry {
                        value: Value::Str("1".to_string()),
                        expires_at: Some(now + ttl),
                    },
                );
                Ok(1)
            }
        }
    }

    async fn set_add(&self, key: &str, member: &str) -> AppResult<()> {
        self.before_call().await?;
        let now = Instant::now();
        Self::apply(&mut self.lock(), CacheCommand::set_add(key, member), now)
    }

    async fn set_remove(&self, key: &str, member: &str) -> AppResult<()> {
        self.before_call().await?;
        let now = Instant::now();
        Self::apply(&mut self.lock(), CacheCommand::set_remove(key, member), now)
    }

    async fn set_members(&self, key: &str) -> AppResult<Vec<String>> {
        self.before_call().await?;
        let now = Instant::now();
        let map = self.lock();
        match map.get(key).filter(|e| e.is_live(now)).map(|e| &e.value) {
            Some(Value::Set(members)) => Ok(members.iter().cloned().collect()),
            Some(Value::Str(_)) => Err(AppError::internal("WRONGTYPE: key holds a string")),
            None => Ok(Vec::new()),
        }
    }

    async fn execute_batch(&self, commands: Vec<CacheCommand>) -> AppResult<()> {
        self.before_call().await?;
        let now = Instant::now();
        let mut map = self.lock();

        // 在副本上执行，全部成功后再替换
        let mut staged = map.clone();
        for command in commands {
            Self::apply(&mut staged, command, now)?;
        }
        *map = staged;
        Ok(())
    }

    async fn ping(&self) -> AppResult<()> {
        self.before_call().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_ttl_expiry() {
        let cache = MemoryCache::new();
        cache
            .set("k", "v", Some(Duration::from_secs(10)))
            .await
            .unwrap();

        assert_eq!(cache.get("k").await.unwrap().as_deref(), Some("v"));
        assert_eq!(cache.ttl("k").await.unwrap(), Some(Duration::from_secs(10)));

        tokio::time::advance(Duration::from_secs(11)).await;
        assert_eq!(cache.get("k").await.unwrap(), None);
        assert!(!cache.exists("k").await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_replace_keep_ttl() {
        let cache = MemoryCache::new();
        assert!(!cache.replace_keep_ttl("k", "v").await.unwrap());
        assert!(!cache.exists("k").await.unwrap());

        cache
            .set("k", "v1", Some(Duration::from_secs(10)))
            .await
            .unwrap();
        tokio::time::advance(Duration::from_secs(4)).await;
        assert!(cache.replace_keep_ttl("k", "v2").await.unwrap());

        assert_eq!(cache.get("k").await.unwrap().as_deref(), Some("v2"));
        assert_eq!(cache.ttl("k").await.unwrap(), Some(Duration::from_secs(6)));

        tokio::time::advance(Duration::from_secs(7)).await;
        assert!(!cache.replace_keep_ttl("k", "v3").await.unwrap());
        assert_eq!(cache.get("k").await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_incr_with_ttl_keeps_first_window() {
        let cache = MemoryCache::new();
        let window = Duration::from_secs(60);

        assert_eq!(cache.incr_with_ttl("c", window).await.unwrap(), 1);
        tokio::time::advance(Duration::from_secs(30)).await;
        assert_eq!(cache.incr_with_ttl("c", window).await.unwrap(), 2);
        assert_eq!(cache.ttl("c").await.unwrap(), Some(Duration::from_secs(30)));

        tokio::time::advance(Duration::from_secs(31)).await;
        assert_eq!(cache.incr_with_ttl("c", window).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_batch_is_all_or_nothing() {
        let cache = MemoryCache::new();
        cache.set("plain", "x", None).await.unwrap();

        // 对字符串键执行 SADD 失败，前面的 Set 也不应生效
        let result = cache
            .execute_batch(vec![
                CacheCommand::set("a", "1", None),
                CacheCommand::set_add("plain", "m"),
            ])
            .await;

        assert!(result.is_err());
        assert_eq!(cache.get("a").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_set_members_and_empty_set_removal() {
        let cache = MemoryCache::new();
        cache.set_add("s", "b").await.unwrap();
        cache.set_add("s", "a").await.unwrap();
        assert_eq!(cache.set_members("s").await.unwrap(), vec!["a", "b"]);

        cache.set_remove("s", "a").await.unwrap();
        cache.set_remove("s", "b").await.unwrap();
        assert!(!cache.exists("s").await.unwrap());
    }

    #[tokio::test]
    async fn test_failing_backend() {
        let cache = MemoryCache::new();
        cache.set_failing(true);

        assert!(matches!(
            cache.get("k").await,
            Err(AppError::BackendUnavailable(_))
        ));
        cache.set_failing(false);
        assert!(cache.ping().await.is_ok());
    }
}
