//! 会话存储
//!
//! 会话记录、token 反向索引和用户会话集合三者 TTL 一致；
//! 索引是派生数据，发现悬空索引时就地清理而不是报错

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use procura_common::{SessionId, UserId, with_deadline};
use procura_errors::{AppError, AppResult};
use procura_ports::{CacheCommand, CachePort};
use tracing::{debug, warn};

use super::keys::CacheKeys;
use crate::domain::session::Session;

/// 会话存储
pub struct SessionStore {
    cache: Arc<dyn CachePort>,
    keys: CacheKeys,
    timeout: Duration,
}

impl SessionStore {
    pub fn new(cache: Arc<dyn CachePort>, keys: CacheKeys, timeout: Duration) -> Self {
        Self {
            cache,
            keys,
            timeout,
        }
    }

    /// 创建会话
    ///
    /// TTL = expiresAt - now，必须为正；三个键在同一批次内写入
    pub async fn create(&self, session: &Session) -> AppResult<()> {
        let ttl = (session.expires_at - Utc::now())
            .to_std()
            .ok()
            .filter(|ttl| !ttl.is_zero())
            .ok_or_else(|| AppError::already_expired("session expiresAt is not in the future"))?;

        let session_key = self.keys.session(&session.session_id);
        let user_key = self.keys.user_sessions(&session.user_id);
        let payload = serde_json::to_string(session)
            .map_err(|e| AppError::internal(format!("Failed to serialize session: {}", e)))?;

        // 用户集合的 TTL 只升不降，保持为最长存活的成员
        let current_set_ttl = self
            .call("session.user_ttl", self.cache.ttl(&user_key))
            .await?;
        let set_ttl = current_set_ttl.map_or(ttl, |current| current.max(ttl));

        let commands = vec![
            CacheCommand::set(&session_key, payload, Some(ttl)),
            CacheCommand::set(
                self.keys.session_token(&session.token),
                session.session_id.to_string(),
                Some(ttl),
            ),
            CacheCommand::set_add(&user_key, session.session_id.to_string()),
            CacheCommand::expire(&user_key, set_ttl),
        ];

        self.call("session.create", self.cache.execute_batch(commands))
            .await?;

        debug!(
            session_id = %session.session_id,
            user_id = %session.user_id,
            ttl_secs = ttl.as_secs(),
            "Session created"
        );
        Ok(())
    }

    pub async fn get_by_session_id(&self, session_id: &SessionId) -> AppResult<Session> {
        self.load(session_id)
            .await?
            .ok_or_else(|| AppError::not_found("Session not found"))
    }

    /// 通过 token 反查会话；索引指向的会话已消失时删除该索引
    pub async fn get_by_token(&self, token: &str) -> AppResult<Session> {
        let token_key = self.keys.session_token(token);
        let raw_id = self
            .call("session.get_token", self.cache.get(&token_key))
            .await?
            .ok_or_else(|| AppError::not_found("Session not found"))?;

        let session = match SessionId::from_string(&raw_id) {
            Ok(session_id) => self.load(&session_id).await?,
            Err(_) => None,
        };

        match session {
            Some(session) => Ok(session),
            None => {
                debug!("Removing dangling token index entry");
                self.call("session.heal_token", self.cache.delete(&token_key))
                    .await?;
                Err(AppError::not_found("Session not found"))
            }
        }
    }

    /// 用户的所有会话，按登录时间倒序；无法解析的成员会被移出集合
    pub async fn get_by_user_id(&self, user_id: &UserId) -> AppResult<Vec<Session>> {
        let user_key = self.keys.user_sessions(user_id);
        let members = self
            .call("session.members", self.cache.set_members(&user_key))
            .await?;

        let mut sessions = Vec::with_capacity(members.len());
        for member in members {
            let session = match SessionId::from_string(&member) {
                Ok(session_id) => self.load(&session_id).await?,
                Err(_) => None,
            };

            match session {
                Some(session) => sessions.push(session),
                None => {
                    debug!(member = %member, "Removing dangling session set member");
                    self.call(
                        "session.heal_member",
                        self.cache.set_remove(&user_key, &member),
                    )
                    .await?;
                }
            }
        }

        sessions.sort_by(|a, b| b.login_at.cmp(&a.login_at));
        Ok(sessions)
    }

    /// 更新最后活跃时间，保留原有剩余 TTL
    ///
    /// 写入带 XX 条件：读取之后被删除的会话不会被重新创建
    pub async fn touch(&self, session_id: &SessionId) -> AppResult<()> {
        let mut session = self
            .load(session_id)
            .await?
            .ok_or_else(|| AppError::not_found("Session not found"))?;

        session.update_activity();
        let payload = serde_json::to_string(&session)
            .map_err(|e| AppError::internal(format!("Failed to serialize session: {}", e)))?;

        let written = self
            .call(
                "session.touch",
                self.cache
                    .replace_keep_ttl(&self.keys.session(session_id), &payload),
            )
            .await?;
        if !written {
            return Err(AppError::not_found("Session not found"));
        }
        Ok(())
    }

    /// 删除会话（幂等）
    pub async fn delete(&self, session_id: &SessionId) -> AppResult<()> {
        self.remove(session_id).await.map(|_| ())
    }

    /// 删除用户的所有会话，返回删除数量
    pub async fn delete_by_user_id(&self, user_id: &UserId) -> AppResult<usize> {
        let deleted = self.delete_members(user_id, None).await?;

        let user_key = self.keys.user_sessions(user_id);
        if let Err(e) = self
            .call("session.delete_set", self.cache.delete(&user_key))
            .await
        {
            warn!(user_id = %user_id, error = %e, "Failed to delete user session set");
        }

        Ok(deleted)
    }

    /// 删除用户除当前会话外的所有会话，返回删除数量
    pub async fn delete_except_current(
        &self,
        user_id: &UserId,
        keep: &SessionId,
    ) -> AppResult<usize> {
        self.delete_members(user_id, Some(keep)).await
    }

    /// 逐个删除，单个失败只记录日志，不中断后续删除
    async fn delete_members(&self, user_id: &UserId, keep: Option<&SessionId>) -> AppResult<usize> {
        let user_key = self.keys.user_sessions(user_id);
        let members = self
            .call("session.members", self.cache.set_members(&user_key))
            .await?;

        let mut deleted = 0;
        for member in members {
            let Ok(session_id) = SessionId::from_string(&member) else {
                let _ = self
                    .call("session.heal_member", self.cache.set_remove(&user_key, &member))
                    .await;
                continue;
            };
            if keep == Some(&session_id) {
                continue;
            }

            match self.remove(&session_id).await {
                Ok(true) => deleted += 1,
                Ok(false) => {
                    // 会话已过期，顺手清理集合成员
                    let _ = self
                        .call("session.heal_member", self.cache.set_remove(&user_key, &member))
                        .await;
                }
                Err(e) => {
                    warn!(
                        session_id = %session_id,
                        user_id = %user_id,
                        error = %e,
                        "Failed to delete session, continuing"
                    );
                }
            }
        }

        debug!(user_id = %user_id, deleted, "Bulk session deletion finished");
        Ok(deleted)
    }

    /// 删除会话及其索引，返回会话是否存在
    async fn remove(&self, session_id: &SessionId) -> AppResult<bool> {
        let Some(session) = self.load(session_id).await? else {
            return Ok(false);
        };

        let commands = vec![
            CacheCommand::delete(self.keys.session(session_id)),
            CacheCommand::delete(self.keys.session_token(&session.token)),
            CacheCommand::set_remove(
                self.keys.user_sessions(&session.user_id),
                session_id.to_string(),
            ),
        ];
        self.call("session.delete", self.cache.execute_batch(commands))
            .await?;

        debug!(session_id = %session_id, "Session deleted");
        Ok(true)
    }

    async fn load(&self, session_id: &SessionId) -> AppResult<Option<Session>> {
        let raw = self
            .call("session.get", self.cache.get(&self.keys.session(session_id)))
            .await?;

        raw.map(|raw| {
            serde_json::from_str(&raw)
                .map_err(|e| AppError::internal(format!("Corrupt session record: {}", e)))
        })
        .transpose()
    }

    async fn call<T>(
        &self,
        operation: &str,
        fut: impl Future<Output = AppResult<T>>,
    ) -> AppResult<T> {
        with_deadline(self.timeout, operation, fut).await
    }
}
