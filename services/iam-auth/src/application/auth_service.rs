//! 认证应用服务
//!
//! 编排令牌、吊销账本、会话存储和登录限流。会话存储和限流器依赖缓存，
//! 缓存未配置时为 None：登录、登出和鉴权照常工作，会话管理接口返回 503

use std::sync::Arc;

use chrono::Utc;
use procura_auth_core::TokenService;
use procura_common::{SessionId, UserId};
use procura_errors::{AppError, AppResult};
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::identity::Identity;
use crate::domain::revocation::RevocationLedger;
use crate::domain::session::Session;
use crate::domain::throttle::throttle_identifier;
use crate::domain::user::{CredentialStore, UserAccount};
use crate::domain::value_objects::{Email, HashedPassword};
use crate::infrastructure::cache::{LoginThrottle, SessionStore};

const INVALID_CREDENTIALS: &str = "invalid credentials";

/// 登录请求
#[derive(Debug, Clone)]
pub struct LoginCommand {
    pub email: String,
    pub password: String,
    pub ip: String,
    pub user_agent: String,
}

/// 登录结果
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResult {
    pub token: String,
    pub token_type: &'static str,
    pub expires_in: u64,
    /// 会话存储不可用时为 None
    pub session_id: Option<SessionId>,
}

/// 会话列表项
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub session_id: SessionId,
    pub device_info: String,
    pub ip: String,
    pub login_at: chrono::DateTime<Utc>,
    pub last_activity: chrono::DateTime<Utc>,
    pub is_current_session: bool,
}

impl SessionView {
    fn from_session(session: Session, current_token: &str) -> Self {
        Self {
            is_current_session: session.token == current_token,
            session_id: session.session_id,
            device_info: session.device_info,
            ip: session.ip,
            login_at: session.login_at,
            last_activity: session.last_activity,
        }
    }
}

/// 认证应用服务
pub struct AuthService {
    tokens: Arc<TokenService>,
    ledger: Arc<dyn RevocationLedger>,
    credentials: Arc<dyn CredentialStore>,
    sessions: Option<Arc<SessionStore>>,
    throttle: Option<Arc<LoginThrottle>>,
}

impl AuthService {
    pub fn new(
        tokens: Arc<TokenService>,
        ledger: Arc<dyn RevocationLedger>,
        credentials: Arc<dyn CredentialStore>,
    ) -> Self {
        Self {
            tokens,
            ledger,
            credentials,
            sessions: None,
            throttle: None,
        }
    }

    pub fn with_sessions(mut self, sessions: Arc<SessionStore>) -> Self {
        self.sessions = Some(sessions);
        self
    }

    pub fn with_throttle(mut self, throttle: Arc<LoginThrottle>) -> Self {
        self.throttle = Some(throttle);
        self
    }

    pub fn sessions_enabled(&self) -> bool {
        self.sessions.is_some()
    }

    /// 校验 bearer token 并构建请求身份
    ///
    /// 签名/过期/结构校验之后检查吊销账本；会话存储可用时顺带刷新会话活跃时间
    pub async fn authenticate(&self, token: &str) -> AppResult<Identity> {
        let claims = self.tokens.verify(token)?;

        if self.ledger.is_revoked(token).await? {
            return Err(AppError::Revoked);
        }

        let mut identity = Identity::from_claims(&claims, token)?;

        if let Some(sessions) = &self.sessions {
            match sessions.get_by_token(token).await {
                Ok(session) => {
                    if let Err(e) = sessions.touch(&session.session_id).await {
                        debug!(error = %e, session_id = %session.session_id, "Session touch failed");
                    }
                    identity.session_id = Some(session.session_id);
                }
                Err(AppError::NotFound(_)) => {}
                Err(e) => warn!(error = %e, "Session lookup failed during authentication"),
            }
        }

        Ok(identity)
    }

    /// 登录
    pub async fn login(&self, cmd: LoginCommand) -> AppResult<LoginResult> {
        let identifier = throttle_identifier(&cmd.ip, &cmd.email);

        if let Some(throttle) = &self.throttle {
            let status = throttle.is_blocked(&identifier).await?;
            if status.blocked {
                metrics::counter!("auth_login_total", "outcome" => "blocked").increment(1);
                return Err(AppError::too_many_attempts(status.remaining_secs));
            }
        }

        let account = match self.check_credentials(&cmd.email, &cmd.password).await? {
            Some(account) => account,
            None => return Err(self.register_failure(&identifier).await),
        };

        if let Some(throttle) = &self.throttle {
            if let Err(e) = throttle.reset(&identifier).await {
                warn!(error = %e, "Failed to reset login throttle");
            }
        }

        let jti = Uuid::now_v7().to_string();
        let token = self.tokens.issue(&account.id, &account.role, &jti)?;
        let ttl_secs = self.tokens.ttl_secs();
        let expires_in = u64::try_from(ttl_secs).unwrap_or(0);
        let expires_at = Utc::now() + chrono::Duration::seconds(ttl_secs);

        let session_id = match &self.sessions {
            Some(sessions) => {
                let session = Session::new(
                    account.id.clone(),
                    account.email.as_str(),
                    account.role.as_str(),
                    token.as_str(),
                    expires_at,
                )
                .with_ip(cmd.ip.as_str())
                .with_user_agent(cmd.user_agent.as_str());

                match sessions.create(&session).await {
                    Ok(()) => Some(session.session_id),
                    Err(e) => {
                        warn!(error = %e, user_id = %account.id, "Failed to create session");
                        None
                    }
                }
            }
            None => None,
        };

        metrics::counter!("auth_login_total", "outcome" => "success").increment(1);
        info!(user_id = %account.id, role = %account.role, ip = %cmd.ip, "User logged in");

        Ok(LoginResult {
            token,
            token_type: "Bearer",
            expires_in,
            session_id,
        })
    }

    /// 登出：删除会话（尽力而为）并吊销令牌
    pub async fn logout(&self, identity: &Identity) -> AppResult<()> {
        if let Some(sessions) = &self.sessions {
            let session_id = match &identity.session_id {
                Some(id) => Some(id.clone()),
                None => sessions
                    .get_by_token(&identity.token)
                    .await
                    .ok()
                    .map(|s| s.session_id),
            };
            if let Some(session_id) = session_id {
                if let Err(e) = sessions.delete(&session_id).await {
                    warn!(error = %e, session_id = %session_id, "Failed to delete session on logout");
                }
            }
        }

        self.ledger.store(&identity.token).await?;
        info!(user_id = %identity.user_id, "User logged out");
        Ok(())
    }

    /// 从所有设备登出，返回删除的会话数
    pub async fn logout_all(&self, identity: &Identity) -> AppResult<usize> {
        self.ledger.store(&identity.token).await?;
        let deleted = self.revoke_all_sessions(&identity.user_id).await?;

        info!(user_id = %identity.user_id, deleted, "User logged out from all devices");
        Ok(deleted)
    }

    /// 列出当前用户的会话
    pub async fn list_sessions(&self, identity: &Identity) -> AppResult<Vec<SessionView>> {
        let sessions = self.require_sessions()?;
        let list = sessions.get_by_user_id(&identity.user_id).await?;

        Ok(list
            .into_iter()
            .map(|s| SessionView::from_session(s, &identity.token))
            .collect())
    }

    /// 吊销单个会话，只能吊销自己的会话
    pub async fn revoke_session(&self, identity: &Identity, session_id: &SessionId) -> AppResult<()> {
        let sessions = self.require_sessions()?;
        let session = sessions.get_by_session_id(session_id).await?;

        if session.user_id != identity.user_id {
            warn!(
                user_id = %identity.user_id,
                session_id = %session_id,
                "Attempt to revoke a session owned by another user"
            );
            return Err(AppError::forbidden("session belongs to another user"));
        }

        self.ledger.store(&session.token).await?;
        sessions.delete(session_id).await?;

        info!(user_id = %identity.user_id, session_id = %session_id, "Session revoked");
        Ok(())
    }

    /// 吊销除当前会话以外的所有会话，返回删除数量
    pub async fn revoke_other_sessions(&self, identity: &Identity) -> AppResult<usize> {
        let sessions = self.require_sessions()?;
        // 当前令牌没有对应会话时，用一个不存在的 ID 作为保留项
        let keep = identity
            .session_id
            .clone()
            .unwrap_or_else(|| SessionId::from_uuid(Uuid::nil()));

        for session in sessions.get_by_user_id(&identity.user_id).await? {
            if session.session_id != keep && session.token != identity.token {
                self.ledger.store(&session.token).await?;
            }
        }

        let deleted = sessions
            .delete_except_current(&identity.user_id, &keep)
            .await?;

        info!(user_id = %identity.user_id, deleted, "Other sessions revoked");
        Ok(deleted)
    }

    /// 修改密码，成功后所有会话失效，需要重新登录
    pub async fn change_password(
        &self,
        identity: &Identity,
        old_password: &str,
        new_password: &str,
    ) -> AppResult<()> {
        let account = self
            .credentials
            .find_by_id(&identity.user_id)
            .await?
            .filter(|a| a.is_active)
            .ok_or_else(|| AppError::unauthorized(INVALID_CREDENTIALS))?;

        if !account.password_hash.verify(old_password)? {
            metrics::counter!("auth_rejections_total", "reason" => "wrong_password").increment(1);
            return Err(AppError::unauthorized(INVALID_CREDENTIALS));
        }
        if old_password == new_password {
            return Err(AppError::validation(
                "New password must differ from the current password",
            ));
        }

        let hash = HashedPassword::from_plain(new_password)?;
        self.ledger.store(&identity.token).await?;
        self.credentials.update_password(&account.id, &hash).await?;
        self.revoke_all_sessions(&account.id).await?;

        info!(user_id = %account.id, "Password changed, all sessions revoked");
        Ok(())
    }

    /// 查找并校验凭据；任何不匹配都返回 None，不区分原因
    async fn check_credentials(&self, email: &str, password: &str) -> AppResult<Option<UserAccount>> {
        let Ok(email) = Email::parse(email) else {
            return Ok(None);
        };

        let Some(account) = self.credentials.find_by_email(&email).await? else {
            debug!(email = %email, "Login for unknown email");
            return Ok(None);
        };

        if !account.is_active {
            debug!(user_id = %account.id, "Login for inactive account");
            return Ok(None);
        }

        if !account.password_hash.verify(password)? {
            return Ok(None);
        }

        Ok(Some(account))
    }

    /// 登记失败并返回应答错误：触发封禁的那次返回 429，其余返回 401
    async fn register_failure(&self, identifier: &str) -> AppError {
        metrics::counter!("auth_login_total", "outcome" => "failure").increment(1);

        let Some(throttle) = &self.throttle else {
            return AppError::unauthorized(INVALID_CREDENTIALS);
        };

        match throttle.register_failure(identifier).await {
            Ok(outcome) if outcome.blocked_now => AppError::too_many_attempts(outcome.retry_after),
            Ok(outcome) => {
                debug!(remaining_attempts = outcome.remaining_attempts, "Login failure registered");
                AppError::unauthorized(INVALID_CREDENTIALS)
            }
            Err(e) => {
                warn!(error = %e, "Failed to register login failure");
                AppError::unauthorized(INVALID_CREDENTIALS)
            }
        }
    }

    /// 吊销用户所有会话令牌并删除会话
    ///
    /// 缓存故障只记录日志；账本写入失败照常返回错误
    async fn revoke_all_sessions(&self, user_id: &UserId) -> AppResult<usize> {
        let Some(sessions) = &self.sessions else {
            return Ok(0);
        };

        let list = match sessions.get_by_user_id(user_id).await {
            Ok(list) => list,
            Err(e) => {
                warn!(error = %e, user_id = %user_id, "Failed to enumerate sessions for revocation");
                return Ok(0);
            }
        };
        for session in &list {
            self.ledger.store(&session.token).await?;
        }

        match sessions.delete_by_user_id(user_id).await {
            Ok(deleted) => Ok(deleted),
            Err(e) => {
                warn!(error = %e, user_id = %user_id, "Failed to delete user sessions");
                Ok(0)
            }
        }
    }

    fn require_sessions(&self) -> AppResult<&SessionStore> {
        self.sessions
            .as_deref()
            .ok_or_else(|| AppError::backend_unavailable("session store is not configured"))
    }
}
