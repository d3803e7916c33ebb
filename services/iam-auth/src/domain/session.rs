//! 会话实体
//!
//! 一个会话对应一次登录的设备/浏览器实例

use chrono::{DateTime, Utc};
use procura_common::{SessionId, UserId};
use serde::{Deserialize, Serialize};

/// 设备分类规则：按顺序匹配 User-Agent 子串，第一个命中的生效
///
/// 平板标记排在手机和桌面之前（iPad UA 同时包含 "Mac OS X"）
const DEVICE_RULES: &[(&str, &str)] = &[
    ("iPad", "iPad"),
    ("Tablet", "Tablet"),
    ("iPhone", "iPhone"),
    ("Android", "Android Device"),
    ("Mobile", "Mobile Device"),
    ("Windows", "Windows PC"),
    ("Macintosh", "Mac"),
    ("Mac OS X", "Mac"),
    ("CrOS", "Chromebook"),
    ("Linux", "Linux PC"),
];

const UNKNOWN_DEVICE: &str = "Unknown Device";

/// 从 User-Agent 推导设备描述，仅用于展示
pub fn classify_device(user_agent: &str) -> &'static str {
    DEVICE_RULES
        .iter()
        .find(|(marker, _)| user_agent.contains(marker))
        .map(|(_, label)| *label)
        .unwrap_or(UNKNOWN_DEVICE)
}

/// 会话实体
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub session_id: SessionId,
    pub user_id: UserId,
    pub email: String,
    /// 登录时的角色快照
    pub role: String,
    pub token: String,
    pub device_info: String,
    pub ip: String,
    pub user_agent: String,
    pub login_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn new(
        user_id: UserId,
        email: impl Into<String>,
        role: impl Into<String>,
        token: impl Into<String>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        let now = Utc::now();
        Self {
            session_id: SessionId::new(),
            user_id,
            email: email.into(),
            role: role.into(),
            token: token.into(),
            device_info: UNKNOWN_DEVICE.to_string(),
            ip: String::new(),
            user_agent: String::new(),
            login_at: now,
            last_activity: now,
            expires_at,
        }
    }

    pub fn with_ip(mut self, ip: impl Into<String>) -> Self {
        self.ip = ip.into();
        self
    }

    /// 设置 User-Agent，同时推导设备描述
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self.device_info = classify_device(&self.user_agent).to_string();
        self
    }

    pub fn with_login_at(mut self, login_at: DateTime<Utc>) -> Self {
        self.login_at = login_at;
        self.last_activity = login_at;
        self
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }

    pub fn update_activity(&mut self) {
        self.last_activity = Utc::now();
    }
}
