//! 权限实体

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 权限 ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PermissionId(pub Uuid);

/// 权限：资源 + 动作
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    pub id: PermissionId,
    pub resource: String,
    pub action: String,
    pub description: Option<String>,
}

impl Permission {
    pub fn new(resource: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            id: PermissionId(Uuid::now_v7()),
            resource: resource.into(),
            action: action.into(),
            description: None,
        }
    }

    /// 精确匹配，不支持通配符
    pub fn matches(&self, resource: &str, action: &str) -> bool {
        self.resource == resource && self.action == action
    }

    /// 权限代码，例如 `vendor:approve`
    pub fn code(&self) -> String {
        format!("{}:{}", self.resource, self.action)
    }
}
