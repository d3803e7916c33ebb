//! 角色实体

use chrono::{DateTime, Utc};
use procura_errors::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 角色 ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoleId(pub Uuid);

impl RoleId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RoleId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RoleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 角色实体
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Role {
    pub id: RoleId,
    pub name: String,
    pub description: Option<String>,
    pub is_system: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Role {
    pub fn new(name: &str, description: Option<String>) -> AppResult<Self> {
        let name = validate_role_name(name)?;
        let now = Utc::now();
        Ok(Self {
            id: RoleId::new(),
            name,
            description,
            is_system: false,
            created_at: now,
            updated_at: now,
        })
    }

    /// 创建系统角色
    pub fn system(name: &str, description: Option<String>) -> AppResult<Self> {
        let mut role = Self::new(name, description)?;
        role.is_system = true;
        Ok(role)
    }

    /// 重命名/修改描述；系统角色不允许改名
    pub fn update(&mut self, name: Option<&str>, description: Option<String>) -> AppResult<()> {
        if let Some(name) = name {
            let name = validate_role_name(name)?;
            if self.is_system && name != self.name {
                return Err(AppError::failed_precondition("System roles cannot be renamed"));
            }
            self.name = name;
        }
        if description.is_some() {
            self.description = description;
        }
        self.updated_at = Utc::now();
        Ok(())
    }
}

/// 角色名：1-64 个字符，小写字母、数字、`_` 或 `-`
fn validate_role_name(name: &str) -> AppResult<String> {
    let name = name.trim();
    if name.is_empty() || name.len() > 64 {
        return Err(AppError::validation("Role name must be 1-64 characters"));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
    {
        return Err(AppError::validation(
            "Role name may only contain lowercase letters, digits, '_' and '-'",
        ));
    }
    Ok(name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_role() {
        let role = Role::new(" buyer ", Some("Procurement buyer".to_string())).unwrap();
        assert_eq!(role.name, "buyer");
        assert!(!role.is_system);
    }

    #[test]
    fn test_invalid_names() {
        assert!(Role::new("", None).is_err());
        assert!(Role::new("Buyer", None).is_err());
        assert!(Role::new("buyer role", None).is_err());
        assert!(Role::new(&"a".repeat(65), None).is_err());
    }

    #[test]
    fn test_system_role_cannot_be_renamed() {
        let mut role = Role::system("admin", None).unwrap();

        let err = role.update(Some("root"), None).unwrap_err();
        assert!(matches!(err, AppError::FailedPrecondition(_)));

        role.update(Some("admin"), Some("Administrators".to_string()))
            .unwrap();
        assert_eq!(role.description.as_deref(), Some("Administrators"));
    }
}
