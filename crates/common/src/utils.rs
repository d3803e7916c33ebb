//! 通用工具函数

use uuid::Uuid;

/// 生成新的 UUID v7（时间有序）
pub fn new_id() -> Uuid {
    Uuid::now_v7()
}

/// 规范化邮箱：去除首尾空白并转为小写
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
