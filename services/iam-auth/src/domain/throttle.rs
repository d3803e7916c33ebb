//! 登录限流状态

use procura_common::normalize_email;

/// 限流标识：`ip:规范化邮箱`
pub fn throttle_identifier(ip: &str, email: &str) -> String {
    format!("{}:{}", ip, normalize_email(email))
}

/// 封禁查询结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockStatus {
    pub blocked: bool,
    /// 封禁剩余秒数，未封禁时为 0
    pub remaining_secs: u64,
}

impl BlockStatus {
    pub const CLEAR: Self = Self {
        blocked: false,
        remaining_secs: 0,
    };
}

/// 登记一次失败后的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailureOutcome {
    /// 本次失败是否触发了封禁
    pub blocked_now: bool,
    /// 封禁时为封禁时长，否则为当前窗口剩余秒数
    pub retry_after: u64,
    /// 触发封禁前剩余的尝试次数
    pub remaining_attempts: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_normalizes_email() {
        assert_eq!(
            throttle_identifier("10.0.0.1", "  Buyer@Procura.IO "),
            "10.0.0.1:buyer@procura.io"
        );
    }
}
