//! procura-bootstrap - 服务启动骨架
//!
//! 配置加载后的运行时初始化、基础设施连接和优雅关闭

mod infrastructure;
mod retry;
mod runtime;

pub use infrastructure::*;
pub use retry::*;
pub use runtime::*;
