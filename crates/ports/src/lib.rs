//! ports - 抽象 trait 层
//!
//! 定义基础设施的抽象接口，具体实现位于 adapters

mod cache;
#[cfg(any(test, feature = "test-util"))]
mod memory;

pub use cache::*;
#[cfg(any(test, feature = "test-util"))]
pub use memory::MemoryCache;
