//! procura-adapter-redis - Redis 适配器

mod cache;
mod connection;

pub use cache::*;
pub use connection::*;
