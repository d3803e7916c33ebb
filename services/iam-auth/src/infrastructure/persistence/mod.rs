//! PostgreSQL 持久化实现
//!
//! 所有查询都在存储超时内执行，错误经 `map_sqlx_error` 转换

mod menu_repository;
mod permission_repository;
mod revocation_repository;
mod role_repository;
mod rows;
mod user_repository;

pub use menu_repository::PostgresMenuRepository;
pub use permission_repository::PostgresPermissionRepository;
pub use revocation_repository::PostgresRevocationLedger;
pub use role_repository::PostgresRoleRepository;
pub use user_repository::PostgresCredentialStore;
