//! 角色、权限与菜单

mod guard;
mod menu;
mod permission;
mod repository;
mod role;

pub use guard::*;
pub use menu::*;
pub use permission::*;
pub use repository::*;
pub use role::*;
