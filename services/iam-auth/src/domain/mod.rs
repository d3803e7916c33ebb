//! 领域层

pub mod identity;
pub mod rbac;
pub mod revocation;
pub mod session;
pub mod throttle;
pub mod user;
pub mod value_objects;
