//! 值对象

mod email;
mod password;

pub use email::Email;
pub use password::{HashedPassword, validate_password_strength};
