//! HTTP 接口（axum）

mod error;
mod extract;
pub mod handlers;
pub mod middleware;
mod routes;
mod state;

pub use error::ApiError;
pub use extract::{ClientIp, TrustedProxies};
pub use routes::build_router;
pub use state::{AppState, HealthProbe};
