//! IAM Auth Service

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use iam_auth::api::http::build_router;
use iam_auth::build_state;
use procura_bootstrap::{Infrastructure, init_runtime, shutdown_signal};
use procura_config::AppConfig;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // 加载配置
    let config = AppConfig::load("config").context("failed to load configuration")?;

    // 初始化运行时
    init_runtime(&config);

    info!("Starting IAM Auth Service");

    let metrics = if config.server.metrics_enabled {
        match procura_telemetry::init_metrics() {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!(error = %e, "Prometheus exporter not installed");
                None
            }
        }
    } else {
        None
    };

    let infra = Arc::new(
        Infrastructure::from_config(config.clone())
            .await
            .context("failed to initialize infrastructure")?,
    );

    sqlx::migrate!("./migrations")
        .run(&infra.postgres_pool())
        .await
        .context("failed to run database migrations")?;
    info!("Database migrations applied");

    let request_timeout = Duration::from_secs(config.server.request_timeout_secs);
    let app = build_router(build_state(infra, metrics), request_timeout);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("invalid server address")?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    info!(%addr, "HTTP server starting");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")?;

    info!("IAM Auth Service stopped");
    Ok(())
}
