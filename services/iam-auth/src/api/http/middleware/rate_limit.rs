//! 按接口类别的限流中间件
//!
//! 类别由路径和方法决定，阈值来自配置；缓存故障时放行

use axum::extract::{Request, State};
use axum::http::Method;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use once_cell::sync::Lazy;
use procura_config::{RateLimitConfig, RateLimitRule};
use procura_errors::AppError;
use regex::Regex;
use tracing::{debug, warn};

use crate::api::http::{ApiError, AppState, ClientIp};

/// 认证接口
static AUTH_PATH_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^/api/auth(/|$)").expect("valid auth path regex"));

/// 管理接口（含角色管理）
static ADMIN_PATH_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^/api/(admin(/|$)|roles)").expect("valid admin path regex"));

/// 接口类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointClass {
    Auth,
    Query,
    Write,
    Admin,
}

impl EndpointClass {
    /// 分类规则：
    /// 1. `/api/auth/*` → Auth
    /// 2. `/api/admin/*`、`/api/roles*` → Admin
    /// 3. GET/HEAD → Query，其余方法 → Write
    pub fn classify(path: &str, method: &Method) -> Self {
        if AUTH_PATH_REGEX.is_match(path) {
            return Self::Auth;
        }
        if ADMIN_PATH_REGEX.is_match(path) {
            return Self::Admin;
        }
        match *method {
            Method::GET | Method::HEAD => Self::Query,
            _ => Self::Write,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auth => "auth",
            Self::Query => "query",
            Self::Write => "write",
            Self::Admin => "admin",
        }
    }

    pub fn rule(&self, config: &RateLimitConfig) -> RateLimitRule {
        match self {
            Self::Auth => config.auth,
            Self::Query => config.query,
            Self::Write => config.write,
            Self::Admin => config.admin,
        }
    }
}

pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let Some(limiter) = state.rate_limiter.as_ref().filter(|_| state.rate_limit.enabled) else {
        return next.run(request).await;
    };

    let class = EndpointClass::classify(request.uri().path(), request.method());
    let ClientIp(client) =
        ClientIp::resolve(request.headers(), request.extensions(), &state.trusted_proxies);
    let rule = class.rule(&state.rate_limit);

    match limiter.check(class.as_str(), &client, rule).await {
        Ok(decision) if !decision.allowed => {
            metrics::counter!("rate_limit_rejections_total", "class" => class.as_str())
                .increment(1);
            warn!(
                client = %client,
                class = class.as_str(),
                path = %request.uri().path(),
                method = %request.method(),
                count = decision.count,
                limit = decision.limit,
                "Rate limit exceeded"
            );
            let retry_after = decision.retry_after.unwrap_or(rule.window_secs);
            ApiError(AppError::too_many_attempts(retry_after)).into_response()
        }
        Ok(decision) => {
            debug!(client = %client, class = class.as_str(), count = decision.count, "Request allowed");
            next.run(request).await
        }
        Err(e) => {
            warn!(error = %e, class = class.as_str(), "Rate limiter unavailable, failing open");
            next.run(request).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;

    use axum::body::Body;
    use axum::extract::ConnectInfo;
    use axum::http::{Request as HttpRequest, StatusCode, header};
    use axum::routing::get;
    use axum::{Router, middleware};
    use tower::ServiceExt;

    use crate::test_support::TestContext;

    #[test]
    fn test_classify() {
        let cases = [
            ("/api/auth/login", Method::POST, EndpointClass::Auth),
            ("/api/auth/me", Method::GET, EndpointClass::Auth),
            ("/api/admin/audit", Method::GET, EndpointClass::Admin),
            ("/api/roles", Method::GET, EndpointClass::Admin),
            ("/api/roles/abc/permissions", Method::PUT, EndpointClass::Admin),
            ("/api/sessions", Method::GET, EndpointClass::Query),
            ("/health", Method::HEAD, EndpointClass::Query),
            ("/api/sessions", Method::DELETE, EndpointClass::Write),
            ("/api/authors", Method::POST, EndpointClass::Write),
        ];
        for (path, method, expected) in cases {
            assert_eq!(EndpointClass::classify(path, &method), expected, "{} {}", method, path);
        }
    }

    fn app(ctx: &TestContext, config: RateLimitConfig) -> Router {
        let state = ctx.state_with_rate_limit(config);
        Router::new()
            .route("/api/things", get(|| async { "OK" }))
            .layer(middleware::from_fn_with_state(state.clone(), rate_limit_middleware))
            .with_state(state)
    }

    fn request(ip: &str) -> HttpRequest<Body> {
        let mut request = HttpRequest::builder()
            .uri("/api/things")
            .body(Body::empty())
            .unwrap();
        let peer: SocketAddr = format!("{}:4000", ip).parse().unwrap();
        request.extensions_mut().insert(ConnectInfo(peer));
        request
    }

    fn tight() -> RateLimitConfig {
        RateLimitConfig {
            query: RateLimitRule::new(2, 60),
            ..RateLimitConfig::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejects_with_retry_after() {
        let ctx = TestContext::new();
        let app = app(&ctx, tight());

        for _ in 0..2 {
            let response = app.clone().oneshot(request("1.1.1.1")).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }

        let response = app.clone().oneshot(request("1.1.1.1")).await.unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "60");

        // 其他客户端不受影响
        let response = app.oneshot(request("2.2.2.2")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_fails_open_on_cache_error() {
        let ctx = TestContext::new();
        ctx.cache.set_failing(true);
        let app = app(&ctx, tight());

        for _ in 0..5 {
            let response = app.clone().oneshot(request("1.1.1.1")).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }
    }

    #[tokio::test]
    async fn test_disabled_by_config() {
        let ctx = TestContext::new();
        let app = app(
            &ctx,
            RateLimitConfig {
                enabled: false,
                ..tight()
            },
        );

        for _ in 0..5 {
            let response = app.clone().oneshot(request("1.1.1.1")).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }
    }
}
