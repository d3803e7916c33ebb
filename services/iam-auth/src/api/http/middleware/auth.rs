//! 认证中间件
//!
//! 校验 bearer token → 检查吊销 → 注入 `Identity` 到请求扩展

use axum::extract::{FromRequestParts, Request, State};
use axum::http::request::Parts;
use axum::http::{HeaderMap, header};
use axum::middleware::Next;
use axum::response::Response;
use procura_errors::AppError;
use tracing::debug;

use crate::api::http::{ApiError, AppState};
use crate::domain::identity::Identity;

/// 已认证身份提取器，需在 `auth_middleware` 之后使用
#[derive(Debug, Clone)]
pub struct CurrentIdentity(pub Identity);

impl<S> FromRequestParts<S> for CurrentIdentity
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Identity>()
            .cloned()
            .map(CurrentIdentity)
            .ok_or_else(|| AppError::unauthorized("authentication required").into())
    }
}

fn bearer_token(headers: &HeaderMap) -> Result<String, AppError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or_else(|| AppError::unauthorized("missing bearer token"))?
        .to_str()
        .map_err(|_| AppError::malformed("authorization header is not valid ASCII"))?;

    let token = value
        .strip_prefix("Bearer ")
        .ok_or_else(|| AppError::unauthorized("missing bearer token"))?
        .trim();

    if token.is_empty() {
        return Err(AppError::unauthorized("missing bearer token"));
    }
    Ok(token.to_string())
}

/// JWT 认证中间件
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(request.headers()).inspect_err(|e| reject_metric(e))?;

    let identity = state
        .auth
        .authenticate(&token)
        .await
        .inspect_err(|e| {
            reject_metric(e);
            debug!(error = %e, path = %request.uri().path(), "Authentication rejected");
        })?;

    request.extensions_mut().insert(identity);
    Ok(next.run(request).await)
}

fn reject_metric(err: &AppError) {
    let reason = match err {
        AppError::Malformed(_) => "malformed",
        AppError::Expired => "expired",
        AppError::InvalidSignature => "invalid_signature",
        AppError::Revoked => "revoked",
        AppError::Unauthorized(_) => "missing",
        _ => "error",
    };
    metrics::counter!("auth_rejections_total", "reason" => reason).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request as HttpRequest, StatusCode};
    use axum::routing::get;
    use axum::{Json, Router, middleware};
    use tower::ServiceExt;

    use crate::domain::revocation::RevocationLedger;
    use crate::test_support::{ISSUER, JWT_SECRET, TestContext};

    async fn whoami(CurrentIdentity(identity): CurrentIdentity) -> Json<String> {
        Json(identity.role)
    }

    fn app(ctx: &TestContext) -> Router {
        let state = ctx.state();
        Router::new()
            .route("/", get(whoami))
            .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
            .with_state(state)
    }

    fn request(auth: Option<&str>) -> HttpRequest<Body> {
        let mut builder = HttpRequest::builder().uri("/");
        if let Some(value) = auth {
            builder = builder.header("Authorization", value);
        }
        builder.body(Body::empty()).unwrap()
    }

    async fn problem_type(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        body["type"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_valid_token_passes() {
        let ctx = TestContext::new();
        let token = ctx.token_for("staff");

        let response = app(&ctx)
            .oneshot(request(Some(&format!("Bearer {}", token))))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_missing_or_non_bearer_header() {
        let ctx = TestContext::new();

        let response = app(&ctx).oneshot(request(None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = app(&ctx)
            .oneshot(request(Some("Basic dXNlcjpwYXNz")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_garbage_token_is_malformed() {
        let ctx = TestContext::new();
        let response = app(&ctx)
            .oneshot(request(Some("Bearer not-a-jwt")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(problem_type(response).await.ends_with("malformed-token"));
    }

    #[tokio::test]
    async fn test_revoked_token_rejected() {
        let ctx = TestContext::new();
        let token = ctx.token_for("staff");
        ctx.ledger.store(&token).await.unwrap();

        let response = app(&ctx)
            .oneshot(request(Some(&format!("Bearer {}", token))))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(problem_type(response).await.ends_with("token-revoked"));
    }

    #[tokio::test]
    async fn test_expired_token_rejected() {
        let ctx = TestContext::new();
        let expired = procura_auth_core::TokenService::new(
            JWT_SECRET,
            chrono::Duration::seconds(-60),
            ISSUER,
        );
        let token = expired
            .issue(&procura_common::UserId::new(), "staff", "jti-1")
            .unwrap();

        let response = app(&ctx)
            .oneshot(request(Some(&format!("Bearer {}", token))))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(problem_type(response).await.ends_with("token-expired"));
    }
}
