//! 错误响应
//!
//! 所有错误以 RFC 7807 `application/problem+json` 返回

use axum::Json;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use procura_errors::AppError;
use tracing::{error, warn};

/// HTTP 层错误包装
#[derive(Debug)]
pub struct ApiError(pub AppError);

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let err = self.0;
        let problem = err.to_problem_details();
        let status =
            StatusCode::from_u16(problem.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status.is_server_error() {
            error!(error = %err, status = status.as_u16(), "Request failed");
        } else if status == StatusCode::FORBIDDEN {
            // 响应体只有通用描述，具体原因只进日志
            warn!(error = %err, "Access denied");
        }

        let mut response = (
            status,
            [(header::CONTENT_TYPE, "application/problem+json")],
            Json(problem),
        )
            .into_response();

        if let Some(retry_after) = err.retry_after() {
            if let Ok(value) = HeaderValue::from_str(&retry_after.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }

        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_too_many_attempts_sets_retry_after() {
        let response = ApiError(AppError::too_many_attempts(42)).into_response();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "42");
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/problem+json"
        );

        let body = body_json(response).await;
        assert_eq!(body["detail"], "Too many attempts, retry in 42 seconds");
    }

    #[tokio::test]
    async fn test_forbidden_body_is_generic() {
        let response = ApiError(AppError::forbidden("missing vendor:approve")).into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let body = body_json(response).await;
        assert_eq!(body["detail"], "access denied");
    }

    #[tokio::test]
    async fn test_internal_details_are_hidden() {
        let response = ApiError(AppError::database("relation \"users\" does not exist")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = body_json(response).await;
        assert_eq!(body["detail"], "internal server error");
    }
}
