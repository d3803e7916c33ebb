//! 会话管理接口

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;

use super::auth::RevokedSessionsResponse;
use super::parse_session_id;
use crate::api::http::middleware::CurrentIdentity;
use crate::api::http::{ApiError, AppState};
use crate::application::SessionView;

pub async fn list_sessions(
    State(state): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
) -> Result<Json<Vec<SessionView>>, ApiError> {
    Ok(Json(state.auth.list_sessions(&identity).await?))
}

pub async fn revoke_session(
    State(state): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let session_id = parse_session_id(&id)?;
    state.auth.revoke_session(&identity, &session_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn revoke_other_sessions(
    State(state): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
) -> Result<Json<RevokedSessionsResponse>, ApiError> {
    let revoked_sessions = state.auth.revoke_other_sessions(&identity).await?;
    Ok(Json(RevokedSessionsResponse { revoked_sessions }))
}
