//! 认证接口

use axum::Json;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use procura_common::SessionId;
use serde::{Deserialize, Serialize};

use crate::api::http::middleware::CurrentIdentity;
use crate::api::http::{ApiError, AppState, ClientIp};
use crate::application::{LoginCommand, LoginResult};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeResponse {
    pub user_id: String,
    pub role: String,
    pub session_id: Option<SessionId>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RevokedSessionsResponse {
    pub revoked_sessions: usize,
}

pub async fn login(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    headers: HeaderMap,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResult>, ApiError> {
    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    let result = state
        .auth
        .login(LoginCommand {
            email: req.email,
            password: req.password,
            ip,
            user_agent,
        })
        .await?;

    Ok(Json(result))
}

pub async fn logout(
    State(state): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
) -> Result<StatusCode, ApiError> {
    state.auth.logout(&identity).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn logout_all(
    State(state): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
) -> Result<Json<RevokedSessionsResponse>, ApiError> {
    let revoked_sessions = state.auth.logout_all(&identity).await?;
    Ok(Json(RevokedSessionsResponse { revoked_sessions }))
}

pub async fn change_password(
    State(state): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
    Json(req): Json<ChangePasswordRequest>,
) -> Result<StatusCode, ApiError> {
    state
        .auth
        .change_password(&identity, &req.old_password, &req.new_password)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn me(CurrentIdentity(identity): CurrentIdentity) -> Json<MeResponse> {
    Json(MeResponse {
        user_id: identity.user_id.to_string(),
        role: identity.role,
        session_id: identity.session_id,
    })
}
