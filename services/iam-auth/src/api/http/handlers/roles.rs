//! 角色、权限与菜单接口

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use serde::Deserialize;

use super::parse_role_id;
use crate::api::http::middleware::CurrentIdentity;
use crate::api::http::{ApiError, AppState};
use crate::application::{CreateRoleCommand, UpdateRoleCommand};
use crate::domain::rbac::{Menu, MenuId, Permission, PermissionId, Role};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplacePermissionsRequest {
    pub permission_ids: Vec<PermissionId>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplaceMenusRequest {
    pub menu_ids: Vec<MenuId>,
}

pub async fn list_roles(State(state): State<AppState>) -> Result<Json<Vec<Role>>, ApiError> {
    Ok(Json(state.rbac.list_roles().await?))
}

pub async fn create_role(
    State(state): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
    Json(cmd): Json<CreateRoleCommand>,
) -> Result<(StatusCode, Json<Role>), ApiError> {
    let role = state.rbac.create_role(&identity, cmd).await?;
    Ok((StatusCode::CREATED, Json(role)))
}

pub async fn update_role(
    State(state): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
    Path(id): Path<String>,
    Json(cmd): Json<UpdateRoleCommand>,
) -> Result<Json<Role>, ApiError> {
    let id = parse_role_id(&id)?;
    Ok(Json(state.rbac.update_role(&identity, &id, cmd).await?))
}

pub async fn delete_role(
    State(state): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_role_id(&id)?;
    state.rbac.delete_role(&identity, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn role_permissions(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<Permission>>, ApiError> {
    let id = parse_role_id(&id)?;
    Ok(Json(state.rbac.role_permissions(&id).await?))
}

pub async fn replace_role_permissions(
    State(state): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
    Path(id): Path<String>,
    Json(req): Json<ReplacePermissionsRequest>,
) -> Result<Json<Vec<Permission>>, ApiError> {
    let id = parse_role_id(&id)?;
    let permissions = state
        .rbac
        .replace_role_permissions(&identity, &id, req.permission_ids)
        .await?;
    Ok(Json(permissions))
}

pub async fn role_menus(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<Menu>>, ApiError> {
    let id = parse_role_id(&id)?;
    Ok(Json(state.rbac.role_menus(&id).await?))
}

pub async fn replace_role_menus(
    State(state): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
    Path(id): Path<String>,
    Json(req): Json<ReplaceMenusRequest>,
) -> Result<Json<Vec<Menu>>, ApiError> {
    let id = parse_role_id(&id)?;
    let menus = state
        .rbac
        .replace_role_menus(&identity, &id, req.menu_ids)
        .await?;
    Ok(Json(menus))
}

pub async fn list_permissions(
    State(state): State<AppState>,
) -> Result<Json<Vec<Permission>>, ApiError> {
    Ok(Json(state.rbac.list_permissions().await?))
}

/// 当前用户角色可见的菜单
pub async fn my_menus(
    State(state): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
) -> Result<Json<Vec<Menu>>, ApiError> {
    Ok(Json(state.rbac.menus_for_role_name(&identity.role).await?))
}
