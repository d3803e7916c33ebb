//! 路由装配

use std::time::Duration;

use axum::Router;
use axum::middleware::from_fn_with_state;
use axum::routing::{MethodRouter, delete, get, post, put};
use procura_auth_core::ADMIN_ROLE;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use super::AppState;
use super::handlers::{auth, health, roles, sessions};
use super::middleware::{
    PermissionGuard, RoleGuard, auth_middleware, permission_guard, rate_limit_middleware,
    role_guard,
};

const ADMIN_ONLY: RoleGuard = RoleGuard::new(&[ADMIN_ROLE]);

fn require_role(route: MethodRouter<AppState>, guard: RoleGuard) -> MethodRouter<AppState> {
    route.route_layer(from_fn_with_state(guard, role_guard))
}

fn require_permission(
    state: &AppState,
    route: MethodRouter<AppState>,
    resource: &'static str,
    action: &'static str,
) -> MethodRouter<AppState> {
    let guard = PermissionGuard::new(state.rbac.clone(), resource, action);
    route.route_layer(from_fn_with_state(guard, permission_guard))
}

/// 构建完整路由
///
/// 层次（外 → 内）：trace → timeout → 限流 → 认证（仅受保护路由）→ 角色/权限守卫
pub fn build_router(state: AppState, request_timeout: Duration) -> Router {
    let public = Router::new()
        .route("/api/auth/login", post(auth::login))
        .route("/health", get(health::health))
        .route("/metrics", get(health::metrics));

    let s = &state;
    let protected = Router::new()
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/auth/logout-all", post(auth::logout_all))
        .route("/api/auth/password", post(auth::change_password))
        .route("/api/auth/me", get(auth::me))
        .route(
            "/api/sessions",
            get(sessions::list_sessions).delete(sessions::revoke_other_sessions),
        )
        .route("/api/sessions/{id}", delete(sessions::revoke_session))
        .route("/api/me/menus", get(roles::my_menus))
        .route(
            "/api/roles",
            require_role(get(roles::list_roles), ADMIN_ONLY).merge(require_role(
                require_permission(s, post(roles::create_role), "role", "create"),
                ADMIN_ONLY,
            )),
        )
        .route(
            "/api/roles/{id}",
            require_permission(s, put(roles::update_role), "role", "update").merge(
                require_permission(s, delete(roles::delete_role), "role", "delete"),
            ),
        )
        .route(
            "/api/roles/{id}/permissions",
            require_permission(s, get(roles::role_permissions), "role", "view").merge(
                require_permission(s, put(roles::replace_role_permissions), "role", "assign"),
            ),
        )
        .route(
            "/api/roles/{id}/menus",
            require_permission(s, get(roles::role_menus), "role", "view").merge(
                require_permission(s, put(roles::replace_role_menus), "role", "assign"),
            ),
        )
        .route(
            "/api/permissions",
            require_permission(s, get(roles::list_permissions), "permission", "view"),
        )
        .route_layer(from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(public)
        .merge(protected)
        .layer(from_fn_with_state(state.clone(), rate_limit_middleware))
        .layer(TimeoutLayer::new(request_timeout))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
