//! 测试夹具：内存版仓储、账本和完整的服务装配

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use argon2::password_hash::{PasswordHasher, SaltString, rand_core::OsRng};
use argon2::{Algorithm, Argon2, Params, Version};
use async_trait::async_trait;
use procura_auth_core::TokenService;
use procura_common::UserId;
use procura_config::{AuthConfig, RateLimitConfig};
use procura_errors::{AppError, AppResult};
use procura_ports::{CachePort, MemoryCache};
use procura_telemetry::HealthStatus;
use uuid::Uuid;

use crate::api::http::{AppState, HealthProbe, TrustedProxies};
use crate::application::{AuthService, RbacService};
use crate::domain::identity::Identity;
use crate::domain::rbac::{
    Menu, MenuId, MenuRepository, Permission, PermissionId, PermissionRepository, Role, RoleId,
    RoleRepository,
};
use crate::domain::revocation::{RevocationLedger, token_digest};
use crate::domain::user::{CredentialStore, UserAccount};
use crate::domain::value_objects::{Email, HashedPassword};
use crate::infrastructure::cache::{CacheKeys, LoginThrottle, RateLimiter, SessionStore, ThrottlePolicy};

pub const ADMIN_EMAIL: &str = "admin@procura.io";
pub const STAFF_EMAIL: &str = "staff@procura.io";
pub const ROOT_EMAIL: &str = "root@procura.io";
pub const TEST_PASSWORD: &str = "Secr3t-Passw0rd";

pub const JWT_SECRET: &str = "test-secret-with-enough-entropy-0";
pub const ISSUER: &str = "procura-iam";

const STORE_TIMEOUT: Duration = Duration::from_secs(2);

/// 低成本参数的 argon2 哈希，校验时按哈希内参数计算
fn cheap_hash(password: &str) -> HashedPassword {
    let params = Params::new(Params::MIN_M_COST, 1, 1, None).unwrap();
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
    let salt = SaltString::generate(&mut OsRng);
    let hash = argon2.hash_password(password.as_bytes(), &salt).unwrap();
    HashedPassword::from_hash(hash.to_string())
}

// ============================================================================
// 吊销账本
// ============================================================================

#[derive(Default)]
pub struct InMemoryLedger {
    digests: Mutex<HashSet<String>>,
}

#[async_trait]
impl RevocationLedger for InMemoryLedger {
    async fn store(&self, token: &str) -> AppResult<()> {
        self.digests.lock().unwrap().insert(token_digest(token));
        Ok(())
    }

    async fn is_revoked(&self, token: &str) -> AppResult<bool> {
        Ok(self.digests.lock().unwrap().contains(&token_digest(token)))
    }
}

// ============================================================================
// 凭据存储
// ============================================================================

#[derive(Default)]
pub struct InMemoryCredentialStore {
    users: Mutex<HashMap<UserId, UserAccount>>,
}

impl InMemoryCredentialStore {
    pub fn insert(&self, email: &str, role: &str, is_active: bool) -> UserId {
        let account = UserAccount {
            id: UserId::new(),
            email: Email::parse(email).unwrap(),
            password_hash: cheap_hash(TEST_PASSWORD),
            role: role.to_string(),
            is_active,
        };
        let id = account.id.clone();
        self.users.lock().unwrap().insert(id.clone(), account);
        id
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn find_by_email(&self, email: &Email) -> AppResult<Option<UserAccount>> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .values()
            .find(|u| u.email == *email)
            .cloned())
    }

    async fn find_by_id(&self, id: &UserId) -> AppResult<Option<UserAccount>> {
        Ok(self.users.lock().unwrap().get(id).cloned())
    }

    async fn update_password(&self, id: &UserId, hash: &HashedPassword) -> AppResult<()> {
        let mut users = self.users.lock().unwrap();
        let user = users
            .get_mut(id)
            .ok_or_else(|| AppError::not_found("User not found"))?;
        user.password_hash = hash.clone();
        Ok(())
    }
}

// ============================================================================
// RBAC 仓储
// ============================================================================

#[derive(Default)]
struct RbacTables {
    roles: BTreeMap<Uuid, Role>,
    permissions: Vec<Permission>,
    menus: Vec<Menu>,
    role_permissions: HashMap<RoleId, Vec<PermissionId>>,
    role_menus: HashMap<RoleId, Vec<MenuId>>,
}

impl RbacTables {
    fn role_named(&self, name: &str) -> Option<&Role> {
        self.roles.values().find(|r| r.name == name)
    }

    fn permissions_of(&self, id: &RoleId) -> Vec<Permission> {
        let ids = self.role_permissions.get(id).cloned().unwrap_or_default();
        let mut permissions: Vec<Permission> = self
            .permissions
            .iter()
            .filter(|p| ids.contains(&p.id))
            .cloned()
            .collect();
        permissions.sort_by(|a, b| (&a.resource, &a.action).cmp(&(&b.resource, &b.action)));
        permissions
    }

    fn menus_of(&self, id: &RoleId) -> Vec<Menu> {
        let ids = self.role_menus.get(id).cloned().unwrap_or_default();
        let mut menus: Vec<Menu> = self
            .menus
            .iter()
            .filter(|m| ids.contains(&m.id))
            .cloned()
            .collect();
        menus.sort_by(|a, b| (a.sort_order, &a.name).cmp(&(b.sort_order, &b.name)));
        menus
    }
}

#[derive(Default)]
pub struct InMemoryRbac {
    tables: Mutex<RbacTables>,
}

impl InMemoryRbac {
    /// 系统角色 superadmin/admin、普通角色 staff，以及对应的权限和菜单
    pub fn seeded() -> Self {
        let mut tables = RbacTables::default();

        let superadmin = Role::system("superadmin", Some("Unrestricted access".to_string())).unwrap();
        let admin = Role::system("admin", Some("System administrator".to_string())).unwrap();
        let staff = Role::new("staff", None).unwrap();

        let admin_permissions: Vec<Permission> = [
            ("role", "view"),
            ("role", "create"),
            ("role", "update"),
            ("role", "delete"),
            ("role", "assign"),
            ("permission", "view"),
        ]
        .into_iter()
        .map(|(resource, action)| Permission::new(resource, action))
        .collect();
        let vendor_approve = Permission::new("vendor", "approve");
        // 未分配给任何种子角色
        let vendor_view = Permission::new("vendor", "view");

        let vendors_menu = Menu {
            id: MenuId(Uuid::now_v7()),
            parent_id: None,
            name: "Vendors".to_string(),
            path: "/vendors".to_string(),
            sort_order: 10,
        };
        let roles_menu = Menu {
            id: MenuId(Uuid::now_v7()),
            parent_id: None,
            name: "Roles".to_string(),
            path: "/admin/roles".to_string(),
            sort_order: 90,
        };

        tables
            .role_permissions
            .insert(admin.id, admin_permissions.iter().map(|p| p.id).collect());
        tables.role_permissions.insert(staff.id, vec![vendor_approve.id]);
        tables
            .role_menus
            .insert(admin.id, vec![vendors_menu.id, roles_menu.id]);
        tables.role_menus.insert(staff.id, vec![vendors_menu.id]);

        tables.permissions = admin_permissions;
        tables.permissions.push(vendor_approve);
        tables.permissions.push(vendor_view);
        tables.menus = vec![vendors_menu, roles_menu];
        for role in [superadmin, admin, staff] {
            tables.roles.insert(role.id.0, role);
        }

        Self {
            tables: Mutex::new(tables),
        }
    }
}

#[async_trait]
impl RoleRepository for InMemoryRbac {
    async fn list(&self) -> AppResult<Vec<Role>> {
        let mut roles: Vec<Role> = self.tables.lock().unwrap().roles.values().cloned().collect();
        roles.sort_by(|a, b| b.is_system.cmp(&a.is_system).then(a.name.cmp(&b.name)));
        Ok(roles)
    }

    async fn find_by_id(&self, id: &RoleId) -> AppResult<Option<Role>> {
        Ok(self.tables.lock().unwrap().roles.get(&id.0).cloned())
    }

    async fn find_by_name(&self, name: &str) -> AppResult<Option<Role>> {
        Ok(self.tables.lock().unwrap().role_named(name).cloned())
    }

    async fn create(&self, role: &Role) -> AppResult<()> {
        let mut tables = self.tables.lock().unwrap();
        if tables.role_named(&role.name).is_some() {
            return Err(AppError::conflict(format!("Role '{}' already exists", role.name)));
        }
        tables.roles.insert(role.id.0, role.clone());
        Ok(())
    }

    async fn update(&self, role: &Role) -> AppResult<()> {
        let mut tables = self.tables.lock().unwrap();
        match tables.roles.get_mut(&role.id.0) {
            Some(existing) => {
                *existing = role.clone();
                Ok(())
            }
            None => Err(AppError::not_found(format!("Role {}", role.id))),
        }
    }

    async fn soft_delete(&self, id: &RoleId) -> AppResult<()> {
        let mut tables = self.tables.lock().unwrap();
        tables
            .roles
            .remove(&id.0)
            .ok_or_else(|| AppError::not_found(format!("Role {}", id)))?;
        tables.role_permissions.remove(id);
        tables.role_menus.remove(id);
        Ok(())
    }

    async fn permissions_of(&self, id: &RoleId) -> AppResult<Vec<Permission>> {
        Ok(self.tables.lock().unwrap().permissions_of(id))
    }

    async fn menus_of(&self, id: &RoleId) -> AppResult<Vec<Menu>> {
        Ok(self.tables.lock().unwrap().menus_of(id))
    }

    async fn permissions_for_role_name(&self, name: &str) -> AppResult<Vec<Permission>> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .role_named(name)
            .map(|r| tables.permissions_of(&r.id))
            .unwrap_or_default())
    }

    async fn menus_for_role_name(&self, name: &str) -> AppResult<Vec<Menu>> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .role_named(name)
            .map(|r| tables.menus_of(&r.id))
            .unwrap_or_default())
    }

    async fn replace_permissions(
        &self,
        id: &RoleId,
        permission_ids: &[PermissionId],
    ) -> AppResult<()> {
        self.tables
            .lock()
            .unwrap()
            .role_permissions
            .insert(*id, permission_ids.to_vec());
        Ok(())
    }

    async fn replace_menus(&self, id: &RoleId, menu_ids: &[MenuId]) -> AppResult<()> {
        self.tables
            .lock()
            .unwrap()
            .role_menus
            .insert(*id, menu_ids.to_vec());
        Ok(())
    }
}

#[async_trait]
impl PermissionRepository for InMemoryRbac {
    async fn list_all(&self) -> AppResult<Vec<Permission>> {
        Ok(self.tables.lock().unwrap().permissions.clone())
    }

    async fn find_by_ids(&self, ids: &[PermissionId]) -> AppResult<Vec<Permission>> {
        Ok(self
            .tables
            .lock()
            .unwrap()
            .permissions
            .iter()
            .filter(|p| ids.contains(&p.id))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl MenuRepository for InMemoryRbac {
    async fn find_by_ids(&self, ids: &[MenuId]) -> AppResult<Vec<Menu>> {
        Ok(self
            .tables
            .lock()
            .unwrap()
            .menus
            .iter()
            .filter(|m| ids.contains(&m.id))
            .cloned()
            .collect())
    }
}

// ============================================================================
// 健康检查
// ============================================================================

pub struct StaticHealth;

#[async_trait]
impl HealthProbe for StaticHealth {
    async fn check(&self) -> HealthStatus {
        let mut status = HealthStatus::new();
        status.add_check("postgres", true, None);
        status.add_optional_check("redis", true, None);
        status
    }
}

// ============================================================================
// 装配
// ============================================================================

pub struct TestContext {
    pub tokens: Arc<TokenService>,
    pub ledger: Arc<InMemoryLedger>,
    pub users: Arc<InMemoryCredentialStore>,
    pub rbac_store: Arc<InMemoryRbac>,
    pub cache: Arc<MemoryCache>,
    pub sessions: Arc<SessionStore>,
    pub throttle: Arc<LoginThrottle>,
    pub auth: Arc<AuthService>,
    pub rbac: Arc<RbacService>,
    cache_enabled: bool,
}

impl TestContext {
    pub fn new() -> Self {
        Self::build(true)
    }

    /// 不配置缓存：会话、登录限流和接口限流全部关闭
    pub fn without_cache() -> Self {
        Self::build(false)
    }

    fn build(cache_enabled: bool) -> Self {
        let tokens = Arc::new(TokenService::new(
            JWT_SECRET,
            chrono::Duration::hours(24),
            ISSUER,
        ));
        let ledger = Arc::new(InMemoryLedger::default());
        let users = Arc::new(InMemoryCredentialStore::default());
        users.insert(ADMIN_EMAIL, "admin", true);
        users.insert(STAFF_EMAIL, "staff", true);
        users.insert(ROOT_EMAIL, "superadmin", true);
        users.insert("retired@procura.io", "staff", false);

        let cache = Arc::new(MemoryCache::new());
        let shared: Arc<dyn CachePort> = cache.clone();
        let keys = CacheKeys::new("procura");
        let sessions = Arc::new(SessionStore::new(shared.clone(), keys.clone(), STORE_TIMEOUT));
        let throttle = Arc::new(LoginThrottle::new(
            shared,
            keys,
            ThrottlePolicy::from_config(&AuthConfig::default()),
            STORE_TIMEOUT,
        ));

        let mut auth = AuthService::new(tokens.clone(), ledger.clone(), users.clone());
        if cache_enabled {
            auth = auth
                .with_sessions(sessions.clone())
                .with_throttle(throttle.clone());
        }

        let rbac_store = Arc::new(InMemoryRbac::seeded());
        let rbac = Arc::new(RbacService::new(
            rbac_store.clone(),
            rbac_store.clone(),
            rbac_store.clone(),
        ));

        Self {
            tokens,
            ledger,
            users,
            rbac_store,
            cache,
            sessions,
            throttle,
            auth: Arc::new(auth),
            rbac,
            cache_enabled,
        }
    }

    /// HTTP 层状态，使用默认限流阈值
    pub fn state(&self) -> AppState {
        self.state_with_rate_limit(RateLimitConfig::default())
    }

    pub fn state_with_rate_limit(&self, rate_limit: RateLimitConfig) -> AppState {
        let limiter = self.cache_enabled.then(|| {
            Arc::new(RateLimiter::new(
                self.cache.clone(),
                CacheKeys::new("procura"),
                STORE_TIMEOUT,
            ))
        });

        AppState {
            auth: self.auth.clone(),
            rbac: self.rbac.clone(),
            rate_limiter: limiter,
            rate_limit,
            trusted_proxies: TrustedProxies::default(),
            health: Arc::new(StaticHealth),
            metrics: None,
        }
    }

    pub async fn role_by_name(&self, name: &str) -> Role {
        self.rbac_store.find_by_name(name).await.unwrap().unwrap()
    }

    /// 直接签发令牌（不经过登录）
    pub fn token_for(&self, role: &str) -> String {
        self.tokens
            .issue(&UserId::new(), role, &Uuid::now_v7().to_string())
            .unwrap()
    }
}

/// 不经过令牌校验的身份，用于服务层测试
pub fn identity_with_role(role: &str) -> Identity {
    Identity {
        user_id: UserId::new(),
        role: role.to_string(),
        jti: Uuid::now_v7().to_string(),
        token: format!("token-{}", Uuid::now_v7()),
        session_id: None,
    }
}

pub async fn seeded_permission(ctx: &TestContext, resource: &str, action: &str) -> Permission {
    ctx.rbac
        .list_permissions()
        .await
        .unwrap()
        .into_iter()
        .find(|p| p.matches(resource, action))
        .unwrap()
}
