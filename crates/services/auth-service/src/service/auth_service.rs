//! Authentication service - login, token rotation and session revocation.
//!
//! Login sequence: lookup, lock check, status checks, password verification,
//! then the outcome is persisted before any token is issued. Failure counters
//! are saved even when the login fails.

use std::fmt;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use common::{with_deadline, AppError, AppResult, OptionExt};
use domain::{AccessProfile, DomainError, ErrorCode, ExpectedVersion, Password, User, UserStatus};
use user_service_lib::events::{publish_after_save, EventPublisher};
use user_service_lib::repository::{RoleRepository, UserRepository};

use crate::config::AuthServiceConfig;
use crate::token::{
    AccessClaims, TokenBlacklist, TokenIssuer, TokenPair, TokenSubject, VALIDATION_LEEWAY_SECS,
};

/// Credentials presented at login
#[derive(Clone)]
pub struct LoginRequest {
    pub tenant_id: Uuid,
    pub username: String,
    pub password: String,
    pub client_ip: String,
}

impl fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginRequest")
            .field("tenant_id", &self.tenant_id)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("client_ip", &self.client_ip)
            .finish()
    }
}

/// Caller-facing view of the authenticated user
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserInfo {
    pub user_id: Uuid,
    pub tenant_id: Uuid,
    pub username: String,
    pub display_name: String,
    pub email: String,
    pub phone: String,
    pub avatar: String,
    pub role_ids: Vec<Uuid>,
    /// Sorted union across enabled roles
    pub permissions: Vec<String>,
    pub must_change_password: bool,
    pub last_login_at: Option<DateTime<Utc>>,
}

impl UserInfo {
    fn new(user: &User, permissions: Vec<String>) -> Self {
        Self {
            user_id: user.id(),
            tenant_id: user.tenant_id(),
            username: user.username().to_string(),
            display_name: user.display_name_or_username().to_string(),
            email: user.email().to_string(),
            phone: user.phone().to_string(),
            avatar: user.avatar().to_string(),
            role_ids: user.role_ids().to_vec(),
            permissions,
            must_change_password: user.must_change_password(),
            last_login_at: user.last_login_at(),
        }
    }
}

/// Successful login
#[derive(Debug, Clone, Serialize)]
pub struct LoginResponse {
    pub tokens: TokenPair,
    pub user: UserInfo,
}

/// Authentication service trait for dependency injection.
#[async_trait]
pub trait AuthService: Send + Sync {
    /// Verify credentials and issue a token pair
    async fn login(&self, request: LoginRequest) -> AppResult<LoginResponse>;

    /// Rotate a refresh token; the presented token cannot be used again
    async fn refresh_token(&self, refresh_token: &str) -> AppResult<TokenPair>;

    /// Revoke the given access token and every token of the user. Always succeeds.
    async fn logout(&self, user_id: Uuid, access_jti: Option<String>) -> AppResult<()>;

    async fn change_password(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        old_password: &str,
        new_password: &str,
    ) -> AppResult<()>;

    async fn get_current_user(&self, tenant_id: Uuid, user_id: Uuid) -> AppResult<UserInfo>;

    /// Administrative revocation of every token of a user in the actor's tenant
    async fn force_logout(
        &self,
        actor_tenant_id: Uuid,
        target_tenant_id: Uuid,
        target_user_id: Uuid,
    ) -> AppResult<()>;

    /// Verify an access token and check it has not been revoked
    async fn validate_access_token(&self, token: &str) -> AppResult<AccessClaims>;
}

/// Concrete implementation of AuthService over the user and role repositories.
pub struct Authenticator {
    users: Arc<dyn UserRepository>,
    roles: Arc<dyn RoleRepository>,
    issuer: Arc<dyn TokenIssuer>,
    blacklist: Arc<dyn TokenBlacklist>,
    events: Arc<dyn EventPublisher>,
    config: AuthServiceConfig,
}

impl Authenticator {
    pub fn new(
        users: Arc<dyn UserRepository>,
        roles: Arc<dyn RoleRepository>,
        issuer: Arc<dyn TokenIssuer>,
        blacklist: Arc<dyn TokenBlacklist>,
        events: Arc<dyn EventPublisher>,
        config: AuthServiceConfig,
    ) -> Self {
        Self {
            users,
            roles,
            issuer,
            blacklist,
            events,
            config,
        }
    }

    async fn save(&self, user: &mut User, loaded: u64) -> AppResult<()> {
        self.users
            .update(user, ExpectedVersion::Exact(loaded))
            .await?;
        publish_after_save(self.events.as_ref(), user.drain_events()).await;
        Ok(())
    }

    async fn permissions(&self, user: &User) -> AppResult<Vec<String>> {
        let roles = self
            .roles
            .find_by_ids(user.tenant_id(), user.role_ids())
            .await?;
        Ok(AccessProfile::resolve(user.id(), user.tenant_id(), &roles).permissions())
    }

    fn subject(user: &User, permissions: Vec<String>) -> TokenSubject {
        TokenSubject {
            user_id: user.id(),
            tenant_id: user.tenant_id(),
            username: user.username().to_string(),
            role_ids: user.role_ids().to_vec(),
            permissions,
        }
    }

    /// Tokens issued at or before a user-wide invalidation are dead.
    async fn ensure_not_invalidated(&self, user_id: Uuid, issued_ms: i64) -> AppResult<()> {
        if let Some(at) = self.blacklist.user_invalidated_at(user_id).await? {
            if issued_ms <= at.timestamp_millis() {
                return Err(revoked());
            }
        }
        Ok(())
    }

    async fn invalidate_all(&self, user_id: Uuid) -> AppResult<()> {
        let ttl = tracked_for(self.issuer.refresh_ttl());
        self.blacklist
            .invalidate_user(user_id, Utc::now(), ttl)
            .await
    }

    async fn login_inner(&self, request: LoginRequest) -> AppResult<LoginResponse> {
        let Some(mut user) = self
            .users
            .find_by_username(request.tenant_id, &request.username)
            .await?
        else {
            // Same cost as a real verification
            verify_off_thread(None, request.password).await?;
            tracing::warn!(tenant_id = %request.tenant_id, "Login failed: unknown user");
            return Err(AppError::Domain(DomainError::invalid_credentials()));
        };

        let loaded = user.version();
        let now = Utc::now();
        if user.release_expired_lock_at(now) {
            tracing::info!(user_id = %user.id(), "Expired lock released");
        }
        if let Some(err) = login_block(&user, now) {
            tracing::warn!(user_id = %user.id(), code = err.code(), "Login refused");
            return Err(err);
        }

        let verified =
            verify_off_thread(Some(user.password_hash().to_string()), request.password).await?;
        if !verified {
            let locked = user.record_login_failure(
                self.config.max_failed_attempts,
                self.config.lock_duration(),
            );
            self.save(&mut user, loaded).await?;

            if locked {
                tracing::warn!(
                    user_id = %user.id(),
                    failed_attempts = user.failed_attempts(),
                    "Account locked after repeated login failures"
                );
                return Err(account_locked());
            }
            tracing::warn!(
                user_id = %user.id(),
                failed_attempts = user.failed_attempts(),
                "Login failed: wrong password"
            );
            return Err(AppError::Domain(DomainError::invalid_credentials()));
        }

        user.record_login_success(&request.client_ip);
        self.save(&mut user, loaded).await?;

        let permissions = self.permissions(&user).await?;
        let tokens = self
            .issuer
            .issue(&Self::subject(&user, permissions.clone()), 0)?;
        tracing::info!(user_id = %user.id(), jti = %tokens.access_jti, "Login succeeded");

        Ok(LoginResponse {
            tokens,
            user: UserInfo::new(&user, permissions),
        })
    }

    async fn refresh_inner(&self, refresh_token: &str) -> AppResult<TokenPair> {
        let claims = self.issuer.validate_refresh(refresh_token)?;

        if claims.refresh_count >= self.issuer.max_refresh_count() {
            return Err(AppError::auth(
                ErrorCode::TokenRefreshLimitExceeded,
                "Refresh limit reached, please log in again",
            ));
        }
        self.ensure_not_invalidated(claims.sub, claims.iat_ms)
            .await?;

        let user = self
            .users
            .find_by_id(claims.tenant_id, claims.sub)
            .await?
            .ok_or_not_found(ErrorCode::UserNotFound)?;
        if let Some(err) = login_block(&user, Utc::now()) {
            return Err(err);
        }

        let remaining = tracked_for(claims.expires_at() - Utc::now());
        if !self.blacklist.consume(&claims.jti, remaining).await? {
            tracing::warn!(user_id = %claims.sub, jti = %claims.jti, "Refresh token reuse detected");
            return Err(revoked());
        }

        let permissions = self.permissions(&user).await?;
        let tokens = self
            .issuer
            .issue(&Self::subject(&user, permissions), claims.refresh_count + 1)?;
        tracing::info!(user_id = %user.id(), jti = %tokens.access_jti, "Token refreshed");
        Ok(tokens)
    }

    async fn logout_inner(&self, user_id: Uuid, access_jti: Option<String>) -> AppResult<()> {
        if let Some(jti) = access_jti {
            let ttl = tracked_for(self.issuer.access_ttl());
            if let Err(err) = self.blacklist.revoke(&jti, ttl).await {
                tracing::warn!(error = %err, %jti, "Failed to revoke access token");
            }
        }
        if let Err(err) = self.invalidate_all(user_id).await {
            tracing::warn!(error = %err, "Failed to invalidate user tokens");
        }
        tracing::info!("Logged out");
        Ok(())
    }

    async fn change_password_inner(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        old_password: &str,
        new_password: &str,
    ) -> AppResult<()> {
        let mut user = self
            .users
            .find_by_id(tenant_id, user_id)
            .await?
            .ok_or_not_found(ErrorCode::UserNotFound)?;
        let loaded = user.version();

        user.change_password(old_password, new_password)?;
        self.save(&mut user, loaded).await?;

        self.invalidate_all(user_id).await.map_err(|err| {
            tracing::error!(error = %err, "Password changed but token invalidation failed");
            AppError::internal(format!("token invalidation failed: {err}"))
        })?;
        tracing::info!("Password changed");
        Ok(())
    }

    async fn current_user_inner(&self, tenant_id: Uuid, user_id: Uuid) -> AppResult<UserInfo> {
        let user = self
            .users
            .find_by_id(tenant_id, user_id)
            .await?
            .ok_or_not_found(ErrorCode::UserNotFound)?;
        let permissions = self.permissions(&user).await?;
        Ok(UserInfo::new(&user, permissions))
    }

    async fn force_logout_inner(
        &self,
        actor_tenant_id: Uuid,
        target_tenant_id: Uuid,
        target_user_id: Uuid,
    ) -> AppResult<()> {
        if actor_tenant_id != target_tenant_id {
            tracing::warn!("Cross-tenant forced logout refused");
            return Err(AppError::Forbidden);
        }
        if !self
            .users
            .exists_by_id(target_tenant_id, target_user_id)
            .await?
        {
            return Err(
                DomainError::not_found(ErrorCode::UserNotFound, "User not found").into(),
            );
        }

        self.invalidate_all(target_user_id)
            .await
            .map_err(|err| AppError::internal(format!("forced logout failed: {err}")))?;
        tracing::info!("User forcibly logged out");
        Ok(())
    }

    async fn validate_inner(&self, token: &str) -> AppResult<AccessClaims> {
        let claims = self.issuer.validate_access(token)?;
        if self.blacklist.is_revoked(&claims.jti).await? {
            return Err(revoked());
        }
        self.ensure_not_invalidated(claims.sub, claims.iat_ms)
            .await?;
        Ok(claims)
    }
}

#[async_trait]
impl AuthService for Authenticator {
    #[tracing::instrument(skip(self, request), fields(tenant_id = %request.tenant_id, username = %request.username))]
    async fn login(&self, request: LoginRequest) -> AppResult<LoginResponse> {
        with_deadline(self.config.request_timeout, self.login_inner(request)).await
    }

    #[tracing::instrument(skip_all)]
    async fn refresh_token(&self, refresh_token: &str) -> AppResult<TokenPair> {
        with_deadline(self.config.request_timeout, self.refresh_inner(refresh_token)).await
    }

    #[tracing::instrument(skip(self))]
    async fn logout(&self, user_id: Uuid, access_jti: Option<String>) -> AppResult<()> {
        with_deadline(
            self.config.request_timeout,
            self.logout_inner(user_id, access_jti),
        )
        .await
    }

    #[tracing::instrument(skip(self, old_password, new_password))]
    async fn change_password(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        old_password: &str,
        new_password: &str,
    ) -> AppResult<()> {
        with_deadline(
            self.config.request_timeout,
            self.change_password_inner(tenant_id, user_id, old_password, new_password),
        )
        .await
    }

    #[tracing::instrument(skip(self))]
    async fn get_current_user(&self, tenant_id: Uuid, user_id: Uuid) -> AppResult<UserInfo> {
        with_deadline(
            self.config.request_timeout,
            self.current_user_inner(tenant_id, user_id),
        )
        .await
    }

    #[tracing::instrument(skip(self))]
    async fn force_logout(
        &self,
        actor_tenant_id: Uuid,
        target_tenant_id: Uuid,
        target_user_id: Uuid,
    ) -> AppResult<()> {
        with_deadline(
            self.config.request_timeout,
            self.force_logout_inner(actor_tenant_id, target_tenant_id, target_user_id),
        )
        .await
    }

    #[tracing::instrument(skip_all)]
    async fn validate_access_token(&self, token: &str) -> AppResult<AccessClaims> {
        with_deadline(self.config.request_timeout, self.validate_inner(token)).await
    }
}

/// Why this user cannot authenticate right now, if anything.
fn login_block(user: &User, now: DateTime<Utc>) -> Option<AppError> {
    if user.is_locked_at(now) {
        return Some(account_locked());
    }
    match user.status() {
        UserStatus::Deactivated => Some(AppError::auth(
            ErrorCode::AccountDeactivated,
            "Account is deactivated",
        )),
        UserStatus::Pending => Some(AppError::auth(
            ErrorCode::AccountPending,
            "Account is not activated yet",
        )),
        _ => None,
    }
}

fn account_locked() -> AppError {
    AppError::auth(ErrorCode::AccountLocked, "Account is locked")
}

fn revoked() -> AppError {
    AppError::auth(ErrorCode::TokenRevoked, "Token has been revoked")
}

/// How long a revocation must be kept for a token with `remaining`
/// lifetime. `exp` has whole-second precision and validation accepts the
/// expiry second itself plus the leeway.
fn tracked_for(remaining: chrono::Duration) -> StdDuration {
    let slack = chrono::Duration::seconds(VALIDATION_LEEWAY_SECS as i64 + 1);
    (remaining + slack)
        .to_std()
        .unwrap_or(StdDuration::from_secs(1))
        .max(StdDuration::from_secs(1))
}

/// Argon2 runs on the blocking pool. `None` verifies against a dummy hash.
async fn verify_off_thread(hash: Option<String>, plain_text: String) -> AppResult<bool> {
    tokio::task::spawn_blocking(move || match hash {
        Some(hash) => Password::from_hash(hash).verify(&plain_text),
        None => Password::verify_dummy(&plain_text),
    })
    .await
    .map_err(|e| AppError::internal(format!("password verification task failed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::{MockTokenBlacklist, MockTokenIssuer, RefreshClaims};
    use user_service_lib::events::MockEventPublisher;
    use user_service_lib::repository::{MockRoleRepository, MockUserRepository};

    const PASSWORD: &str = "Passw0rd1";

    fn config() -> AuthServiceConfig {
        AuthServiceConfig {
            max_failed_attempts: 3,
            ..AuthServiceConfig::with_secret("a-secret-that-is-at-least-32-chars-long")
        }
    }

    struct Mocks {
        users: MockUserRepository,
        roles: MockRoleRepository,
        issuer: MockTokenIssuer,
        blacklist: MockTokenBlacklist,
    }

    impl Mocks {
        fn new() -> Self {
            Self {
                users: MockUserRepository::new(),
                roles: MockRoleRepository::new(),
                issuer: MockTokenIssuer::new(),
                blacklist: MockTokenBlacklist::new(),
            }
        }

        fn build(self) -> Authenticator {
            let mut events = MockEventPublisher::new();
            events.expect_publish().returning(|_| Ok(()));
            Authenticator::new(
                Arc::new(self.users),
                Arc::new(self.roles),
                Arc::new(self.issuer),
                Arc::new(self.blacklist),
                Arc::new(events),
                config(),
            )
        }
    }

    fn request(tenant_id: Uuid, password: &str) -> LoginRequest {
        LoginRequest {
            tenant_id,
            username: "alice".into(),
            password: password.into(),
            client_ip: "10.0.0.1".into(),
        }
    }

    fn refresh_claims(user: &User, refresh_count: u32) -> RefreshClaims {
        let now = Utc::now();
        RefreshClaims {
            sub: user.id(),
            tenant_id: user.tenant_id(),
            token_type: "refresh".into(),
            refresh_count,
            jti: "refresh-jti".into(),
            iss: "erp-identity".into(),
            aud: "erp-identity".into(),
            exp: (now + chrono::Duration::hours(1)).timestamp(),
            nbf: now.timestamp(),
            iat: now.timestamp(),
            iat_ms: now.timestamp_millis(),
        }
    }

    #[tokio::test]
    async fn test_unknown_user_is_invalid_credentials() {
        let mut mocks = Mocks::new();
        mocks.users.expect_find_by_username().returning(|_, _| Ok(None));
        mocks.users.expect_update().never();

        let err = mocks
            .build()
            .login(request(Uuid::new_v4(), PASSWORD))
            .await
            .unwrap_err();
        assert!(err.is(ErrorCode::InvalidCredentials));
    }

    #[tokio::test]
    async fn test_wrong_password_persists_failure() {
        let tenant = Uuid::new_v4();
        let user = User::create_active(tenant, "alice", PASSWORD).unwrap();
        let loaded = user.version();

        let mut mocks = Mocks::new();
        mocks
            .users
            .expect_find_by_username()
            .returning(move |_, _| Ok(Some(user.clone())));
        mocks
            .users
            .expect_update()
            .withf(move |saved, expected| {
                *expected == ExpectedVersion::Exact(loaded) && saved.failed_attempts() == 1
            })
            .times(1)
            .returning(|_, _| Ok(()));
        mocks.issuer.expect_issue().never();

        let err = mocks
            .build()
            .login(request(tenant, "WrongPass1"))
            .await
            .unwrap_err();
        assert!(err.is(ErrorCode::InvalidCredentials));
    }

    #[tokio::test]
    async fn test_deactivated_user_refused_before_verification() {
        let tenant = Uuid::new_v4();
        let mut user = User::create_active(tenant, "alice", PASSWORD).unwrap();
        user.deactivate().unwrap();

        let mut mocks = Mocks::new();
        mocks
            .users
            .expect_find_by_username()
            .returning(move |_, _| Ok(Some(user.clone())));
        mocks.users.expect_update().never();

        let err = mocks
            .build()
            .login(request(tenant, "WrongPass1"))
            .await
            .unwrap_err();
        assert!(err.is(ErrorCode::AccountDeactivated));
    }

    #[tokio::test]
    async fn test_pending_user_refused() {
        let tenant = Uuid::new_v4();
        let user = User::create(tenant, "alice", PASSWORD).unwrap();

        let mut mocks = Mocks::new();
        mocks
            .users
            .expect_find_by_username()
            .returning(move |_, _| Ok(Some(user.clone())));

        let err = mocks
            .build()
            .login(request(tenant, PASSWORD))
            .await
            .unwrap_err();
        assert!(err.is(ErrorCode::AccountPending));
    }

    #[tokio::test]
    async fn test_refresh_limit_enforced() {
        let user = User::create_active(Uuid::new_v4(), "alice", PASSWORD).unwrap();
        let claims = refresh_claims(&user, 10);

        let mut mocks = Mocks::new();
        mocks
            .issuer
            .expect_validate_refresh()
            .returning(move |_| Ok(claims.clone()));
        mocks.issuer.expect_max_refresh_count().return_const(10u32);
        mocks.blacklist.expect_consume().never();

        let err = mocks.build().refresh_token("token").await.unwrap_err();
        assert!(err.is(ErrorCode::TokenRefreshLimitExceeded));
    }

    #[tokio::test]
    async fn test_refresh_reuse_is_revoked() {
        let user = User::create_active(Uuid::new_v4(), "alice", PASSWORD).unwrap();
        let claims = refresh_claims(&user, 0);

        let mut mocks = Mocks::new();
        mocks
            .issuer
            .expect_validate_refresh()
            .returning(move |_| Ok(claims.clone()));
        mocks.issuer.expect_max_refresh_count().return_const(10u32);
        mocks.issuer.expect_issue().never();
        mocks
            .blacklist
            .expect_user_invalidated_at()
            .returning(|_| Ok(None));
        mocks
            .blacklist
            .expect_consume()
            .withf(|jti, _| jti == "refresh-jti")
            .returning(|_, _| Ok(false));
        mocks
            .users
            .expect_find_by_id()
            .returning(move |_, _| Ok(Some(user.clone())));

        let err = mocks.build().refresh_token("token").await.unwrap_err();
        assert!(err.is(ErrorCode::TokenRevoked));
    }

    #[tokio::test]
    async fn test_consumed_refresh_tracked_for_remaining_lifetime() {
        let user = User::create_active(Uuid::new_v4(), "alice", PASSWORD).unwrap();
        let claims = refresh_claims(&user, 0);

        let mut mocks = Mocks::new();
        mocks
            .issuer
            .expect_validate_refresh()
            .returning(move |_| Ok(claims.clone()));
        mocks.issuer.expect_max_refresh_count().return_const(10u32);
        mocks
            .blacklist
            .expect_user_invalidated_at()
            .returning(|_| Ok(None));
        mocks
            .blacklist
            .expect_consume()
            .withf(|_, ttl| *ttl >= StdDuration::from_secs(3599))
            .times(1)
            .returning(|_, _| Ok(false));
        mocks
            .users
            .expect_find_by_id()
            .returning(move |_, _| Ok(Some(user.clone())));

        let err = mocks.build().refresh_token("token").await.unwrap_err();
        assert!(err.is(ErrorCode::TokenRevoked));
    }

    #[test]
    fn test_tracked_for_covers_expiry_second() {
        assert_eq!(
            tracked_for(chrono::Duration::hours(1)),
            StdDuration::from_secs(3601)
        );
        assert_eq!(
            tracked_for(chrono::Duration::milliseconds(-500)),
            StdDuration::from_secs(1)
        );
        assert_eq!(
            tracked_for(chrono::Duration::seconds(-30)),
            StdDuration::from_secs(1)
        );
    }

    #[tokio::test]
    async fn test_logout_swallows_blacklist_errors() {
        let mut mocks = Mocks::new();
        mocks
            .issuer
            .expect_access_ttl()
            .return_const(chrono::Duration::minutes(15));
        mocks
            .issuer
            .expect_refresh_ttl()
            .return_const(chrono::Duration::days(7));
        mocks
            .blacklist
            .expect_revoke()
            .times(1)
            .returning(|_, _| Err(AppError::internal("cache down")));
        mocks
            .blacklist
            .expect_invalidate_user()
            .times(1)
            .returning(|_, _, _| Err(AppError::internal("cache down")));

        let result = mocks
            .build()
            .logout(Uuid::new_v4(), Some("access-jti".into()))
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_force_logout_blacklist_failure_is_internal() {
        let mut mocks = Mocks::new();
        mocks.users.expect_exists_by_id().returning(|_, _| Ok(true));
        mocks
            .issuer
            .expect_refresh_ttl()
            .return_const(chrono::Duration::days(7));
        mocks
            .blacklist
            .expect_invalidate_user()
            .returning(|_, _, _| Err(AppError::internal("cache down")));

        let tenant = Uuid::new_v4();
        let err = mocks
            .build()
            .force_logout(tenant, tenant, Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));
        assert_eq!(err.code(), "INTERNAL_ERROR");
    }

    #[tokio::test]
    async fn test_force_logout_across_tenants_forbidden() {
        let mut mocks = Mocks::new();
        mocks.blacklist.expect_invalidate_user().never();

        let err = mocks
            .build()
            .force_logout(Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden));
    }
}
