//! User repository contract.

use async_trait::async_trait;
use uuid::Uuid;

use common::{AppResult, Page, PageRequest};
use domain::{ExpectedVersion, User, UserStatus};

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

/// Listing filter. Empty fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserFilter {
    /// Case-insensitive match on username, display name or email
    pub keyword: Option<String>,
    pub status: Option<UserStatus>,
    pub department_id: Option<Uuid>,
    pub role_id: Option<Uuid>,
}

/// User persistence, scoped by tenant.
///
/// Usernames and emails are unique within a tenant. `update` is a
/// compare-and-swap on the stored version and fails with a
/// `VERSION_CONFLICT` conflict when it does not match.
#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_id(&self, tenant_id: Uuid, id: Uuid) -> AppResult<Option<User>>;

    async fn find_by_username(&self, tenant_id: Uuid, username: &str) -> AppResult<Option<User>>;

    async fn find_by_email(&self, tenant_id: Uuid, email: &str) -> AppResult<Option<User>>;

    async fn exists_by_id(&self, tenant_id: Uuid, id: Uuid) -> AppResult<bool>;

    async fn exists_by_username(&self, tenant_id: Uuid, username: &str) -> AppResult<bool>;

    async fn exists_by_email(&self, tenant_id: Uuid, email: &str) -> AppResult<bool>;

    /// Insert a new user; rejects a duplicate username
    async fn create(&self, user: &User) -> AppResult<()>;

    async fn update(&self, user: &User, expected: ExpectedVersion) -> AppResult<()>;

    async fn delete(&self, tenant_id: Uuid, id: Uuid) -> AppResult<()>;

    /// Replace the stored role associations of a user
    async fn save_roles(&self, tenant_id: Uuid, user_id: Uuid, role_ids: &[Uuid]) -> AppResult<()>;

    async fn load_roles(&self, tenant_id: Uuid, user_id: Uuid) -> AppResult<Vec<Uuid>>;

    async fn list(&self, tenant_id: Uuid, filter: &UserFilter, page: PageRequest)
        -> AppResult<Page<User>>;

    async fn count(&self, tenant_id: Uuid, filter: &UserFilter) -> AppResult<u64>;
}
