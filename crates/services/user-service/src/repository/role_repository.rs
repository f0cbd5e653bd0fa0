//! Role repository contract.

use async_trait::async_trait;
use uuid::Uuid;

use common::{AppResult, Page, PageRequest};
use domain::{DataScope, ExpectedVersion, Permission, Role};

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

/// Role persistence, scoped by tenant.
///
/// Role codes are unique within a tenant. `update` is a compare-and-swap on
/// the stored version.
#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait RoleRepository: Send + Sync {
    async fn find_by_id(&self, tenant_id: Uuid, id: Uuid) -> AppResult<Option<Role>>;

    async fn find_by_code(&self, tenant_id: Uuid, code: &str) -> AppResult<Option<Role>>;

    /// Roles among `ids` that exist in the tenant, in the order given
    async fn find_by_ids(&self, tenant_id: Uuid, ids: &[Uuid]) -> AppResult<Vec<Role>>;

    async fn exists_by_id(&self, tenant_id: Uuid, id: Uuid) -> AppResult<bool>;

    async fn exists_by_code(&self, tenant_id: Uuid, code: &str) -> AppResult<bool>;

    /// Insert a new role; rejects a duplicate code
    async fn create(&self, role: &Role) -> AppResult<()>;

    async fn update(&self, role: &Role, expected: ExpectedVersion) -> AppResult<()>;

    async fn delete(&self, tenant_id: Uuid, id: Uuid) -> AppResult<()>;

    async fn save_permissions(
        &self,
        tenant_id: Uuid,
        role_id: Uuid,
        permissions: &[Permission],
    ) -> AppResult<()>;

    async fn load_permissions(&self, tenant_id: Uuid, role_id: Uuid) -> AppResult<Vec<Permission>>;

    async fn save_data_scopes(
        &self,
        tenant_id: Uuid,
        role_id: Uuid,
        scopes: &[DataScope],
    ) -> AppResult<()>;

    async fn load_data_scopes(&self, tenant_id: Uuid, role_id: Uuid) -> AppResult<Vec<DataScope>>;

    async fn count_users_with_role(&self, tenant_id: Uuid, role_id: Uuid) -> AppResult<u64>;

    /// Roles granting the permission code
    async fn find_by_permission_code(&self, tenant_id: Uuid, code: &str) -> AppResult<Vec<Role>>;

    async fn list(&self, tenant_id: Uuid, page: PageRequest) -> AppResult<Page<Role>>;

    async fn count(&self, tenant_id: Uuid) -> AppResult<u64>;
}
