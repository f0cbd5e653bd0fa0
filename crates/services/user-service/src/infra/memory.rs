//! In-memory repository adapters.
//!
//! Rows are kept in their flat record form and rehydrated on read, so every
//! caller works on its own copy. Updates are a compare-and-swap on the stored
//! version.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use common::{AppError, AppResult, Page, PageRequest};
use domain::{
    DataScope, DomainError, ErrorCode, ExpectedVersion, Permission, Role, RoleRecord, User,
    UserRecord,
};

use crate::repository::{RoleRepository, UserFilter, UserRepository};

fn paginate<T>(items: Vec<T>, page: PageRequest) -> Page<T> {
    let total = items.len() as u64;
    let limit = match page.limit() {
        0 => usize::MAX,
        n => n as usize,
    };
    let items = items
        .into_iter()
        .skip(page.offset() as usize)
        .take(limit)
        .collect();
    Page::new(items, page, total)
}

// ============================================================================
// Users
// ============================================================================

#[derive(Default)]
pub struct InMemoryUserStore {
    rows: RwLock<HashMap<Uuid, UserRecord>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Users in the tenant holding the role
    pub async fn count_with_role(&self, tenant_id: Uuid, role_id: Uuid) -> u64 {
        self.rows
            .read()
            .await
            .values()
            .filter(|r| r.tenant_id == tenant_id && r.role_ids.contains(&role_id))
            .count() as u64
    }

    fn matches(record: &UserRecord, filter: &UserFilter) -> bool {
        if let Some(status) = filter.status {
            if record.status != status {
                return false;
            }
        }
        if let Some(department_id) = filter.department_id {
            if record.department_id != Some(department_id) {
                return false;
            }
        }
        if let Some(role_id) = filter.role_id {
            if !record.role_ids.contains(&role_id) {
                return false;
            }
        }
        match filter.keyword.as_deref().map(str::trim) {
            Some(keyword) if !keyword.is_empty() => {
                let keyword = keyword.to_lowercase();
                record.username.contains(&keyword)
                    || record.email.contains(&keyword)
                    || record.display_name.to_lowercase().contains(&keyword)
            }
            _ => true,
        }
    }

    async fn filtered(&self, tenant_id: Uuid, filter: &UserFilter) -> Vec<UserRecord> {
        let mut rows: Vec<UserRecord> = self
            .rows
            .read()
            .await
            .values()
            .filter(|r| r.tenant_id == tenant_id && Self::matches(r, filter))
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.username.cmp(&b.username))
        });
        rows
    }

    async fn find_where(
        &self,
        tenant_id: Uuid,
        pred: impl Fn(&UserRecord) -> bool,
    ) -> Option<UserRecord> {
        self.rows
            .read()
            .await
            .values()
            .find(|r| r.tenant_id == tenant_id && pred(r))
            .cloned()
    }
}

fn email_taken(rows: &HashMap<Uuid, UserRecord>, record: &UserRecord) -> bool {
    !record.email.is_empty()
        && rows.values().any(|r| {
            r.tenant_id == record.tenant_id && r.id != record.id && r.email == record.email
        })
}

#[async_trait]
impl UserRepository for InMemoryUserStore {
    async fn find_by_id(&self, tenant_id: Uuid, id: Uuid) -> AppResult<Option<User>> {
        Ok(self.find_where(tenant_id, |r| r.id == id).await.map(User::restore))
    }

    async fn find_by_username(&self, tenant_id: Uuid, username: &str) -> AppResult<Option<User>> {
        let username = username.trim().to_lowercase();
        Ok(self
            .find_where(tenant_id, |r| r.username == username)
            .await
            .map(User::restore))
    }

    async fn find_by_email(&self, tenant_id: Uuid, email: &str) -> AppResult<Option<User>> {
        let email = email.trim().to_lowercase();
        if email.is_empty() {
            return Ok(None);
        }
        Ok(self
            .find_where(tenant_id, |r| r.email == email)
            .await
            .map(User::restore))
    }

    async fn exists_by_id(&self, tenant_id: Uuid, id: Uuid) -> AppResult<bool> {
        Ok(self.find_where(tenant_id, |r| r.id == id).await.is_some())
    }

    async fn exists_by_username(&self, tenant_id: Uuid, username: &str) -> AppResult<bool> {
        Ok(self.find_by_username(tenant_id, username).await?.is_some())
    }

    async fn exists_by_email(&self, tenant_id: Uuid, email: &str) -> AppResult<bool> {
        Ok(self.find_by_email(tenant_id, email).await?.is_some())
    }

    async fn create(&self, user: &User) -> AppResult<()> {
        let record = user.to_record();
        let mut rows = self.rows.write().await;

        if rows.values().any(|r| {
            r.tenant_id == record.tenant_id && r.username == record.username
        }) {
            return Err(AppError::conflict(
                ErrorCode::UsernameExists,
                format!("username '{}' already exists", record.username),
            ));
        }
        if email_taken(&rows, &record) {
            return Err(AppError::conflict(
                ErrorCode::EmailExists,
                format!("email '{}' already exists", record.email),
            ));
        }

        rows.insert(record.id, record);
        Ok(())
    }

    async fn update(&self, user: &User, expected: ExpectedVersion) -> AppResult<()> {
        let record = user.to_record();
        let mut rows = self.rows.write().await;

        let stored = rows
            .get(&record.id)
            .filter(|r| r.tenant_id == record.tenant_id)
            .ok_or_else(|| DomainError::not_found(ErrorCode::UserNotFound, "User not found"))?;
        expected.check(stored.version)?;

        if email_taken(&rows, &record) {
            return Err(AppError::conflict(
                ErrorCode::EmailExists,
                format!("email '{}' already exists", record.email),
            ));
        }

        rows.insert(record.id, record);
        Ok(())
    }

    async fn delete(&self, tenant_id: Uuid, id: Uuid) -> AppResult<()> {
        let mut rows = self.rows.write().await;
        if !rows.get(&id).is_some_and(|r| r.tenant_id == tenant_id) {
            return Err(DomainError::not_found(ErrorCode::UserNotFound, "User not found").into());
        }
        rows.remove(&id);
        Ok(())
    }

    async fn save_roles(&self, tenant_id: Uuid, user_id: Uuid, role_ids: &[Uuid]) -> AppResult<()> {
        let mut rows = self.rows.write().await;
        let row = rows
            .get_mut(&user_id)
            .filter(|r| r.tenant_id == tenant_id)
            .ok_or_else(|| DomainError::not_found(ErrorCode::UserNotFound, "User not found"))?;
        row.role_ids = role_ids.to_vec();
        Ok(())
    }

    async fn load_roles(&self, tenant_id: Uuid, user_id: Uuid) -> AppResult<Vec<Uuid>> {
        Ok(self
            .find_where(tenant_id, |r| r.id == user_id)
            .await
            .map(|r| r.role_ids)
            .unwrap_or_default())
    }

    async fn list(
        &self,
        tenant_id: Uuid,
        filter: &UserFilter,
        page: PageRequest,
    ) -> AppResult<Page<User>> {
        let rows = self.filtered(tenant_id, filter).await;
        Ok(paginate(rows, page).map(User::restore))
    }

    async fn count(&self, tenant_id: Uuid, filter: &UserFilter) -> AppResult<u64> {
        Ok(self.filtered(tenant_id, filter).await.len() as u64)
    }
}

// ============================================================================
// Roles
// ============================================================================

/// Role rows; holds the user store to answer role membership counts.
pub struct InMemoryRoleStore {
    rows: RwLock<HashMap<Uuid, RoleRecord>>,
    users: Arc<InMemoryUserStore>,
}

impl InMemoryRoleStore {
    pub fn new(users: Arc<InMemoryUserStore>) -> Self {
        Self {
            rows: RwLock::new(HashMap::new()),
            users,
        }
    }

    async fn tenant_rows(&self, tenant_id: Uuid) -> Vec<RoleRecord> {
        let mut rows: Vec<RoleRecord> = self
            .rows
            .read()
            .await
            .values()
            .filter(|r| r.tenant_id == tenant_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.sort_order.cmp(&b.sort_order).then_with(|| a.code.cmp(&b.code)));
        rows
    }

    async fn find_where(
        &self,
        tenant_id: Uuid,
        pred: impl Fn(&RoleRecord) -> bool,
    ) -> Option<RoleRecord> {
        self.rows
            .read()
            .await
            .values()
            .find(|r| r.tenant_id == tenant_id && pred(r))
            .cloned()
    }

    async fn with_row<T>(
        &self,
        tenant_id: Uuid,
        role_id: Uuid,
        f: impl FnOnce(&mut RoleRecord) -> T,
    ) -> AppResult<T> {
        let mut rows = self.rows.write().await;
        let row = rows
            .get_mut(&role_id)
            .filter(|r| r.tenant_id == tenant_id)
            .ok_or_else(|| DomainError::not_found(ErrorCode::RoleNotFound, "Role not found"))?;
        Ok(f(row))
    }
}

#[async_trait]
impl RoleRepository for InMemoryRoleStore {
    async fn find_by_id(&self, tenant_id: Uuid, id: Uuid) -> AppResult<Option<Role>> {
        Ok(self.find_where(tenant_id, |r| r.id == id).await.map(Role::restore))
    }

    async fn find_by_code(&self, tenant_id: Uuid, code: &str) -> AppResult<Option<Role>> {
        let code = code.trim().to_uppercase();
        Ok(self
            .find_where(tenant_id, |r| r.code == code)
            .await
            .map(Role::restore))
    }

    async fn find_by_ids(&self, tenant_id: Uuid, ids: &[Uuid]) -> AppResult<Vec<Role>> {
        let rows = self.rows.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| rows.get(id))
            .filter(|r| r.tenant_id == tenant_id)
            .cloned()
            .map(Role::restore)
            .collect())
    }

    async fn exists_by_id(&self, tenant_id: Uuid, id: Uuid) -> AppResult<bool> {
        Ok(self.find_where(tenant_id, |r| r.id == id).await.is_some())
    }

    async fn exists_by_code(&self, tenant_id: Uuid, code: &str) -> AppResult<bool> {
        Ok(self.find_by_code(tenant_id, code).await?.is_some())
    }

    async fn create(&self, role: &Role) -> AppResult<()> {
        let record = role.to_record();
        let mut rows = self.rows.write().await;

        if rows
            .values()
            .any(|r| r.tenant_id == record.tenant_id && r.code == record.code)
        {
            return Err(AppError::conflict(
                ErrorCode::RoleCodeExists,
                format!("role code '{}' already exists", record.code),
            ));
        }

        rows.insert(record.id, record);
        Ok(())
    }

    async fn update(&self, role: &Role, expected: ExpectedVersion) -> AppResult<()> {
        let record = role.to_record();
        let mut rows = self.rows.write().await;

        let stored = rows
            .get(&record.id)
            .filter(|r| r.tenant_id == record.tenant_id)
            .ok_or_else(|| DomainError::not_found(ErrorCode::RoleNotFound, "Role not found"))?;
        expected.check(stored.version)?;

        rows.insert(record.id, record);
        Ok(())
    }

    async fn delete(&self, tenant_id: Uuid, id: Uuid) -> AppResult<()> {
        let mut rows = self.rows.write().await;
        if !rows.get(&id).is_some_and(|r| r.tenant_id == tenant_id) {
            return Err(DomainError::not_found(ErrorCode::RoleNotFound, "Role not found").into());
        }
        rows.remove(&id);
        Ok(())
    }

    async fn save_permissions(
        &self,
        tenant_id: Uuid,
        role_id: Uuid,
        permissions: &[Permission],
    ) -> AppResult<()> {
        self.with_row(tenant_id, role_id, |row| {
            row.permissions = permissions.to_vec();
        })
        .await
    }

    async fn load_permissions(&self, tenant_id: Uuid, role_id: Uuid) -> AppResult<Vec<Permission>> {
        Ok(self
            .find_where(tenant_id, |r| r.id == role_id)
            .await
            .map(|r| r.permissions)
            .unwrap_or_default())
    }

    async fn save_data_scopes(
        &self,
        tenant_id: Uuid,
        role_id: Uuid,
        scopes: &[DataScope],
    ) -> AppResult<()> {
        self.with_row(tenant_id, role_id, |row| {
            row.data_scopes = scopes.to_vec();
        })
        .await
    }

    async fn load_data_scopes(&self, tenant_id: Uuid, role_id: Uuid) -> AppResult<Vec<DataScope>> {
        Ok(self
            .find_where(tenant_id, |r| r.id == role_id)
            .await
            .map(|r| r.data_scopes)
            .unwrap_or_default())
    }

    async fn count_users_with_role(&self, tenant_id: Uuid, role_id: Uuid) -> AppResult<u64> {
        Ok(self.users.count_with_role(tenant_id, role_id).await)
    }

    async fn find_by_permission_code(&self, tenant_id: Uuid, code: &str) -> AppResult<Vec<Role>> {
        let code = code.trim().to_lowercase();
        Ok(self
            .tenant_rows(tenant_id)
            .await
            .into_iter()
            .filter(|r| r.permissions.iter().any(|p| p.code() == code))
            .map(Role::restore)
            .collect())
    }

    async fn list(&self, tenant_id: Uuid, page: PageRequest) -> AppResult<Page<Role>> {
        let rows = self.tenant_rows(tenant_id).await;
        Ok(paginate(rows, page).map(Role::restore))
    }

    async fn count(&self, tenant_id: Uuid) -> AppResult<u64> {
        Ok(self.tenant_rows(tenant_id).await.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stores() -> (Arc<InMemoryUserStore>, InMemoryRoleStore) {
        let users = Arc::new(InMemoryUserStore::new());
        let roles = InMemoryRoleStore::new(users.clone());
        (users, roles)
    }

    #[tokio::test]
    async fn test_user_update_is_compare_and_swap() {
        let (users, _) = stores();
        let tenant = Uuid::new_v4();
        let user = User::create(tenant, "alice", "Passw0rd1").unwrap();
        users.create(&user).await.unwrap();

        let mut first = users.find_by_id(tenant, user.id()).await.unwrap().unwrap();
        let mut second = first.clone();
        let loaded = first.version();

        first.activate().unwrap();
        users.update(&first, ExpectedVersion::Exact(loaded)).await.unwrap();

        second.set_notes("stale");
        let err = users
            .update(&second, ExpectedVersion::Exact(loaded))
            .await
            .unwrap_err();
        assert!(err.is(ErrorCode::VersionConflict));

        let stored = users.find_by_id(tenant, user.id()).await.unwrap().unwrap();
        assert!(stored.is_active());
        assert_eq!(stored.version(), loaded + 1);
    }

    #[tokio::test]
    async fn test_username_unique_per_tenant() {
        let (users, _) = stores();
        let tenant = Uuid::new_v4();
        users
            .create(&User::create(tenant, "bob", "Passw0rd1").unwrap())
            .await
            .unwrap();

        let err = users
            .create(&User::create(tenant, "BOB", "Passw0rd1").unwrap())
            .await
            .unwrap_err();
        assert!(err.is(ErrorCode::UsernameExists));

        // Same name in another tenant is fine
        users
            .create(&User::create(Uuid::new_v4(), "bob", "Passw0rd1").unwrap())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_tenant_isolation_on_lookup() {
        let (users, _) = stores();
        let tenant = Uuid::new_v4();
        let user = User::create(tenant, "carol", "Passw0rd1").unwrap();
        users.create(&user).await.unwrap();

        assert!(users.find_by_id(Uuid::new_v4(), user.id()).await.unwrap().is_none());
        assert!(users.find_by_username(tenant, " Carol ").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_role_code_conflict_any_case() {
        let (_, roles) = stores();
        let tenant = Uuid::new_v4();
        let role = Role::create(tenant, "sales_rep", "Sales").unwrap();
        assert_eq!(role.code(), "SALES_REP");
        roles.create(&role).await.unwrap();

        let err = roles
            .create(&Role::create(tenant, "Sales_Rep", "Other").unwrap())
            .await
            .unwrap_err();
        assert!(err.is(ErrorCode::RoleCodeExists));
        assert!(roles.exists_by_code(tenant, "sales_rep").await.unwrap());
    }

    #[tokio::test]
    async fn test_count_users_with_role() {
        let (users, roles) = stores();
        let tenant = Uuid::new_v4();
        let role = Role::create(tenant, "clerk", "Clerk").unwrap();
        roles.create(&role).await.unwrap();

        let user = User::create(tenant, "dave", "Passw0rd1").unwrap();
        users.create(&user).await.unwrap();
        users.save_roles(tenant, user.id(), &[role.id()]).await.unwrap();

        assert_eq!(roles.count_users_with_role(tenant, role.id()).await.unwrap(), 1);
        assert_eq!(users.load_roles(tenant, user.id()).await.unwrap(), vec![role.id()]);
    }

    #[tokio::test]
    async fn test_list_paginates() {
        let (users, _) = stores();
        let tenant = Uuid::new_v4();
        for name in ["u1", "u2", "u3", "u4", "u5"] {
            let name = format!("{name}xx");
            users
                .create(&User::create(tenant, &name, "Passw0rd1").unwrap())
                .await
                .unwrap();
        }

        let page = users
            .list(tenant, &UserFilter::default(), PageRequest::new(2, 2))
            .await
            .unwrap();
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.total, 5);
        assert_eq!(page.total_pages, 3);

        let last = users
            .list(tenant, &UserFilter::default(), PageRequest::new(4, 2))
            .await
            .unwrap();
        assert!(last.items.is_empty());
    }
}
