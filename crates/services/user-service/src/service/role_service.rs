//! Role service - role catalogue, permissions and data scopes.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use uuid::Uuid;

use common::{with_deadline, AppError, AppResult, OptionExt, Page, PageRequest, PaginationConfig};
use domain::{DataScope, ErrorCode, ExpectedVersion, Permission, Role};

use crate::events::{publish_after_save, EventPublisher};
use crate::repository::RoleRepository;

/// Input for creating a role
#[derive(Debug, Clone, Default)]
pub struct CreateRoleInput {
    pub tenant_id: Uuid,
    pub code: String,
    pub name: String,
    pub description: String,
    pub sort_order: i32,
    pub is_system_role: bool,
    /// Permission codes, `resource:action`
    pub permissions: Vec<String>,
    pub data_scopes: Vec<DataScope>,
}

/// Input for updating role details. `None` keeps the current value.
#[derive(Debug, Clone, Default)]
pub struct UpdateRoleInput {
    pub name: Option<String>,
    pub description: Option<String>,
    pub sort_order: Option<i32>,
}

/// Role service trait for dependency injection.
///
/// Every operation is scoped to one tenant. Saves are optimistic: a
/// concurrent modification surfaces as a `VERSION_CONFLICT` conflict.
#[async_trait]
pub trait RoleService: Send + Sync {
    async fn create_role(&self, input: CreateRoleInput) -> AppResult<Role>;

    async fn get_role(&self, tenant_id: Uuid, role_id: Uuid) -> AppResult<Role>;

    async fn get_role_by_code(&self, tenant_id: Uuid, code: &str) -> AppResult<Role>;

    async fn update_role(
        &self,
        tenant_id: Uuid,
        role_id: Uuid,
        input: UpdateRoleInput,
    ) -> AppResult<Role>;

    /// Fails for system roles and for roles still held by users
    async fn delete_role(&self, tenant_id: Uuid, role_id: Uuid) -> AppResult<()>;

    async fn enable_role(&self, tenant_id: Uuid, role_id: Uuid) -> AppResult<Role>;

    async fn disable_role(&self, tenant_id: Uuid, role_id: Uuid) -> AppResult<Role>;

    async fn grant_permission(&self, tenant_id: Uuid, role_id: Uuid, code: &str)
        -> AppResult<Role>;

    async fn revoke_permission(
        &self,
        tenant_id: Uuid,
        role_id: Uuid,
        code: &str,
    ) -> AppResult<Role>;

    /// Replace the whole permission set
    async fn set_permissions(
        &self,
        tenant_id: Uuid,
        role_id: Uuid,
        codes: Vec<String>,
    ) -> AppResult<Role>;

    async fn set_data_scope(
        &self,
        tenant_id: Uuid,
        role_id: Uuid,
        scope: DataScope,
    ) -> AppResult<Role>;

    async fn remove_data_scope(
        &self,
        tenant_id: Uuid,
        role_id: Uuid,
        resource: &str,
    ) -> AppResult<Role>;

    async fn list_roles(&self, tenant_id: Uuid, page: PageRequest) -> AppResult<Page<Role>>;

    /// Roles granting the permission code
    async fn roles_with_permission(&self, tenant_id: Uuid, code: &str) -> AppResult<Vec<Role>>;
}

/// Concrete implementation of RoleService using repository.
pub struct RoleManager {
    roles: Arc<dyn RoleRepository>,
    events: Arc<dyn EventPublisher>,
    pagination: PaginationConfig,
    request_timeout: Option<StdDuration>,
}

/// Child collections written alongside the role row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Children {
    None,
    Permissions,
    DataScopes,
}

impl RoleManager {
    pub fn new(roles: Arc<dyn RoleRepository>, events: Arc<dyn EventPublisher>) -> Self {
        Self {
            roles,
            events,
            pagination: PaginationConfig::default(),
            request_timeout: None,
        }
    }

    pub fn with_pagination(mut self, pagination: PaginationConfig) -> Self {
        self.pagination = pagination;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Option<StdDuration>) -> Self {
        self.request_timeout = timeout;
        self
    }

    async fn load(&self, tenant_id: Uuid, role_id: Uuid) -> AppResult<Role> {
        self.roles
            .find_by_id(tenant_id, role_id)
            .await?
            .ok_or_not_found(ErrorCode::RoleNotFound)
    }

    async fn load_by_code(&self, tenant_id: Uuid, code: &str) -> AppResult<Role> {
        self.roles
            .find_by_code(tenant_id, code)
            .await?
            .ok_or_not_found(ErrorCode::RoleNotFound)
    }

    async fn save_children(&self, role: &Role, children: Children) -> AppResult<()> {
        match children {
            Children::None => Ok(()),
            Children::Permissions => {
                self.roles
                    .save_permissions(role.tenant_id(), role.id(), role.permissions())
                    .await
            }
            Children::DataScopes => {
                self.roles
                    .save_data_scopes(role.tenant_id(), role.id(), role.data_scopes())
                    .await
            }
        }
    }

    /// Persist the row against the version seen at load, then the
    /// children. Events go out only once both are stored.
    async fn save(&self, mut role: Role, loaded: u64, children: Children) -> AppResult<Role> {
        self.roles
            .update(&role, ExpectedVersion::Exact(loaded))
            .await?;
        self.save_children(&role, children).await?;
        publish_after_save(self.events.as_ref(), role.drain_events()).await;
        Ok(role)
    }

    /// Load, apply one mutation, save.
    async fn mutate(
        &self,
        tenant_id: Uuid,
        role_id: Uuid,
        children: Children,
        f: impl FnOnce(&mut Role) -> AppResult<()> + Send,
    ) -> AppResult<Role> {
        let mut role = self.load(tenant_id, role_id).await?;
        let loaded = role.version();
        f(&mut role)?;
        self.save(role, loaded, children).await
    }

    async fn create_inner(&self, input: CreateRoleInput) -> AppResult<Role> {
        let mut role = if input.is_system_role {
            Role::create_system(input.tenant_id, &input.code, &input.name)?
        } else {
            Role::create(input.tenant_id, &input.code, &input.name)?
        };

        if self.roles.exists_by_code(input.tenant_id, role.code()).await? {
            return Err(AppError::conflict(
                ErrorCode::RoleCodeExists,
                format!("role code '{}' already exists", role.code()),
            ));
        }

        if !input.description.is_empty() {
            role.set_description(&input.description);
        }
        if input.sort_order != 0 {
            role.set_sort_order(input.sort_order);
        }
        if !input.permissions.is_empty() {
            role.set_permissions(parse_permissions(&input.permissions)?);
        }
        if !input.data_scopes.is_empty() {
            role.set_data_scopes(input.data_scopes);
        }

        self.roles.create(&role).await?;
        if !role.permissions().is_empty() {
            self.save_children(&role, Children::Permissions).await?;
        }
        if !role.data_scopes().is_empty() {
            self.save_children(&role, Children::DataScopes).await?;
        }
        tracing::info!(role_id = %role.id(), "Role created");

        publish_after_save(self.events.as_ref(), role.drain_events()).await;
        Ok(role)
    }

    async fn delete_inner(&self, tenant_id: Uuid, role_id: Uuid) -> AppResult<()> {
        let mut role = self.load(tenant_id, role_id).await?;
        role.mark_deleted()?;

        let holders = self.roles.count_users_with_role(tenant_id, role_id).await?;
        if holders > 0 {
            return Err(AppError::state(
                ErrorCode::RoleInUse,
                format!("role is assigned to {holders} user(s)"),
            ));
        }

        self.roles.delete(tenant_id, role_id).await?;
        tracing::info!(code = role.code(), "Role deleted");

        publish_after_save(self.events.as_ref(), role.drain_events()).await;
        Ok(())
    }
}

fn parse_permissions(codes: &[String]) -> AppResult<Vec<Permission>> {
    codes
        .iter()
        .map(|code| Permission::from_code(code).map_err(AppError::from))
        .collect()
}

#[async_trait]
impl RoleService for RoleManager {
    #[tracing::instrument(skip(self, input), fields(tenant_id = %input.tenant_id, code = %input.code))]
    async fn create_role(&self, input: CreateRoleInput) -> AppResult<Role> {
        with_deadline(self.request_timeout, self.create_inner(input)).await
    }

    async fn get_role(&self, tenant_id: Uuid, role_id: Uuid) -> AppResult<Role> {
        with_deadline(self.request_timeout, self.load(tenant_id, role_id)).await
    }

    async fn get_role_by_code(&self, tenant_id: Uuid, code: &str) -> AppResult<Role> {
        with_deadline(self.request_timeout, self.load_by_code(tenant_id, code)).await
    }

    #[tracing::instrument(skip(self, input))]
    async fn update_role(
        &self,
        tenant_id: Uuid,
        role_id: Uuid,
        input: UpdateRoleInput,
    ) -> AppResult<Role> {
        let update = self.mutate(tenant_id, role_id, Children::None, |role| {
            if input.name.is_some() || input.description.is_some() {
                let name = input.name.unwrap_or_else(|| role.name().to_string());
                let description = input
                    .description
                    .unwrap_or_else(|| role.description().to_string());
                role.update(&name, &description)?;
            }
            if let Some(sort_order) = input.sort_order {
                role.set_sort_order(sort_order);
            }
            Ok(())
        });
        with_deadline(self.request_timeout, update).await
    }

    #[tracing::instrument(skip(self))]
    async fn delete_role(&self, tenant_id: Uuid, role_id: Uuid) -> AppResult<()> {
        with_deadline(self.request_timeout, self.delete_inner(tenant_id, role_id)).await
    }

    #[tracing::instrument(skip(self))]
    async fn enable_role(&self, tenant_id: Uuid, role_id: Uuid) -> AppResult<Role> {
        let enable = self.mutate(tenant_id, role_id, Children::None, |role| Ok(role.enable()?));
        with_deadline(self.request_timeout, enable).await
    }

    #[tracing::instrument(skip(self))]
    async fn disable_role(&self, tenant_id: Uuid, role_id: Uuid) -> AppResult<Role> {
        let disable = self.mutate(tenant_id, role_id, Children::None, |role| Ok(role.disable()?));
        with_deadline(self.request_timeout, disable).await
    }

    #[tracing::instrument(skip(self))]
    async fn grant_permission(
        &self,
        tenant_id: Uuid,
        role_id: Uuid,
        code: &str,
    ) -> AppResult<Role> {
        let grant = self.mutate(tenant_id, role_id, Children::Permissions, |role| {
            Ok(role.grant_permission_by_code(code)?)
        });
        with_deadline(self.request_timeout, grant).await
    }

    #[tracing::instrument(skip(self))]
    async fn revoke_permission(
        &self,
        tenant_id: Uuid,
        role_id: Uuid,
        code: &str,
    ) -> AppResult<Role> {
        let revoke = self.mutate(tenant_id, role_id, Children::Permissions, |role| {
            Ok(role.revoke_permission(code)?)
        });
        with_deadline(self.request_timeout, revoke).await
    }

    #[tracing::instrument(skip(self, codes))]
    async fn set_permissions(
        &self,
        tenant_id: Uuid,
        role_id: Uuid,
        codes: Vec<String>,
    ) -> AppResult<Role> {
        let permissions = parse_permissions(&codes)?;
        let set = self.mutate(tenant_id, role_id, Children::Permissions, |role| {
            role.set_permissions(permissions);
            Ok(())
        });
        with_deadline(self.request_timeout, set).await
    }

    #[tracing::instrument(skip(self, scope), fields(resource = scope.resource()))]
    async fn set_data_scope(
        &self,
        tenant_id: Uuid,
        role_id: Uuid,
        scope: DataScope,
    ) -> AppResult<Role> {
        let set = self.mutate(tenant_id, role_id, Children::DataScopes, |role| {
            role.set_data_scope(scope);
            Ok(())
        });
        with_deadline(self.request_timeout, set).await
    }

    #[tracing::instrument(skip(self))]
    async fn remove_data_scope(
        &self,
        tenant_id: Uuid,
        role_id: Uuid,
        resource: &str,
    ) -> AppResult<Role> {
        let remove = self.mutate(tenant_id, role_id, Children::DataScopes, |role| {
            Ok(role.remove_data_scope(resource)?)
        });
        with_deadline(self.request_timeout, remove).await
    }

    async fn list_roles(&self, tenant_id: Uuid, page: PageRequest) -> AppResult<Page<Role>> {
        let list = self
            .roles
            .list(tenant_id, page.normalize(&self.pagination));
        with_deadline(self.request_timeout, list).await
    }

    async fn roles_with_permission(&self, tenant_id: Uuid, code: &str) -> AppResult<Vec<Role>> {
        let permission = Permission::from_code(code)?;
        let find = self
            .roles
            .find_by_permission_code(tenant_id, permission.code());
        with_deadline(self.request_timeout, find).await
    }
}
