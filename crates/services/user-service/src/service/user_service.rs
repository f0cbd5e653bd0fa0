//! User service - Handles user-related business logic.
//!
//! Account administration only. Credential checks at login live in the
//! authentication service.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::Duration;
use uuid::Uuid;

use common::{with_deadline, AppError, AppResult, OptionExt, Page, PageRequest, PaginationConfig};
use domain::{AccessProfile, DomainError, ErrorCode, ExpectedVersion, Role, User};

use crate::events::{publish_after_save, EventPublisher};
use crate::repository::{RoleRepository, UserFilter, UserRepository};

/// Input for creating a user
#[derive(Debug, Clone, Default)]
pub struct CreateUserInput {
    pub tenant_id: Uuid,
    pub username: String,
    pub password: String,
    pub email: String,
    pub phone: String,
    pub display_name: String,
    pub department_id: Option<Uuid>,
    pub role_ids: Vec<Uuid>,
    /// Skip the `pending` state
    pub active: bool,
}

/// Profile changes. `None` keeps the current value.
#[derive(Debug, Clone, Default)]
pub struct UpdateProfileInput {
    pub email: Option<String>,
    pub phone: Option<String>,
    pub display_name: Option<String>,
    pub avatar: Option<String>,
    /// `Some(None)` clears the department
    pub department_id: Option<Option<Uuid>>,
    pub notes: Option<String>,
}

/// User service trait for dependency injection.
#[async_trait]
pub trait UserService: Send + Sync {
    /// Create a user; username and email are unique within the tenant
    async fn create_user(&self, input: CreateUserInput) -> AppResult<User>;

    async fn get_user(&self, tenant_id: Uuid, user_id: Uuid) -> AppResult<User>;

    async fn get_user_by_username(&self, tenant_id: Uuid, username: &str) -> AppResult<User>;

    async fn update_profile(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        input: UpdateProfileInput,
    ) -> AppResult<User>;

    /// Permanently delete user
    async fn delete_user(&self, tenant_id: Uuid, user_id: Uuid) -> AppResult<()>;

    async fn activate_user(&self, tenant_id: Uuid, user_id: Uuid) -> AppResult<User>;

    async fn deactivate_user(&self, tenant_id: Uuid, user_id: Uuid) -> AppResult<User>;

    /// Lock the account; a zero duration locks until unlocked
    async fn lock_user(&self, tenant_id: Uuid, user_id: Uuid, duration: Duration)
        -> AppResult<User>;

    async fn unlock_user(&self, tenant_id: Uuid, user_id: Uuid) -> AppResult<User>;

    /// Administrative reset; the user must change it at next login
    async fn reset_password(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        new_password: &str,
    ) -> AppResult<User>;

    /// Replace the user's roles; every role must exist in the tenant
    async fn assign_roles(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        role_ids: Vec<Uuid>,
    ) -> AppResult<User>;

    async fn list_users(
        &self,
        tenant_id: Uuid,
        filter: UserFilter,
        page: PageRequest,
    ) -> AppResult<Page<User>>;

    async fn count_users(&self, tenant_id: Uuid, filter: UserFilter) -> AppResult<u64>;

    /// Effective permissions and data scopes across the user's enabled roles
    async fn access_profile(&self, tenant_id: Uuid, user_id: Uuid) -> AppResult<AccessProfile>;
}

/// Concrete implementation of UserService using repositories.
pub struct UserManager {
    users: Arc<dyn UserRepository>,
    roles: Arc<dyn RoleRepository>,
    events: Arc<dyn EventPublisher>,
    pagination: PaginationConfig,
    request_timeout: Option<StdDuration>,
}

impl UserManager {
    pub fn new(
        users: Arc<dyn UserRepository>,
        roles: Arc<dyn RoleRepository>,
        events: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            users,
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

    async fn load(&self, tenant_id: Uuid, user_id: Uuid) -> AppResult<User> {
        self.users
            .find_by_id(tenant_id, user_id)
            .await?
            .ok_or_not_found(ErrorCode::UserNotFound)
    }

    async fn load_by_username(&self, tenant_id: Uuid, username: &str) -> AppResult<User> {
        self.users
            .find_by_username(tenant_id, username)
            .await?
            .ok_or_not_found(ErrorCode::UserNotFound)
    }

    /// Persist against the loaded version, and the role rows when they
    /// changed. Events go out only once everything is stored.
    async fn save(&self, mut user: User, loaded: u64, roles_changed: bool) -> AppResult<User> {
        self.users
            .update(&user, ExpectedVersion::Exact(loaded))
            .await?;
        if roles_changed {
            self.users
                .save_roles(user.tenant_id(), user.id(), user.role_ids())
                .await?;
        }
        publish_after_save(self.events.as_ref(), user.drain_events()).await;
        Ok(user)
    }

    async fn mutate(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        f: impl FnOnce(&mut User) -> AppResult<()> + Send,
    ) -> AppResult<User> {
        let mut user = self.load(tenant_id, user_id).await?;
        let loaded = user.version();
        f(&mut user)?;
        self.save(user, loaded, false).await
    }

    /// All ids must name roles in the tenant.
    async fn resolve_roles(&self, tenant_id: Uuid, role_ids: &[Uuid]) -> AppResult<Vec<Role>> {
        let mut unique: Vec<Uuid> = Vec::with_capacity(role_ids.len());
        for id in role_ids {
            if !unique.contains(id) {
                unique.push(*id);
            }
        }
        let roles = self.roles.find_by_ids(tenant_id, &unique).await?;
        if let Some(missing) = unique.iter().find(|id| !roles.iter().any(|r| r.id() == **id)) {
            return Err(DomainError::not_found(
                ErrorCode::RoleNotFound,
                format!("role {missing} not found"),
            )
            .into());
        }
        Ok(roles)
    }

    async fn ensure_email_free(
        &self,
        tenant_id: Uuid,
        email: &str,
        owner: Option<Uuid>,
    ) -> AppResult<()> {
        let email = email.trim();
        if email.is_empty() {
            return Ok(());
        }
        if let Some(existing) = self.users.find_by_email(tenant_id, email).await? {
            if Some(existing.id()) != owner {
                return Err(AppError::conflict(
                    ErrorCode::EmailExists,
                    format!("email '{}' already exists", existing.email()),
                ));
            }
        }
        Ok(())
    }

    async fn create_inner(&self, input: CreateUserInput) -> AppResult<User> {
        let mut user = if input.active {
            User::create_active(input.tenant_id, &input.username, &input.password)?
        } else {
            User::create(input.tenant_id, &input.username, &input.password)?
        };

        if self
            .users
            .exists_by_username(input.tenant_id, user.username())
            .await?
        {
            return Err(AppError::conflict(
                ErrorCode::UsernameExists,
                format!("username '{}' already exists", user.username()),
            ));
        }
        self.ensure_email_free(input.tenant_id, &input.email, None)
            .await?;

        if !input.email.is_empty() {
            user.set_email(&input.email)?;
        }
        if !input.phone.is_empty() {
            user.set_phone(&input.phone)?;
        }
        if !input.display_name.is_empty() {
            user.set_display_name(&input.display_name)?;
        }
        if input.department_id.is_some() {
            user.set_department(input.department_id);
        }
        if !input.role_ids.is_empty() {
            self.resolve_roles(input.tenant_id, &input.role_ids).await?;
            user.set_roles(&input.role_ids)?;
        }

        self.users.create(&user).await?;
        if !user.role_ids().is_empty() {
            self.users
                .save_roles(user.tenant_id(), user.id(), user.role_ids())
                .await?;
        }
        tracing::info!(user_id = %user.id(), "User created");

        publish_after_save(self.events.as_ref(), user.drain_events()).await;
        Ok(user)
    }

    async fn update_profile_inner(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        input: UpdateProfileInput,
    ) -> AppResult<User> {
        if let Some(email) = &input.email {
            self.ensure_email_free(tenant_id, email, Some(user_id))
                .await?;
        }

        self.mutate(tenant_id, user_id, |user| {
            if let Some(email) = &input.email {
                user.set_email(email)?;
            }
            if let Some(phone) = &input.phone {
                user.set_phone(phone)?;
            }
            if let Some(display_name) = &input.display_name {
                user.set_display_name(display_name)?;
            }
            if let Some(avatar) = &input.avatar {
                user.set_avatar(avatar)?;
            }
            if let Some(department_id) = input.department_id {
                user.set_department(department_id);
            }
            if let Some(notes) = &input.notes {
                user.set_notes(notes);
            }
            Ok(())
        })
        .await
    }

    async fn delete_inner(&self, tenant_id: Uuid, user_id: Uuid) -> AppResult<()> {
        self.users.delete(tenant_id, user_id).await?;
        tracing::info!("User deleted");
        Ok(())
    }

    async fn lock_inner(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        duration: Duration,
    ) -> AppResult<User> {
        let user = self
            .mutate(tenant_id, user_id, |user| Ok(user.lock(duration)?))
            .await?;
        tracing::warn!(locked_until = ?user.locked_until(), "User locked by administrator");
        Ok(user)
    }

    async fn assign_roles_inner(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        role_ids: Vec<Uuid>,
    ) -> AppResult<User> {
        self.resolve_roles(tenant_id, &role_ids).await?;
        let mut user = self.load(tenant_id, user_id).await?;
        let loaded = user.version();
        user.set_roles(&role_ids)?;
        self.save(user, loaded, true).await
    }

    async fn access_profile_inner(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
    ) -> AppResult<AccessProfile> {
        let user = self.load(tenant_id, user_id).await?;
        let roles = self.roles.find_by_ids(tenant_id, user.role_ids()).await?;
        Ok(AccessProfile::resolve(user.id(), tenant_id, &roles))
    }
}

#[async_trait]
impl UserService for UserManager {
    #[tracing::instrument(skip(self, input), fields(tenant_id = %input.tenant_id, username = %input.username))]
    async fn create_user(&self, input: CreateUserInput) -> AppResult<User> {
        with_deadline(self.request_timeout, self.create_inner(input)).await
    }

    async fn get_user(&self, tenant_id: Uuid, user_id: Uuid) -> AppResult<User> {
        with_deadline(self.request_timeout, self.load(tenant_id, user_id)).await
    }

    async fn get_user_by_username(&self, tenant_id: Uuid, username: &str) -> AppResult<User> {
        with_deadline(self.request_timeout, self.load_by_username(tenant_id, username)).await
    }

    #[tracing::instrument(skip(self, input))]
    async fn update_profile(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        input: UpdateProfileInput,
    ) -> AppResult<User> {
        with_deadline(
            self.request_timeout,
            self.update_profile_inner(tenant_id, user_id, input),
        )
        .await
    }

    #[tracing::instrument(skip(self))]
    async fn delete_user(&self, tenant_id: Uuid, user_id: Uuid) -> AppResult<()> {
        with_deadline(self.request_timeout, self.delete_inner(tenant_id, user_id)).await
    }

    #[tracing::instrument(skip(self))]
    async fn activate_user(&self, tenant_id: Uuid, user_id: Uuid) -> AppResult<User> {
        let activate = self.mutate(tenant_id, user_id, |user| Ok(user.activate()?));
        with_deadline(self.request_timeout, activate).await
    }

    #[tracing::instrument(skip(self))]
    async fn deactivate_user(&self, tenant_id: Uuid, user_id: Uuid) -> AppResult<User> {
        let deactivate = self.mutate(tenant_id, user_id, |user| Ok(user.deactivate()?));
        with_deadline(self.request_timeout, deactivate).await
    }

    #[tracing::instrument(skip(self))]
    async fn lock_user(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        duration: Duration,
    ) -> AppResult<User> {
        with_deadline(
            self.request_timeout,
            self.lock_inner(tenant_id, user_id, duration),
        )
        .await
    }

    #[tracing::instrument(skip(self))]
    async fn unlock_user(&self, tenant_id: Uuid, user_id: Uuid) -> AppResult<User> {
        let unlock = self.mutate(tenant_id, user_id, |user| Ok(user.unlock()?));
        with_deadline(self.request_timeout, unlock).await
    }

    #[tracing::instrument(skip(self, new_password))]
    async fn reset_password(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        new_password: &str,
    ) -> AppResult<User> {
        let reset = self.mutate(tenant_id, user_id, |user| {
            user.set_password(new_password)?;
            user.force_password_change();
            Ok(())
        });
        with_deadline(self.request_timeout, reset).await
    }

    #[tracing::instrument(skip(self, role_ids))]
    async fn assign_roles(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        role_ids: Vec<Uuid>,
    ) -> AppResult<User> {
        with_deadline(
            self.request_timeout,
            self.assign_roles_inner(tenant_id, user_id, role_ids),
        )
        .await
    }

    async fn list_users(
        &self,
        tenant_id: Uuid,
        filter: UserFilter,
        page: PageRequest,
    ) -> AppResult<Page<User>> {
        let page = page.normalize(&self.pagination);
        with_deadline(self.request_timeout, self.users.list(tenant_id, &filter, page)).await
    }

    async fn count_users(&self, tenant_id: Uuid, filter: UserFilter) -> AppResult<u64> {
        with_deadline(self.request_timeout, self.users.count(tenant_id, &filter)).await
    }

    async fn access_profile(&self, tenant_id: Uuid, user_id: Uuid) -> AppResult<AccessProfile> {
        with_deadline(
            self.request_timeout,
            self.access_profile_inner(tenant_id, user_id),
        )
        .await
    }
}
