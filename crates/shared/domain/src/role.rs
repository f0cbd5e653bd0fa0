//! Role aggregate: a tenant-unique bundle of permissions and data scopes.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use uuid::Uuid;

use crate::aggregate::{Aggregate, AggregateBase};
use crate::constants::{MAX_ROLE_CODE_LENGTH, MAX_ROLE_NAME_LENGTH, MIN_ROLE_CODE_LENGTH};
use crate::error::{DomainError, DomainResult, ErrorCode};
use crate::events::{DomainEvent, EventPayload};
use crate::permission::{DataScope, Permission};

static ROLE_CODE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z][a-zA-Z0-9_]*$").expect("valid role code regex"));

#[derive(Debug, Clone)]
pub struct Role {
    base: AggregateBase,
    code: String,
    name: String,
    description: String,
    is_system_role: bool,
    is_enabled: bool,
    sort_order: i32,
    permissions: Vec<Permission>,
    data_scopes: Vec<DataScope>,
}

/// Flat persisted form of a role, used by storage adapters to rehydrate.
#[derive(Debug, Clone)]
pub struct RoleRecord {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub code: String,
    pub name: String,
    pub description: String,
    pub is_system_role: bool,
    pub is_enabled: bool,
    pub sort_order: i32,
    pub permissions: Vec<Permission>,
    pub data_scopes: Vec<DataScope>,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Role {
    /// Create an enabled, non-system role with no grants.
    pub fn create(tenant_id: Uuid, code: &str, name: &str) -> DomainResult<Self> {
        Self::build(tenant_id, code, name, false)
    }

    /// Create a role that can never be deleted.
    pub fn create_system(tenant_id: Uuid, code: &str, name: &str) -> DomainResult<Self> {
        Self::build(tenant_id, code, name, true)
    }

    fn build(tenant_id: Uuid, code: &str, name: &str, is_system_role: bool) -> DomainResult<Self> {
        let code = normalize_role_code(code)?;
        let name = validate_role_name(name)?;

        let mut role = Self {
            base: AggregateBase::new(tenant_id),
            code,
            name,
            description: String::new(),
            is_system_role,
            is_enabled: true,
            sort_order: 0,
            permissions: Vec::new(),
            data_scopes: Vec::new(),
        };
        role.base.record(EventPayload::RoleCreated {
            code: role.code.clone(),
            name: role.name.clone(),
            is_system_role,
        });
        Ok(role)
    }

    pub fn restore(record: RoleRecord) -> Self {
        Self {
            base: AggregateBase::restore(
                record.id,
                record.tenant_id,
                record.version,
                record.created_at,
                record.updated_at,
            ),
            code: record.code,
            name: record.name,
            description: record.description,
            is_system_role: record.is_system_role,
            is_enabled: record.is_enabled,
            sort_order: record.sort_order,
            permissions: record.permissions,
            data_scopes: record.data_scopes,
        }
    }

    /// Snapshot for storage. Pending events are not part of it.
    pub fn to_record(&self) -> RoleRecord {
        RoleRecord {
            id: self.id(),
            tenant_id: self.tenant_id(),
            code: self.code.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            is_system_role: self.is_system_role,
            is_enabled: self.is_enabled,
            sort_order: self.sort_order,
            permissions: self.permissions.clone(),
            data_scopes: self.data_scopes.clone(),
            version: self.version(),
            created_at: self.created_at(),
            updated_at: self.updated_at(),
        }
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    pub fn id(&self) -> Uuid {
        self.base.id()
    }

    pub fn tenant_id(&self) -> Uuid {
        self.base.tenant_id()
    }

    pub fn version(&self) -> u64 {
        self.base.version()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.base.created_at()
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.base.updated_at()
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn is_system_role(&self) -> bool {
        self.is_system_role
    }

    pub fn is_enabled(&self) -> bool {
        self.is_enabled
    }

    pub fn sort_order(&self) -> i32 {
        self.sort_order
    }

    pub fn permissions(&self) -> &[Permission] {
        &self.permissions
    }

    pub fn data_scopes(&self) -> &[DataScope] {
        &self.data_scopes
    }

    pub fn pending_events(&self) -> &[DomainEvent] {
        self.base.pending_events()
    }

    /// Hand buffered events to the caller and clear the buffer.
    pub fn drain_events(&mut self) -> Vec<DomainEvent> {
        self.base.drain_events()
    }

    // -------------------------------------------------------------------------
    // Basic information
    // -------------------------------------------------------------------------

    pub fn set_name(&mut self, name: &str) -> DomainResult<()> {
        self.name = validate_role_name(name)?;
        self.base.touch();
        Ok(())
    }

    pub fn set_description(&mut self, description: &str) {
        self.description = description.trim().to_string();
        self.base.touch();
    }

    pub fn set_sort_order(&mut self, sort_order: i32) {
        self.sort_order = sort_order;
        self.base.touch();
    }

    /// Rename and redescribe in one step.
    pub fn update(&mut self, name: &str, description: &str) -> DomainResult<()> {
        self.name = validate_role_name(name)?;
        self.description = description.trim().to_string();
        self.base.touch();
        self.base.record(EventPayload::RoleUpdated {
            code: self.code.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
        });
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------------

    pub fn enable(&mut self) -> DomainResult<()> {
        if self.is_enabled {
            return Err(DomainError::state(
                ErrorCode::AlreadyEnabled,
                "Role is already enabled",
            ));
        }
        self.is_enabled = true;
        self.base.touch();
        self.base.record(EventPayload::RoleEnabled {
            code: self.code.clone(),
        });
        Ok(())
    }

    pub fn disable(&mut self) -> DomainResult<()> {
        if !self.is_enabled {
            return Err(DomainError::state(
                ErrorCode::AlreadyDisabled,
                "Role is already disabled",
            ));
        }
        self.is_enabled = false;
        self.base.touch();
        self.base.record(EventPayload::RoleDisabled {
            code: self.code.clone(),
        });
        Ok(())
    }

    /// Not a system role. Assigned users are checked by the caller.
    pub fn can_delete(&self) -> bool {
        !self.is_system_role
    }

    /// Record the deletion event ahead of removal from storage.
    pub fn mark_deleted(&mut self) -> DomainResult<()> {
        if !self.can_delete() {
            return Err(DomainError::state(
                ErrorCode::SystemRoleNotDeletable,
                "System roles cannot be deleted",
            ));
        }
        self.base.record(EventPayload::RoleDeleted {
            code: self.code.clone(),
        });
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Permissions
    // -------------------------------------------------------------------------

    pub fn grant_permission(&mut self, permission: Permission) -> DomainResult<()> {
        if self.has_permission(permission.code()) {
            return Err(DomainError::conflict(
                ErrorCode::PermissionAlreadyGranted,
                format!("Role already has permission '{}'", permission.code()),
            ));
        }
        let permission_code = permission.code().to_string();
        self.permissions.push(permission);
        self.base.touch();
        self.base.record(EventPayload::RolePermissionGranted {
            code: self.code.clone(),
            permission_code,
        });
        Ok(())
    }

    pub fn grant_permission_by_code(&mut self, code: &str) -> DomainResult<()> {
        self.grant_permission(Permission::from_code(code)?)
    }

    pub fn revoke_permission(&mut self, code: &str) -> DomainResult<()> {
        let code = code.trim().to_lowercase();
        if code.is_empty() {
            return Err(DomainError::validation(
                ErrorCode::InvalidPermission,
                "Permission code cannot be empty",
            ));
        }

        let Some(idx) = self.permissions.iter().position(|p| p.code() == code) else {
            return Err(DomainError::not_found(
                ErrorCode::PermissionNotFound,
                format!("Role does not have permission '{code}'"),
            ));
        };

        let revoked = self.permissions.remove(idx);
        self.base.touch();
        self.base.record(EventPayload::RolePermissionRevoked {
            code: self.code.clone(),
            permission_code: revoked.code().to_string(),
        });
        Ok(())
    }

    /// Replace every permission, keeping the first of each code. Emits no event.
    pub fn set_permissions(&mut self, permissions: Vec<Permission>) {
        let mut unique: Vec<Permission> = Vec::with_capacity(permissions.len());
        for permission in permissions {
            if !unique.contains(&permission) {
                unique.push(permission);
            }
        }
        self.permissions = unique;
        self.base.touch();
    }

    pub fn has_permission(&self, code: &str) -> bool {
        let code = code.trim().to_lowercase();
        self.permissions.iter().any(|p| p.code() == code)
    }

    pub fn has_permission_for_resource(&self, resource: &str) -> bool {
        let resource = resource.trim().to_lowercase();
        self.permissions.iter().any(|p| p.resource() == resource)
    }

    pub fn permissions_for_resource(&self, resource: &str) -> Vec<&Permission> {
        let resource = resource.trim().to_lowercase();
        self.permissions
            .iter()
            .filter(|p| p.resource() == resource)
            .collect()
    }

    pub fn permission_codes(&self) -> impl Iterator<Item = &str> {
        self.permissions.iter().map(Permission::code)
    }

    // -------------------------------------------------------------------------
    // Data scopes
    // -------------------------------------------------------------------------

    /// Set the scope for a resource, replacing any previous one.
    pub fn set_data_scope(&mut self, scope: DataScope) {
        self.data_scopes.retain(|s| s.resource() != scope.resource());
        self.base.record(EventPayload::RoleDataScopeChanged {
            code: self.code.clone(),
            resource: scope.resource().to_string(),
            scope_type: scope.scope_type(),
            scope_values: scope.scope_values().to_vec(),
        });
        self.data_scopes.push(scope);
        self.base.touch();
    }

    pub fn remove_data_scope(&mut self, resource: &str) -> DomainResult<()> {
        let resource = resource.trim().to_lowercase();
        let before = self.data_scopes.len();
        self.data_scopes.retain(|s| s.resource() != resource);
        if self.data_scopes.len() == before {
            return Err(DomainError::not_found(
                ErrorCode::DataScopeNotFound,
                format!("Role has no data scope for '{resource}'"),
            ));
        }
        self.base.touch();
        Ok(())
    }

    /// Replace every scope. The first scope given for a resource wins. Emits no event.
    pub fn set_data_scopes(&mut self, scopes: Vec<DataScope>) {
        let mut unique: Vec<DataScope> = Vec::with_capacity(scopes.len());
        for scope in scopes {
            if !unique.iter().any(|s| s.resource() == scope.resource()) {
                unique.push(scope);
            }
        }
        self.data_scopes = unique;
        self.base.touch();
    }

    pub fn data_scope(&self, resource: &str) -> Option<&DataScope> {
        let resource = resource.trim().to_lowercase();
        self.data_scopes.iter().find(|s| s.resource() == resource)
    }

    pub fn has_data_scope(&self, resource: &str) -> bool {
        self.data_scope(resource).is_some()
    }
}

impl Aggregate for Role {
    fn base(&self) -> &AggregateBase {
        &self.base
    }
}

/// Trim, check and uppercase a role code.
pub fn normalize_role_code(code: &str) -> DomainResult<String> {
    let code = code.trim();
    if code.is_empty() {
        return Err(DomainError::validation(
            ErrorCode::InvalidRoleCode,
            "Role code cannot be empty",
        ));
    }
    if code.len() < MIN_ROLE_CODE_LENGTH {
        return Err(DomainError::validation(
            ErrorCode::InvalidRoleCode,
            format!("Role code must be at least {MIN_ROLE_CODE_LENGTH} characters"),
        ));
    }
    if code.len() > MAX_ROLE_CODE_LENGTH {
        return Err(DomainError::validation(
            ErrorCode::InvalidRoleCode,
            format!("Role code cannot exceed {MAX_ROLE_CODE_LENGTH} characters"),
        ));
    }
    if !ROLE_CODE_RE.is_match(code) {
        return Err(DomainError::validation(
            ErrorCode::InvalidRoleCode,
            "Role code must start with a letter and contain only letters, numbers, and underscores",
        ));
    }
    Ok(code.to_uppercase())
}

fn validate_role_name(name: &str) -> DomainResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(DomainError::validation(
            ErrorCode::InvalidRoleName,
            "Role name cannot be empty",
        ));
    }
    if name.chars().count() > MAX_ROLE_NAME_LENGTH {
        return Err(DomainError::validation(
            ErrorCode::InvalidRoleName,
            format!("Role name cannot exceed {MAX_ROLE_NAME_LENGTH} characters"),
        ));
    }
    Ok(name.to_string())
}
