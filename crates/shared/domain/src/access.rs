//! Effective access of one user: permission union and merged data scopes.
//!
//! Only enabled roles contribute. When several roles scope the same resource
//! the most permissive scope wins (see [`DataScopeType::level`]). A resource
//! without any scope is unrestricted.

use std::collections::{BTreeMap, BTreeSet};

use uuid::Uuid;

use crate::constants::{
    ALLOWED_SCOPE_FIELDS, CREATED_BY_FIELD, WAREHOUSE_SCOPED_RESOURCES, WAREHOUSE_SCOPE_FIELD,
};
use crate::error::DomainResult;
use crate::permission::{DataScope, DataScopeType};
use crate::role::Role;

/// Storage-agnostic row filter for one resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowFilter {
    /// No restriction.
    Unrestricted,
    /// Match nothing.
    Deny,
    /// Rows created by this user.
    CreatedBy(Uuid),
    /// Rows whose `field` is one of `values`.
    FieldIn { field: String, values: Vec<String> },
}

#[derive(Debug, Clone)]
pub struct AccessProfile {
    user_id: Uuid,
    tenant_id: Uuid,
    permissions: BTreeSet<String>,
    scopes: BTreeMap<String, DataScope>,
}

impl AccessProfile {
    pub fn resolve(user_id: Uuid, tenant_id: Uuid, roles: &[Role]) -> Self {
        let enabled: Vec<&Role> = roles
            .iter()
            .filter(|r| r.is_enabled() && r.tenant_id() == tenant_id)
            .collect();

        let permissions = enabled
            .iter()
            .flat_map(|r| r.permission_codes())
            .map(str::to_string)
            .collect();

        Self {
            user_id,
            tenant_id,
            permissions,
            scopes: merge_scopes(enabled.iter().map(|r| r.data_scopes())),
        }
    }

    pub fn user_id(&self) -> Uuid {
        self.user_id
    }

    pub fn tenant_id(&self) -> Uuid {
        self.tenant_id
    }

    /// Sorted permission codes.
    pub fn permissions(&self) -> Vec<String> {
        self.permissions.iter().cloned().collect()
    }

    pub fn has_permission(&self, code: &str) -> bool {
        self.permissions.contains(code)
    }

    pub fn data_scope(&self, resource: &str) -> Option<&DataScope> {
        self.scopes.get(resource)
    }

    /// Effective scope type, `all` when the resource is unscoped.
    pub fn scope_type(&self, resource: &str) -> DataScopeType {
        self.scopes
            .get(resource)
            .map_or(DataScopeType::All, DataScope::scope_type)
    }

    pub fn can_access_all(&self, resource: &str) -> bool {
        self.scope_type(resource) == DataScopeType::All
    }

    pub fn is_warehouse_scoped(&self, resource: &str) -> bool {
        self.scopes
            .get(resource)
            .is_some_and(|s| s.scope_type() == DataScopeType::Warehouse)
    }

    /// Warehouse ids the user is limited to, `None` when not warehouse scoped.
    pub fn warehouse_ids(&self, resource: &str) -> Option<&[String]> {
        self.scopes
            .get(resource)
            .filter(|s| s.scope_type() == DataScopeType::Warehouse)
            .map(DataScope::scope_values)
    }

    pub fn has_warehouse_access(&self, resource: &str, warehouse_id: &str) -> bool {
        match self.warehouse_ids(resource) {
            Some(ids) => ids.iter().any(|id| id == warehouse_id),
            None => true,
        }
    }

    pub fn row_filter(&self, resource: &str) -> RowFilter {
        let Some(scope) = self.scopes.get(resource) else {
            return RowFilter::Unrestricted;
        };

        match scope.scope_type() {
            DataScopeType::All => RowFilter::Unrestricted,
            // Department membership is not resolvable here; narrow to own rows.
            DataScopeType::SelfOnly | DataScopeType::Department => {
                if self.user_id.is_nil() {
                    RowFilter::Deny
                } else {
                    RowFilter::CreatedBy(self.user_id)
                }
            }
            DataScopeType::Warehouse => field_in(WAREHOUSE_SCOPE_FIELD, scope.scope_values()),
            DataScopeType::Custom => {
                let field = match scope.scope_field() {
                    "" => default_scope_field(resource).unwrap_or(CREATED_BY_FIELD),
                    field if ALLOWED_SCOPE_FIELDS.contains(&field) => field,
                    _ => CREATED_BY_FIELD,
                };
                field_in(field, scope.scope_values())
            }
        }
    }
}

fn field_in(field: &str, values: &[String]) -> RowFilter {
    if values.is_empty() {
        return RowFilter::Deny;
    }
    RowFilter::FieldIn {
        field: field.to_string(),
        values: values.to_vec(),
    }
}

fn default_scope_field(resource: &str) -> Option<&'static str> {
    WAREHOUSE_SCOPED_RESOURCES
        .contains(&resource)
        .then_some(WAREHOUSE_SCOPE_FIELD)
}

/// Keep the most permissive scope per resource. Ties keep the first seen.
pub fn merge_scopes<'a>(
    scope_lists: impl IntoIterator<Item = &'a [DataScope]>,
) -> BTreeMap<String, DataScope> {
    let mut merged: BTreeMap<String, DataScope> = BTreeMap::new();
    for scope in scope_lists.into_iter().flatten() {
        let replace = merged
            .get(scope.resource())
            .map_or(true, |existing| {
                scope.scope_type().level() > existing.scope_type().level()
            });
        if replace {
            merged.insert(scope.resource().to_string(), scope.clone());
        }
    }
    merged
}

/// One warehouse scope per warehouse-scoped resource.
pub fn warehouse_scopes(warehouse_ids: &[String]) -> DomainResult<Vec<DataScope>> {
    if warehouse_ids.is_empty() {
        return Ok(Vec::new());
    }
    WAREHOUSE_SCOPED_RESOURCES
        .iter()
        .map(|resource| DataScope::warehouse(resource, warehouse_ids.to_vec()))
        .collect()
}
