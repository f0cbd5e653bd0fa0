//! Permission and DataScope value objects.
//!
//! Both are immutable once built and can only be obtained through validating
//! constructors, so a partially valid value never exists.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::constants::{MAX_PERMISSION_PART_LENGTH, WAREHOUSE_SCOPE_FIELD};
use crate::error::{DomainError, DomainResult, ErrorCode};

static PERMISSION_PART_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z][a-z0-9_]*$").expect("valid permission regex"));

/// Functional capability, `resource:action`.
///
/// Equality and hashing use the code only.
#[derive(Debug, Clone, Serialize)]
pub struct Permission {
    code: String,
    resource: String,
    action: String,
    description: String,
}

impl Permission {
    /// Build from a resource and an action, both normalized to lowercase.
    pub fn new(resource: &str, action: &str) -> DomainResult<Self> {
        let resource = normalize_part(resource, "resource")?;
        let action = normalize_part(action, "action")?;

        Ok(Self {
            code: format!("{resource}:{action}"),
            resource,
            action,
            description: String::new(),
        })
    }

    /// Parse a `resource:action` code. Splits on the first colon.
    pub fn from_code(code: &str) -> DomainResult<Self> {
        match code.split_once(':') {
            Some((resource, action)) => Self::new(resource, action),
            None => Err(DomainError::validation(
                ErrorCode::InvalidPermission,
                "Permission code must be in format 'resource:action'",
            )),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    pub fn action(&self) -> &str {
        &self.action
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }
}

impl PartialEq for Permission {
    fn eq(&self, other: &Self) -> bool {
        self.code == other.code
    }
}

impl Eq for Permission {}

impl Hash for Permission {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.code.hash(state);
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.code)
    }
}

fn normalize_part(value: &str, part: &str) -> DomainResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(DomainError::validation(
            ErrorCode::InvalidPermission,
            format!("Permission {part} cannot be empty"),
        ));
    }
    if value.len() > MAX_PERMISSION_PART_LENGTH {
        return Err(DomainError::validation(
            ErrorCode::InvalidPermission,
            format!("Permission {part} cannot exceed {MAX_PERMISSION_PART_LENGTH} characters"),
        ));
    }

    let value = value.to_lowercase();
    if !PERMISSION_PART_RE.is_match(&value) {
        return Err(DomainError::validation(
            ErrorCode::InvalidPermission,
            format!(
                "Permission {part} must start with a letter and contain only lowercase letters, numbers, and underscores"
            ),
        ));
    }
    Ok(value)
}

/// Row-visibility rule kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataScopeType {
    /// Every row.
    All,
    /// Rows created by the caller.
    #[serde(rename = "self")]
    SelfOnly,
    /// Rows within the caller's department.
    Department,
    /// Rows matching explicit values.
    Custom,
    /// Rows within assigned warehouses.
    Warehouse,
}

impl DataScopeType {
    pub fn as_str(self) -> &'static str {
        match self {
            DataScopeType::All => "all",
            DataScopeType::SelfOnly => "self",
            DataScopeType::Department => "department",
            DataScopeType::Custom => "custom",
            DataScopeType::Warehouse => "warehouse",
        }
    }

    /// Permissiveness rank used when several roles scope the same resource.
    pub fn level(self) -> u8 {
        match self {
            DataScopeType::All => 100,
            DataScopeType::Department => 50,
            DataScopeType::Warehouse => 45,
            DataScopeType::Custom => 40,
            DataScopeType::SelfOnly => 10,
        }
    }

    /// Whether the scope needs explicit values to mean anything.
    pub fn requires_values(self) -> bool {
        matches!(self, DataScopeType::Custom | DataScopeType::Warehouse)
    }
}

impl fmt::Display for DataScopeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataScopeType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "all" => Ok(DataScopeType::All),
            "self" => Ok(DataScopeType::SelfOnly),
            "department" => Ok(DataScopeType::Department),
            "custom" => Ok(DataScopeType::Custom),
            "warehouse" => Ok(DataScopeType::Warehouse),
            other => Err(DomainError::validation(
                ErrorCode::InvalidDataScope,
                format!("Invalid data scope type '{other}'"),
            )),
        }
    }
}

/// Data-visibility rule attached to one resource.
///
/// Equality compares resource, type, field and values (in order); the
/// description is ignored.
#[derive(Debug, Clone, Serialize)]
pub struct DataScope {
    resource: String,
    scope_type: DataScopeType,
    scope_field: String,
    scope_values: Vec<String>,
    description: String,
}

impl DataScope {
    /// Scope without values. Custom and warehouse scopes must use their own constructors.
    pub fn new(resource: &str, scope_type: DataScopeType) -> DomainResult<Self> {
        if scope_type.requires_values() {
            return Err(DomainError::validation(
                ErrorCode::InvalidDataScope,
                format!("A {scope_type} data scope must have at least one scope value"),
            ));
        }
        Ok(Self {
            resource: scope_resource(resource)?,
            scope_type,
            scope_field: String::new(),
            scope_values: Vec::new(),
            description: String::new(),
        })
    }

    pub fn custom(resource: &str, scope_values: Vec<String>) -> DomainResult<Self> {
        let resource = scope_resource(resource)?;
        require_values(DataScopeType::Custom, &scope_values)?;
        Ok(Self {
            resource,
            scope_type: DataScopeType::Custom,
            scope_field: String::new(),
            scope_values,
            description: String::new(),
        })
    }

    pub fn custom_with_field(
        resource: &str,
        scope_field: &str,
        scope_values: Vec<String>,
    ) -> DomainResult<Self> {
        let mut scope = Self::custom(resource, scope_values)?;
        let field = scope_field.trim();
        if field.is_empty() {
            return Err(DomainError::validation(
                ErrorCode::InvalidDataScope,
                "Scope field cannot be empty for a custom data scope with field",
            ));
        }
        scope.scope_field = field.to_string();
        Ok(scope)
    }

    /// Warehouse scope; the field is always `warehouse_id`.
    pub fn warehouse(resource: &str, warehouse_ids: Vec<String>) -> DomainResult<Self> {
        let resource = scope_resource(resource)?;
        require_values(DataScopeType::Warehouse, &warehouse_ids)?;
        Ok(Self {
            resource,
            scope_type: DataScopeType::Warehouse,
            scope_field: WAREHOUSE_SCOPE_FIELD.to_string(),
            scope_values: warehouse_ids,
            description: String::new(),
        })
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    pub fn scope_type(&self) -> DataScopeType {
        self.scope_type
    }

    pub fn scope_field(&self) -> &str {
        &self.scope_field
    }

    pub fn scope_values(&self) -> &[String] {
        &self.scope_values
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn is_empty(&self) -> bool {
        self.resource.is_empty()
    }
}

impl PartialEq for DataScope {
    fn eq(&self, other: &Self) -> bool {
        self.resource == other.resource
            && self.scope_type == other.scope_type
            && self.scope_field == other.scope_field
            && self.scope_values == other.scope_values
    }
}

impl Eq for DataScope {}

fn scope_resource(resource: &str) -> DomainResult<String> {
    normalize_part(resource, "resource").map_err(|e| {
        DomainError::validation(ErrorCode::InvalidDataScope, format!("Data scope: {}", e.message()))
    })
}

fn require_values(scope_type: DataScopeType, values: &[String]) -> DomainResult<()> {
    if values.is_empty() {
        return Err(DomainError::validation(
            ErrorCode::InvalidDataScope,
            format!("A {scope_type} data scope must have at least one scope value"),
        ));
    }
    Ok(())
}
