//! Domain layer - tenant-scoped RBAC and account lifecycle.
//!
//! This crate contains pure domain logic with no infrastructure dependencies:
//! the versioned aggregate base, Permission/DataScope value objects, the Role
//! and User aggregates, and access-profile resolution.

pub mod access;
pub mod aggregate;
pub mod constants;
pub mod error;
pub mod events;
pub mod password;
pub mod permission;
pub mod role;
pub mod user;

pub use access::{merge_scopes, warehouse_scopes, AccessProfile, RowFilter};
pub use aggregate::{Aggregate, AggregateBase, ExpectedVersion, INITIAL_VERSION};
pub use constants::*;
pub use error::{DomainError, DomainResult, ErrorCode, ErrorKind};
pub use events::{DomainEvent, EventPayload};
pub use password::Password;
pub use permission::{DataScope, DataScopeType, Permission};
pub use role::{normalize_role_code, Role, RoleRecord};
pub use user::{normalize_username, User, UserRecord, UserStatus};
