//! Repository layer for data access.

mod role_repository;
mod user_repository;

pub use role_repository::RoleRepository;
pub use user_repository::{UserFilter, UserRepository};

#[cfg(any(test, feature = "test-utils"))]
pub use role_repository::MockRoleRepository;
#[cfg(any(test, feature = "test-utils"))]
pub use user_repository::MockUserRepository;
