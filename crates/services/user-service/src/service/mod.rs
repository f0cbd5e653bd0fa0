//! Application services.

mod role_service;
mod user_service;

pub use role_service::{CreateRoleInput, RoleManager, RoleService, UpdateRoleInput};
pub use user_service::{CreateUserInput, UpdateProfileInput, UserManager, UserService};
