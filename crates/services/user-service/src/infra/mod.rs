//! Infrastructure layer - storage adapters.

mod memory;

pub use memory::{InMemoryRoleStore, InMemoryUserStore};
