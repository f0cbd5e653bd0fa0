//! User Service Library
//!
//! Role and user administration for the identity core: repository
//! contracts, in-memory adapters, and the `RoleManager` / `UserManager`
//! application services.

pub mod config;
pub mod events;
pub mod infra;
pub mod repository;
pub mod service;

use std::sync::Arc;

use crate::config::UserServiceConfig;
use crate::events::EventPublisher;
use crate::infra::{InMemoryRoleStore, InMemoryUserStore};
use crate::service::{RoleManager, UserManager};

/// Services wired over the in-memory stores.
pub struct InMemoryServices {
    pub users: Arc<InMemoryUserStore>,
    pub roles: Arc<InMemoryRoleStore>,
    pub user_service: Arc<UserManager>,
    pub role_service: Arc<RoleManager>,
}

/// Build both managers over fresh in-memory stores.
pub fn in_memory(config: UserServiceConfig, events: Arc<dyn EventPublisher>) -> InMemoryServices {
    let users = Arc::new(InMemoryUserStore::new());
    let roles = Arc::new(InMemoryRoleStore::new(users.clone()));

    let user_service = Arc::new(
        UserManager::new(users.clone(), roles.clone(), events.clone())
            .with_pagination(config.pagination)
            .with_request_timeout(config.request_timeout),
    );
    let role_service = Arc::new(
        RoleManager::new(roles.clone(), events)
            .with_pagination(config.pagination)
            .with_request_timeout(config.request_timeout),
    );

    InMemoryServices {
        users,
        roles,
        user_service,
        role_service,
    }
}
