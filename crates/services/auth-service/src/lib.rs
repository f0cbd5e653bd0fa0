//! Auth Service Library
//!
//! Login with lockout, JWT access/refresh issuance with mandatory rotation,
//! and token revocation. Users and roles come from the user-service
//! repositories.

pub mod config;
pub mod service;
pub mod token;

use std::sync::Arc;

use tracing::info;

use common::AppResult;
use user_service_lib::events::EventPublisher;
use user_service_lib::repository::{RoleRepository, UserRepository};

use crate::config::AuthServiceConfig;
use crate::service::Authenticator;
use crate::token::{InMemoryTokenBlacklist, JwtTokenIssuer, TokenBlacklist};

/// Pick the blacklist backend the configuration asks for.
pub async fn build_blacklist(config: &AuthServiceConfig) -> AppResult<Arc<dyn TokenBlacklist>> {
    #[cfg(feature = "redis")]
    if let Some(cache) = &config.cache {
        let blacklist = token::RedisTokenBlacklist::connect(cache).await?;
        return Ok(Arc::new(blacklist));
    }

    if config.cache.is_some() {
        tracing::warn!("REDIS_URL set but redis support is not compiled in; using in-memory blacklist");
    }
    info!("Using in-memory token blacklist");
    Ok(Arc::new(InMemoryTokenBlacklist::new()))
}

/// Wire an authenticator over the given repositories.
pub async fn build_authenticator(
    config: AuthServiceConfig,
    users: Arc<dyn UserRepository>,
    roles: Arc<dyn RoleRepository>,
    events: Arc<dyn EventPublisher>,
) -> AppResult<Authenticator> {
    let issuer = Arc::new(JwtTokenIssuer::new(config.jwt.clone()));
    let blacklist = build_blacklist(&config).await?;
    Ok(Authenticator::new(
        users, roles, issuer, blacklist, events, config,
    ))
}
