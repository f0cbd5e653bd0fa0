//! User service configuration.

use std::time::Duration;

use common::{env_opt, env_or, ConfigError, PaginationConfig};
use domain::MAX_REQUEST_TIMEOUT_MS;

/// User service configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct UserServiceConfig {
    /// Listing limits
    pub pagination: PaginationConfig,
    /// Deadline applied to every service call
    pub request_timeout: Option<Duration>,
}

impl UserServiceConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = PaginationConfig::default();
        let config = Self {
            pagination: PaginationConfig {
                default_page_size: env_or("USER_DEFAULT_PAGE_SIZE", defaults.default_page_size)?,
                max_page_size: env_or("USER_MAX_PAGE_SIZE", defaults.max_page_size)?,
            },
            request_timeout: env_opt::<u64>("USER_REQUEST_TIMEOUT_MS")?.map(Duration::from_millis),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let p = &self.pagination;
        if p.default_page_size == 0 || p.max_page_size == 0 {
            return Err(ConfigError::Rule("page sizes must be positive".into()));
        }
        if p.default_page_size > p.max_page_size {
            return Err(ConfigError::Rule(
                "USER_DEFAULT_PAGE_SIZE cannot exceed USER_MAX_PAGE_SIZE".into(),
            ));
        }
        if self.request_timeout.is_some_and(|t| t.is_zero()) {
            return Err(ConfigError::Rule("USER_REQUEST_TIMEOUT_MS must be positive".into()));
        }
        if self
            .request_timeout
            .is_some_and(|t| t > Duration::from_millis(MAX_REQUEST_TIMEOUT_MS))
        {
            return Err(ConfigError::Rule(format!(
                "USER_REQUEST_TIMEOUT_MS must not exceed {MAX_REQUEST_TIMEOUT_MS}"
            )));
        }
        Ok(())
    }
}
