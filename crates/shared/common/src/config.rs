//! Shared configuration structures and environment helpers.

use std::env;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration loading failure.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{key} has an invalid value: {value}")]
    Invalid { key: &'static str, value: String },

    #[error("{0}")]
    Rule(String),
}

/// Read `key`, falling back to `default` when unset.
pub fn env_or<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid { key, value: raw }),
        Err(_) => Ok(default),
    }
}

/// Read an optional value; unset and empty both mean `None`.
pub fn env_opt<T: FromStr>(key: &'static str) -> Result<Option<T>, ConfigError> {
    match env::var(key) {
        Ok(raw) if raw.trim().is_empty() => Ok(None),
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { key, value: raw }),
        Err(_) => Ok(None),
    }
}

/// Read a required string.
pub fn env_required(key: &'static str) -> Result<String, ConfigError> {
    env::var(key).map_err(|_| ConfigError::Missing(key))
}

/// JWT signing configuration. Secrets never appear in `Debug` output.
#[derive(Clone, Deserialize, Serialize)]
pub struct JwtConfig {
    #[serde(skip_serializing)]
    pub secret: String,
    /// Defaults to `secret` when empty
    #[serde(skip_serializing)]
    pub refresh_secret: String,
    pub access_ttl_secs: i64,
    pub refresh_ttl_secs: i64,
    /// Also used as the audience
    pub issuer: String,
    /// Refresh rotations allowed before a fresh login is required
    pub max_refresh_count: u32,
}

impl JwtConfig {
    pub fn refresh_secret(&self) -> &str {
        if self.refresh_secret.is_empty() {
            &self.secret
        } else {
            &self.refresh_secret
        }
    }
}

impl fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn redacted(secret: &str) -> &'static str {
            if secret.is_empty() {
                "<unset>"
            } else {
                "<redacted>"
            }
        }

        f.debug_struct("JwtConfig")
            .field("secret", &redacted(&self.secret))
            .field("refresh_secret", &redacted(&self.refresh_secret))
            .field("access_ttl_secs", &self.access_ttl_secs)
            .field("refresh_ttl_secs", &self.refresh_ttl_secs)
            .field("issuer", &self.issuer)
            .field("max_refresh_count", &self.max_refresh_count)
            .finish()
    }
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            refresh_secret: String::new(),
            access_ttl_secs: 15 * 60,
            refresh_ttl_secs: 7 * 24 * 3600,
            issuer: "erp-identity".to_string(),
            max_refresh_count: 10,
        }
    }
}

/// Redis cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    pub url: String,
    pub key_prefix: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
            key_prefix: "identity".to_string(),
        }
    }
}

/// Listing limits.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct PaginationConfig {
    pub default_page_size: u64,
    pub max_page_size: u64,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_page_size: 20,
            max_page_size: 100,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refresh_secret_falls_back() {
        let mut jwt = JwtConfig {
            secret: "access".into(),
            ..Default::default()
        };
        assert_eq!(jwt.refresh_secret(), "access");

        jwt.refresh_secret = "refresh".into();
        assert_eq!(jwt.refresh_secret(), "refresh");
    }

    #[test]
    fn test_env_helpers() {
        env::set_var("COMMON_TEST_NUMBER", "42");
        env::set_var("COMMON_TEST_BAD", "forty");
        env::set_var("COMMON_TEST_EMPTY", " ");

        assert_eq!(env_or("COMMON_TEST_NUMBER", 1u32), Ok(42));
        assert_eq!(env_or("COMMON_TEST_UNSET_KEY", 7u32), Ok(7));
        assert!(matches!(
            env_or::<u32>("COMMON_TEST_BAD", 1),
            Err(ConfigError::Invalid { key: "COMMON_TEST_BAD", .. })
        ));
        assert_eq!(env_opt::<u64>("COMMON_TEST_EMPTY"), Ok(None));
        assert_eq!(
            env_required("COMMON_TEST_UNSET_KEY"),
            Err(ConfigError::Missing("COMMON_TEST_UNSET_KEY"))
        );
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let jwt = JwtConfig {
            secret: "super-secret-access-key".into(),
            refresh_secret: "super-secret-refresh-key".into(),
            ..Default::default()
        };
        let printed = format!("{jwt:?}");
        assert!(!printed.contains("super-secret"));
        assert!(printed.contains("<redacted>"));
        assert!(printed.contains("erp-identity"));
    }
}
