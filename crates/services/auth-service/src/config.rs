//! Auth service configuration.

use std::time::Duration;

use common::{env_opt, env_or, env_required, CacheConfig, ConfigError, JwtConfig};
use domain::{
    DEFAULT_LOCK_DURATION_SECS, DEFAULT_MAX_FAILED_ATTEMPTS, MAX_LOCK_DURATION_SECS,
    MAX_REQUEST_TIMEOUT_MS, MAX_TOKEN_TTL_SECS, MIN_JWT_SECRET_LENGTH,
};

/// Auth service configuration.
#[derive(Debug, Clone)]
pub struct AuthServiceConfig {
    /// Consecutive failures before the account locks
    pub max_failed_attempts: u32,
    /// How long a lockout lasts, in seconds
    pub lock_duration_secs: i64,
    pub jwt: JwtConfig,
    /// Deadline applied to every service call
    pub request_timeout: Option<Duration>,
    /// Redis-backed blacklist when set
    pub cache: Option<CacheConfig>,
}

impl AuthServiceConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let jwt_defaults = JwtConfig::default();
        let secret = env_required("JWT_SECRET")?;

        let config = Self {
            max_failed_attempts: env_or("AUTH_MAX_FAILED_ATTEMPTS", DEFAULT_MAX_FAILED_ATTEMPTS)?,
            lock_duration_secs: env_or("AUTH_LOCK_DURATION_SECS", DEFAULT_LOCK_DURATION_SECS)?,
            jwt: JwtConfig {
                secret,
                refresh_secret: env_opt("JWT_REFRESH_SECRET")?.unwrap_or_default(),
                access_ttl_secs: env_or("JWT_ACCESS_TTL_SECS", jwt_defaults.access_ttl_secs)?,
                refresh_ttl_secs: env_or("JWT_REFRESH_TTL_SECS", jwt_defaults.refresh_ttl_secs)?,
                issuer: env_or("JWT_ISSUER", jwt_defaults.issuer)?,
                max_refresh_count: env_or("JWT_MAX_REFRESH_COUNT", jwt_defaults.max_refresh_count)?,
            },
            request_timeout: env_opt::<u64>("AUTH_REQUEST_TIMEOUT_MS")?.map(Duration::from_millis),
            cache: env_opt::<String>("REDIS_URL")?.map(|url| CacheConfig {
                url,
                ..Default::default()
            }),
        };

        config.validate()?;
        Ok(config)
    }

    /// Check the limits that must hold before the service starts.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_failed_attempts == 0 {
            return Err(rule("AUTH_MAX_FAILED_ATTEMPTS must be positive"));
        }
        if self.lock_duration_secs <= 0 {
            return Err(rule("AUTH_LOCK_DURATION_SECS must be positive"));
        }
        if self.lock_duration_secs > MAX_LOCK_DURATION_SECS {
            return Err(rule(format!(
                "AUTH_LOCK_DURATION_SECS must not exceed {MAX_LOCK_DURATION_SECS}"
            )));
        }
        if self.jwt.secret.len() < MIN_JWT_SECRET_LENGTH {
            return Err(rule(format!(
                "JWT_SECRET must be at least {MIN_JWT_SECRET_LENGTH} characters"
            )));
        }
        if !self.jwt.refresh_secret.is_empty() && self.jwt.refresh_secret.len() < MIN_JWT_SECRET_LENGTH
        {
            return Err(rule(format!(
                "JWT_REFRESH_SECRET must be at least {MIN_JWT_SECRET_LENGTH} characters"
            )));
        }
        if self.jwt.access_ttl_secs <= 0 || self.jwt.refresh_ttl_secs <= 0 {
            return Err(rule("token lifetimes must be positive"));
        }
        if self.jwt.access_ttl_secs > MAX_TOKEN_TTL_SECS
            || self.jwt.refresh_ttl_secs > MAX_TOKEN_TTL_SECS
        {
            return Err(rule(format!(
                "token lifetimes must not exceed {MAX_TOKEN_TTL_SECS} seconds"
            )));
        }
        if self.jwt.max_refresh_count == 0 {
            return Err(rule("JWT_MAX_REFRESH_COUNT must be positive"));
        }
        if self.request_timeout.is_some_and(|t| t.is_zero()) {
            return Err(rule("AUTH_REQUEST_TIMEOUT_MS must be positive"));
        }
        if self
            .request_timeout
            .is_some_and(|t| t > Duration::from_millis(MAX_REQUEST_TIMEOUT_MS))
        {
            return Err(rule(format!(
                "AUTH_REQUEST_TIMEOUT_MS must not exceed {MAX_REQUEST_TIMEOUT_MS}"
            )));
        }
        Ok(())
    }

    /// Lock duration, clamped to the accepted range for unvalidated configs.
    pub fn lock_duration(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.lock_duration_secs.clamp(0, MAX_LOCK_DURATION_SECS))
    }

    /// Configuration for tests and local tooling.
    pub fn with_secret(secret: impl Into<String>) -> Self {
        Self {
            jwt: JwtConfig {
                secret: secret.into(),
                ..Default::default()
            },
            ..Default::default()
        }
    }
}

impl Default for AuthServiceConfig {
    fn default() -> Self {
        Self {
            max_failed_attempts: DEFAULT_MAX_FAILED_ATTEMPTS,
            lock_duration_secs: DEFAULT_LOCK_DURATION_SECS,
            jwt: JwtConfig::default(),
            request_timeout: None,
            cache: None,
        }
    }
}

fn rule(msg: impl Into<String>) -> ConfigError {
    ConfigError::Rule(msg.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "an-adequately-long-signing-secret-value";

    #[test]
    fn test_defaults_with_secret_are_valid() {
        let config = AuthServiceConfig::with_secret(SECRET);
        assert!(config.validate().is_ok());
        assert_eq!(config.max_failed_attempts, 5);
        assert_eq!(config.lock_duration(), chrono::Duration::minutes(15));
        assert_eq!(config.jwt.issuer, "erp-identity");
    }

    #[test]
    fn test_short_secret_rejected() {
        let config = AuthServiceConfig::with_secret("short");
        assert!(matches!(config.validate(), Err(ConfigError::Rule(_))));
    }

    #[test]
    fn test_lockout_values_must_be_positive() {
        let mut config = AuthServiceConfig::with_secret(SECRET);
        config.max_failed_attempts = 0;
        assert!(config.validate().is_err());

        let mut config = AuthServiceConfig::with_secret(SECRET);
        config.lock_duration_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let mut config = AuthServiceConfig::with_secret(SECRET);
        config.request_timeout = Some(Duration::ZERO);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_oversized_durations_rejected() {
        let mut config = AuthServiceConfig::with_secret(SECRET);
        config.lock_duration_secs = i64::MAX;
        assert!(matches!(config.validate(), Err(ConfigError::Rule(_))));

        let mut config = AuthServiceConfig::with_secret(SECRET);
        config.lock_duration_secs = MAX_LOCK_DURATION_SECS;
        assert!(config.validate().is_ok());

        let mut config = AuthServiceConfig::with_secret(SECRET);
        config.jwt.access_ttl_secs = i64::MAX;
        assert!(config.validate().is_err());

        let mut config = AuthServiceConfig::with_secret(SECRET);
        config.jwt.refresh_ttl_secs = MAX_TOKEN_TTL_SECS + 1;
        assert!(config.validate().is_err());

        let mut config = AuthServiceConfig::with_secret(SECRET);
        config.request_timeout = Some(Duration::from_secs(u64::MAX));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_lock_duration_clamped_without_validation() {
        let mut config = AuthServiceConfig::with_secret(SECRET);
        config.lock_duration_secs = i64::MAX;
        assert_eq!(
            config.lock_duration(),
            chrono::Duration::seconds(MAX_LOCK_DURATION_SECS)
        );
    }

    #[test]
    fn test_debug_output_hides_secret() {
        let config = AuthServiceConfig::with_secret(SECRET);
        assert!(!format!("{config:?}").contains(SECRET));
    }
}
