//! Token issuance and revocation.

mod blacklist;
mod issuer;

#[cfg(feature = "redis")]
pub use blacklist::RedisTokenBlacklist;
pub use blacklist::{InMemoryTokenBlacklist, TokenBlacklist};
pub use issuer::{
    AccessClaims, JwtTokenIssuer, RefreshClaims, TokenIssuer, TokenPair, TokenSubject,
    ACCESS_TOKEN_TYPE, REFRESH_TOKEN_TYPE, VALIDATION_LEEWAY_SECS,
};

#[cfg(any(test, feature = "test-utils"))]
pub use blacklist::MockTokenBlacklist;
#[cfg(any(test, feature = "test-utils"))]
pub use issuer::MockTokenIssuer;
