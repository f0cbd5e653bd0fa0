//! JWT access/refresh token issuance and validation.

use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use common::{AppError, AppResult, JwtConfig};
use domain::{ErrorCode, MAX_TOKEN_TTL_SECS, TOKEN_TYPE_BEARER};

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

pub const ACCESS_TOKEN_TYPE: &str = "access";
pub const REFRESH_TOKEN_TYPE: &str = "refresh";

/// Claims carried by an access token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessClaims {
    pub sub: Uuid,
    pub tenant_id: Uuid,
    pub username: String,
    pub role_ids: Vec<Uuid>,
    pub permissions: Vec<String>,
    pub token_type: String,
    pub jti: String,
    pub iss: String,
    pub aud: String,
    pub exp: i64,
    pub nbf: i64,
    pub iat: i64,
    /// Issue instant in milliseconds, compared against user-wide revocation
    pub iat_ms: i64,
}

/// Claims carried by a refresh token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefreshClaims {
    pub sub: Uuid,
    pub tenant_id: Uuid,
    pub token_type: String,
    /// Rotations so far in this login
    pub refresh_count: u32,
    pub jti: String,
    pub iss: String,
    pub aud: String,
    pub exp: i64,
    pub nbf: i64,
    pub iat: i64,
    pub iat_ms: i64,
}

impl AccessClaims {
    pub fn expires_at(&self) -> DateTime<Utc> {
        timestamp(self.exp)
    }
}

impl RefreshClaims {
    pub fn expires_at(&self) -> DateTime<Utc> {
        timestamp(self.exp)
    }
}

fn timestamp(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).single().unwrap_or_else(Utc::now)
}

/// Who a token pair is issued for
#[derive(Debug, Clone, PartialEq)]
pub struct TokenSubject {
    pub user_id: Uuid,
    pub tenant_id: Uuid,
    pub username: String,
    pub role_ids: Vec<Uuid>,
    pub permissions: Vec<String>,
}

/// Access/refresh pair returned to the client
#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Always "Bearer"
    pub token_type: String,
    /// Access token lifetime in seconds
    pub expires_in: i64,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_expires_at: DateTime<Utc>,
    #[serde(skip)]
    pub access_jti: String,
    #[serde(skip)]
    pub refresh_jti: String,
}

/// Clock skew tolerated on `exp` and `nbf`. Anything that must outlive a
/// token (consumed ids, user invalidations) has to cover this too.
pub const VALIDATION_LEEWAY_SECS: u64 = 0;

/// Signs and verifies tokens.
#[cfg_attr(any(test, feature = "test-utils"), automock)]
pub trait TokenIssuer: Send + Sync {
    /// Issue a fresh pair; `refresh_count` is carried into the refresh token
    fn issue(&self, subject: &TokenSubject, refresh_count: u32) -> AppResult<TokenPair>;

    /// Signature, expiry, issuer, audience and token type
    fn validate_access(&self, token: &str) -> AppResult<AccessClaims>;

    fn validate_refresh(&self, token: &str) -> AppResult<RefreshClaims>;

    /// Rotations allowed before a new login is required
    fn max_refresh_count(&self) -> u32;

    fn access_ttl(&self) -> Duration;

    fn refresh_ttl(&self) -> Duration;
}

/// HS256 issuer with separate access and refresh secrets.
pub struct JwtTokenIssuer {
    config: JwtConfig,
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
}

impl JwtTokenIssuer {
    pub fn new(config: JwtConfig) -> Self {
        let access = config.secret.as_bytes();
        let refresh = config.refresh_secret().as_bytes();
        Self {
            access_encoding: EncodingKey::from_secret(access),
            access_decoding: DecodingKey::from_secret(access),
            refresh_encoding: EncodingKey::from_secret(refresh),
            refresh_decoding: DecodingKey::from_secret(refresh),
            config,
        }
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.config.issuer]);
        validation.set_audience(&[&self.config.issuer]);
        validation.set_required_spec_claims(&["sub", "exp", "nbf", "iss", "aud"]);
        validation.validate_nbf = true;
        validation.leeway = VALIDATION_LEEWAY_SECS;
        validation
    }
}

fn invalid_token() -> AppError {
    AppError::auth(ErrorCode::TokenInvalid, "Invalid or expired token")
}

fn decode_claims<T: serde::de::DeserializeOwned>(
    token: &str,
    key: &DecodingKey,
    validation: &Validation,
) -> AppResult<T> {
    decode::<T>(token, key, validation)
        .map(|data| data.claims)
        .map_err(|e| {
            tracing::debug!(error = %e, "Token rejected");
            invalid_token()
        })
}

impl TokenIssuer for JwtTokenIssuer {
    fn issue(&self, subject: &TokenSubject, refresh_count: u32) -> AppResult<TokenPair> {
        let now = Utc::now();
        let access_expires_at = now + self.access_ttl();
        let refresh_expires_at = now + self.refresh_ttl();
        let header = Header::new(Algorithm::HS256);

        let access = AccessClaims {
            sub: subject.user_id,
            tenant_id: subject.tenant_id,
            username: subject.username.clone(),
            role_ids: subject.role_ids.clone(),
            permissions: subject.permissions.clone(),
            token_type: ACCESS_TOKEN_TYPE.to_string(),
            jti: Uuid::new_v4().to_string(),
            iss: self.config.issuer.clone(),
            aud: self.config.issuer.clone(),
            exp: access_expires_at.timestamp(),
            nbf: now.timestamp(),
            iat: now.timestamp(),
            iat_ms: now.timestamp_millis(),
        };
        let refresh = RefreshClaims {
            sub: subject.user_id,
            tenant_id: subject.tenant_id,
            token_type: REFRESH_TOKEN_TYPE.to_string(),
            refresh_count,
            jti: Uuid::new_v4().to_string(),
            iss: self.config.issuer.clone(),
            aud: self.config.issuer.clone(),
            exp: refresh_expires_at.timestamp(),
            nbf: now.timestamp(),
            iat: now.timestamp(),
            iat_ms: now.timestamp_millis(),
        };

        Ok(TokenPair {
            access_token: encode(&header, &access, &self.access_encoding)?,
            refresh_token: encode(&header, &refresh, &self.refresh_encoding)?,
            token_type: TOKEN_TYPE_BEARER.to_string(),
            expires_in: self.config.access_ttl_secs,
            access_expires_at,
            refresh_expires_at,
            access_jti: access.jti,
            refresh_jti: refresh.jti,
        })
    }

    fn validate_access(&self, token: &str) -> AppResult<AccessClaims> {
        let claims: AccessClaims =
            decode_claims(token, &self.access_decoding, &self.validation())?;
        if claims.token_type != ACCESS_TOKEN_TYPE {
            return Err(invalid_token());
        }
        Ok(claims)
    }

    fn validate_refresh(&self, token: &str) -> AppResult<RefreshClaims> {
        let claims: RefreshClaims =
            decode_claims(token, &self.refresh_decoding, &self.validation())?;
        if claims.token_type != REFRESH_TOKEN_TYPE {
            return Err(invalid_token());
        }
        Ok(claims)
    }

    fn max_refresh_count(&self) -> u32 {
        self.config.max_refresh_count
    }

    fn access_ttl(&self) -> Duration {
        ttl(self.config.access_ttl_secs)
    }

    fn refresh_ttl(&self) -> Duration {
        ttl(self.config.refresh_ttl_secs)
    }
}

fn ttl(secs: i64) -> Duration {
    Duration::seconds(secs.clamp(-MAX_TOKEN_TTL_SECS, MAX_TOKEN_TTL_SECS))
}
