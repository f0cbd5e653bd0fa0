//! Token revocation: per-token blacklist and user-wide invalidation.
//!
//! Entries only need to outlive the tokens they revoke, so every write
//! carries a TTL.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use tokio::sync::Mutex;
use tokio::time::Instant;
use uuid::Uuid;

use common::AppResult;

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

/// Revocation store shared by every auth service instance.
#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait TokenBlacklist: Send + Sync {
    /// Mark a token id revoked
    async fn revoke(&self, jti: &str, ttl: Duration) -> AppResult<()>;

    /// Atomically mark a token id used. `false` when it was already used or revoked.
    async fn consume(&self, jti: &str, ttl: Duration) -> AppResult<bool>;

    async fn is_revoked(&self, jti: &str) -> AppResult<bool>;

    /// Revoke every token of the user issued at or before `at`
    async fn invalidate_user(&self, user_id: Uuid, at: DateTime<Utc>, ttl: Duration)
        -> AppResult<()>;

    async fn user_invalidated_at(&self, user_id: Uuid) -> AppResult<Option<DateTime<Utc>>>;
}

#[derive(Default)]
struct Entries {
    tokens: HashMap<String, Instant>,
    users: HashMap<Uuid, (DateTime<Utc>, Instant)>,
}

/// Instant `ttl` from `now`, saturating far in the future.
fn expiry(now: Instant, ttl: Duration) -> Instant {
    const FAR: Duration = Duration::from_secs(30 * 365 * 24 * 60 * 60);
    now.checked_add(ttl).unwrap_or(now + FAR)
}

impl Entries {
    fn purge(&mut self, now: Instant) {
        self.tokens.retain(|_, expires| *expires > now);
        self.users.retain(|_, (_, expires)| *expires > now);
    }
}

/// Process-local blacklist for single-instance deployments and tests.
#[derive(Default)]
pub struct InMemoryTokenBlacklist {
    entries: Mutex<Entries>,
}

impl InMemoryTokenBlacklist {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TokenBlacklist for InMemoryTokenBlacklist {
    async fn revoke(&self, jti: &str, ttl: Duration) -> AppResult<()> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        entries.purge(now);
        entries.tokens.insert(jti.to_string(), expiry(now, ttl));
        Ok(())
    }

    async fn consume(&self, jti: &str, ttl: Duration) -> AppResult<bool> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        entries.purge(now);
        if entries.tokens.contains_key(jti) {
            return Ok(false);
        }
        entries.tokens.insert(jti.to_string(), expiry(now, ttl));
        Ok(true)
    }

    async fn is_revoked(&self, jti: &str) -> AppResult<bool> {
        let now = Instant::now();
        let entries = self.entries.lock().await;
        Ok(entries.tokens.get(jti).is_some_and(|expires| *expires > now))
    }

    async fn invalidate_user(
        &self,
        user_id: Uuid,
        at: DateTime<Utc>,
        ttl: Duration,
    ) -> AppResult<()> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        entries.purge(now);
        let mut entry = (at, expiry(now, ttl));
        if let Some((previous_at, previous_expiry)) = entries.users.get(&user_id) {
            entry.0 = entry.0.max(*previous_at);
            entry.1 = entry.1.max(*previous_expiry);
        }
        entries.users.insert(user_id, entry);
        Ok(())
    }

    async fn user_invalidated_at(&self, user_id: Uuid) -> AppResult<Option<DateTime<Utc>>> {
        let now = Instant::now();
        let entries = self.entries.lock().await;
        Ok(entries
            .users
            .get(&user_id)
            .filter(|(_, expires)| *expires > now)
            .map(|(at, _)| *at))
    }
}

/// Stores the invalidation instant unless a later one is already set, and
/// never shortens the key's lifetime.
#[cfg(feature = "redis")]
const KEEP_LATEST_LUA: &str = r"
local current = tonumber(redis.call('GET', KEYS[1]))
local ttl = tonumber(ARGV[2])
if current == nil or tonumber(ARGV[1]) > current then
    if redis.call('TTL', KEYS[1]) > ttl then
        redis.call('SET', KEYS[1], ARGV[1], 'KEEPTTL')
    else
        redis.call('SET', KEYS[1], ARGV[1], 'EX', ttl)
    end
elseif redis.call('TTL', KEYS[1]) < ttl then
    redis.call('EXPIRE', KEYS[1], ttl)
end
return 1
";

/// Redis blacklist using `SET NX EX` so rotation is atomic across instances.
#[cfg(feature = "redis")]
#[derive(Clone)]
pub struct RedisTokenBlacklist {
    connection: redis::aio::ConnectionManager,
    prefix: String,
    keep_latest: redis::Script,
}

#[cfg(feature = "redis")]
impl RedisTokenBlacklist {
    pub async fn connect(config: &common::CacheConfig) -> AppResult<Self> {
        let client = redis::Client::open(config.url.as_str())?;
        let connection = redis::aio::ConnectionManager::new(client).await?;
        tracing::info!("Redis token blacklist connected");

        Ok(Self {
            connection,
            prefix: config.key_prefix.clone(),
            keep_latest: redis::Script::new(KEEP_LATEST_LUA),
        })
    }

    fn token_key(&self, jti: &str) -> String {
        format!("{}:revoked:{}", self.prefix, jti)
    }

    fn user_key(&self, user_id: Uuid) -> String {
        format!("{}:user_revoked:{}", self.prefix, user_id)
    }
}

#[cfg(feature = "redis")]
fn ttl_secs(ttl: Duration) -> u64 {
    ttl.as_secs().max(1)
}

#[cfg(feature = "redis")]
#[async_trait]
impl TokenBlacklist for RedisTokenBlacklist {
    async fn revoke(&self, jti: &str, ttl: Duration) -> AppResult<()> {
        use redis::AsyncCommands;

        let mut conn = self.connection.clone();
        conn.set_ex::<_, _, ()>(self.token_key(jti), 1, ttl_secs(ttl))
            .await?;
        Ok(())
    }

    async fn consume(&self, jti: &str, ttl: Duration) -> AppResult<bool> {
        let mut conn = self.connection.clone();
        let set: Option<String> = redis::cmd("SET")
            .arg(self.token_key(jti))
            .arg(1)
            .arg("NX")
            .arg("EX")
            .arg(ttl_secs(ttl))
            .query_async(&mut conn)
            .await?;
        Ok(set.is_some())
    }

    async fn is_revoked(&self, jti: &str) -> AppResult<bool> {
        use redis::AsyncCommands;

        let mut conn = self.connection.clone();
        let exists: bool = conn.exists(self.token_key(jti)).await?;
        Ok(exists)
    }

    async fn invalidate_user(
        &self,
        user_id: Uuid,
        at: DateTime<Utc>,
        ttl: Duration,
    ) -> AppResult<()> {
        let mut conn = self.connection.clone();
        let _: () = self
            .keep_latest
            .key(self.user_key(user_id))
            .arg(at.timestamp_millis())
            .arg(ttl_secs(ttl))
            .invoke_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn user_invalidated_at(&self, user_id: Uuid) -> AppResult<Option<DateTime<Utc>>> {
        use redis::AsyncCommands;

        let mut conn = self.connection.clone();
        let millis: Option<i64> = conn.get(self.user_key(user_id)).await?;
        Ok(millis.and_then(|ms| Utc.timestamp_millis_opt(ms).single()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TTL: Duration = Duration::from_secs(60);

    #[tokio::test]
    async fn test_consume_only_once() {
        let blacklist = InMemoryTokenBlacklist::new();
        assert!(blacklist.consume("jti-1", TTL).await.unwrap());
        assert!(!blacklist.consume("jti-1", TTL).await.unwrap());
        assert!(blacklist.is_revoked("jti-1").await.unwrap());
    }

    #[tokio::test]
    async fn test_revoked_cannot_be_consumed() {
        let blacklist = InMemoryTokenBlacklist::new();
        blacklist.revoke("jti-2", TTL).await.unwrap();
        assert!(!blacklist.consume("jti-2", TTL).await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_entries_expire() {
        let blacklist = InMemoryTokenBlacklist::new();
        blacklist.revoke("jti-3", Duration::from_secs(5)).await.unwrap();
        assert!(blacklist.is_revoked("jti-3").await.unwrap());

        tokio::time::advance(Duration::from_secs(6)).await;
        assert!(!blacklist.is_revoked("jti-3").await.unwrap());
    }

    #[tokio::test]
    async fn test_user_invalidation_keeps_latest_instant() {
        let blacklist = InMemoryTokenBlacklist::new();
        let user = Uuid::new_v4();
        let later = Utc::now();
        let earlier = later - chrono::Duration::minutes(1);

        blacklist.invalidate_user(user, later, TTL).await.unwrap();
        blacklist.invalidate_user(user, earlier, TTL).await.unwrap();

        assert_eq!(blacklist.user_invalidated_at(user).await.unwrap(), Some(later));
        assert_eq!(blacklist.user_invalidated_at(Uuid::new_v4()).await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_user_invalidation_never_shortens_lifetime() {
        let blacklist = InMemoryTokenBlacklist::new();
        let user = Uuid::new_v4();
        let at = Utc::now();

        blacklist
            .invalidate_user(user, at, Duration::from_secs(600))
            .await
            .unwrap();
        blacklist
            .invalidate_user(user, at + chrono::Duration::seconds(1), Duration::from_secs(5))
            .await
            .unwrap();

        tokio::time::advance(Duration::from_secs(10)).await;
        assert_eq!(
            blacklist.user_invalidated_at(user).await.unwrap(),
            Some(at + chrono::Duration::seconds(1))
        );
    }

    #[tokio::test]
    async fn test_huge_ttl_does_not_overflow() {
        let blacklist = InMemoryTokenBlacklist::new();
        blacklist.revoke("jti-4", Duration::MAX).await.unwrap();
        assert!(blacklist.is_revoked("jti-4").await.unwrap());
    }

    #[cfg(feature = "redis")]
    #[tokio::test]
    #[ignore = "requires a running Redis at REDIS_URL"]
    async fn test_redis_user_invalidation_keeps_latest_instant() {
        let url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1/".into());
        let blacklist = RedisTokenBlacklist::connect(&common::CacheConfig {
            url,
            key_prefix: format!("test-{}", Uuid::new_v4()),
        })
        .await
        .unwrap();
        let user = Uuid::new_v4();
        let later = Utc.timestamp_millis_opt(Utc::now().timestamp_millis()).unwrap();
        let earlier = later - chrono::Duration::minutes(1);

        blacklist.invalidate_user(user, later, TTL).await.unwrap();
        blacklist.invalidate_user(user, earlier, TTL).await.unwrap();
        assert_eq!(blacklist.user_invalidated_at(user).await.unwrap(), Some(later));

        let latest = later + chrono::Duration::seconds(5);
        blacklist.invalidate_user(user, latest, TTL).await.unwrap();
        assert_eq!(blacklist.user_invalidated_at(user).await.unwrap(), Some(latest));
    }
}
