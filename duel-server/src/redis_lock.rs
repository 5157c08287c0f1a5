//! Cross-process room locks on a shared Redis.
//!
//! A lock is a key holding a random owner token, set with `NX` and a TTL.
//! Release deletes the key only if it still holds our token, so a holder
//! whose lock already expired can never free somebody else's. While held, the
//! TTL is renewed in the background, so only a holder cut off from Redis for
//! most of a TTL can lose the lock mid-action.

use async_trait::async_trait;
use duel_core::{EngineError, EngineResult, HeldLock, LockProvider};
use rand::Rng;
use redis::aio::ConnectionManager;
use redis::{Client, Script};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};
use uuid::Uuid;

const RELEASE_SCRIPT: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
    return redis.call("DEL", KEYS[1])
else
    return 0
end
"#;

const RENEW_SCRIPT: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
    return redis.call("PEXPIRE", KEYS[1], ARGV[2])
else
    return 0
end
"#;

const INITIAL_BACKOFF: Duration = Duration::from_millis(10);
const MAX_BACKOFF: Duration = Duration::from_millis(200);
const MIN_RENEW_INTERVAL: Duration = Duration::from_millis(10);

/// Renew three times per TTL so one failed renewal does not lose the lock.
fn renew_interval(ttl: Duration) -> Duration {
    (ttl / 3).max(MIN_RENEW_INTERVAL)
}

#[derive(Clone)]
pub struct RedisLockProvider {
    manager: ConnectionManager,
    ttl: Duration,
    prefix: String,
}

impl RedisLockProvider {
    pub async fn connect(redis_url: &str, ttl: Duration) -> anyhow::Result<Self> {
        let client = Client::open(redis_url)?;
        let manager = ConnectionManager::new(client).await?;
        Ok(Self::new(manager, ttl))
    }

    pub fn new(manager: ConnectionManager, ttl: Duration) -> Self {
        Self {
            manager,
            ttl,
            prefix: "wordle-duel:lock:".to_string(),
        }
    }

    /// Namespace keys, e.g. to share one Redis between environments.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    async fn try_set(&self, key: &str, token: &str) -> EngineResult<bool> {
        let mut conn = self.manager.clone();
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(token)
            .arg("NX")
            .arg("PX")
            .arg(self.ttl.as_millis() as u64)
            .query_async(&mut conn)
            .await
            .map_err(|e| EngineError::Lock(e.into()))?;
        Ok(reply.is_some())
    }
}

#[async_trait]
impl LockProvider for RedisLockProvider {
    async fn try_acquire(
        &self,
        key: &str,
        timeout: Duration,
    ) -> EngineResult<Option<Box<dyn HeldLock>>> {
        let redis_key = format!("{}{}", self.prefix, key);
        let token = Uuid::new_v4().to_string();
        let deadline = Instant::now() + timeout;
        let mut backoff = INITIAL_BACKOFF;

        loop {
            if self.try_set(&redis_key, &token).await? {
                debug!(key = %redis_key, "Redis lock acquired");
                let lapsed = Arc::new(AtomicBool::new(false));
                let renewer = tokio::spawn(keep_alive(
                    self.manager.clone(),
                    redis_key.clone(),
                    token.clone(),
                    self.ttl,
                    lapsed.clone(),
                ));
                return Ok(Some(Box::new(RedisHeldLock {
                    key: key.to_string(),
                    redis_key,
                    token,
                    manager: self.manager.clone(),
                    renewer,
                    lapsed,
                    released: false,
                })));
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }

            // Jitter keeps contending instances from retrying in lockstep
            let jitter_ms = rand::rng().random_range(0..=backoff.as_millis() as u64 / 2);
            let pause = (backoff + Duration::from_millis(jitter_ms)).min(deadline - now);
            tokio::time::sleep(pause).await;
            backoff = (backoff * 2).min(MAX_BACKOFF);
        }
    }
}

struct RedisHeldLock {
    key: String,
    redis_key: String,
    token: String,
    manager: ConnectionManager,
    renewer: JoinHandle<()>,
    lapsed: Arc<AtomicBool>,
    released: bool,
}

/// Extend the TTL while the lock is held. Stops once the key is no longer ours.
async fn keep_alive(
    manager: ConnectionManager,
    redis_key: String,
    token: String,
    ttl: Duration,
    lapsed: Arc<AtomicBool>,
) {
    let interval = renew_interval(ttl);
    loop {
        tokio::time::sleep(interval).await;
        let mut conn = manager.clone();
        let renewed: redis::RedisResult<i64> = Script::new(RENEW_SCRIPT)
            .key(&redis_key)
            .arg(&token)
            .arg(ttl.as_millis() as u64)
            .invoke_async(&mut conn)
            .await;
        match renewed {
            Ok(1) => {}
            Ok(_) => {
                lapsed.store(true, Ordering::SeqCst);
                warn!(key = %redis_key, "Redis lock lost before release");
                return;
            }
            // Keep trying, the TTL still covers us for a while
            Err(e) => warn!(key = %redis_key, "Failed to renew Redis lock: {}", e),
        }
    }
}

async fn delete_if_owner(
    mut conn: ConnectionManager,
    redis_key: &str,
    token: &str,
) -> redis::RedisResult<bool> {
    let deleted: i64 = Script::new(RELEASE_SCRIPT)
        .key(redis_key)
        .arg(token)
        .invoke_async(&mut conn)
        .await?;
    Ok(deleted == 1)
}

#[async_trait]
impl HeldLock for RedisHeldLock {
    fn key(&self) -> &str {
        &self.key
    }

    async fn release(mut self: Box<Self>) -> EngineResult<()> {
        self.released = true;
        self.renewer.abort();
        if self.lapsed.load(Ordering::SeqCst) {
            return Err(EngineError::Lock(anyhow::anyhow!(
                "lock {} was lost while held",
                self.redis_key
            )));
        }
        let deleted = delete_if_owner(self.manager.clone(), &self.redis_key, &self.token)
            .await
            .map_err(|e| EngineError::Lock(e.into()))?;

        if !deleted {
            return Err(EngineError::Lock(anyhow::anyhow!(
                "lock {} expired before it was released",
                self.redis_key
            )));
        }
        debug!(key = %self.redis_key, "Redis lock released");
        Ok(())
    }
}

impl Drop for RedisHeldLock {
    fn drop(&mut self) {
        self.renewer.abort();
        if self.released {
            return;
        }
        // Dropped mid-action (panic or cancellation): release in the background,
        // the TTL covers the case where no runtime is left to do it
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let manager = self.manager.clone();
        let redis_key = std::mem::take(&mut self.redis_key);
        let token = std::mem::take(&mut self.token);
        handle.spawn(async move {
            if let Err(e) = delete_if_owner(manager, &redis_key, &token).await {
                warn!(key = %redis_key, "Background lock release failed: {}", e);
            }
        });
    }
}
