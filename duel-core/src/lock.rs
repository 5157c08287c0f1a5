//! Named mutual exclusion for room mutations.
//!
//! [`RoomLockManager`] is the only serialization point for state changes on a
//! room. It works against any [`LockProvider`]; this module ships the
//! process-local one, the server crate adds a distributed provider.

use async_trait::async_trait;
use dashmap::DashMap;
use duel_types::{GameError, RoomId};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, warn};

use crate::EngineResult;

/// A lock currently held by the caller.
///
/// `release` is the normal exit. Dropping without releasing must still free
/// the lock (panics, cancelled futures), possibly in the background.
#[async_trait]
pub trait HeldLock: Send {
    fn key(&self) -> &str;
    async fn release(self: Box<Self>) -> EngineResult<()>;
}

#[async_trait]
pub trait LockProvider: Send + Sync {
    /// Wait up to `timeout` for `key`. `Ok(None)` means the wait timed out.
    async fn try_acquire(
        &self,
        key: &str,
        timeout: Duration,
    ) -> EngineResult<Option<Box<dyn HeldLock>>>;
}

type LockTable = DashMap<String, Arc<Mutex<()>>>;

/// Process-local provider: one async mutex per key, created on demand and
/// dropped from the table as soon as nobody holds or waits for it.
#[derive(Default, Clone)]
pub struct LocalLockProvider {
    locks: Arc<LockTable>,
}

impl LocalLockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys with a live holder or waiter
    pub fn registered_keys(&self) -> usize {
        self.locks.len()
    }
}

/// Remove the entry unless someone besides the table still references it.
/// Runs under the shard lock, so it cannot race with a new waiter cloning it.
fn prune(locks: &LockTable, key: &str) {
    locks.remove_if(key, |_, handle| Arc::strong_count(handle) == 1);
}

#[async_trait]
impl LockProvider for LocalLockProvider {
    async fn try_acquire(
        &self,
        key: &str,
        timeout: Duration,
    ) -> EngineResult<Option<Box<dyn HeldLock>>> {
        let handle = {
            let entry = self
                .locks
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())));
            Arc::clone(entry.value())
        };

        match tokio::time::timeout(timeout, handle.lock_owned()).await {
            Ok(guard) => Ok(Some(Box::new(LocalHeldLock {
                key: key.to_string(),
                locks: self.locks.clone(),
                guard: Some(guard),
            }))),
            Err(_) => {
                prune(&self.locks, key);
                Ok(None)
            }
        }
    }
}

struct LocalHeldLock {
    key: String,
    locks: Arc<LockTable>,
    guard: Option<OwnedMutexGuard<()>>,
}

#[async_trait]
impl HeldLock for LocalHeldLock {
    fn key(&self) -> &str {
        &self.key
    }

    async fn release(self: Box<Self>) -> EngineResult<()> {
        // Drop does the work
        Ok(())
    }
}

impl Drop for LocalHeldLock {
    fn drop(&mut self) {
        // The guard owns a reference to the mutex; it must go before pruning
        drop(self.guard.take());
        prune(&self.locks, &self.key);
    }
}

pub fn room_lock_key(room_id: RoomId) -> String {
    format!("room:{room_id}")
}

pub struct RoomLockManager {
    provider: Arc<dyn LockProvider>,
}

impl RoomLockManager {
    pub fn new(provider: Arc<dyn LockProvider>) -> Self {
        Self { provider }
    }

    /// Run `action` while holding the lock of `room_id`.
    ///
    /// Fails with `RoomBusy` without running `action` if the lock is not
    /// obtained within `timeout`. The lock is released whatever `action`
    /// returns; if the action panics or this future is dropped, the held lock
    /// is freed by its drop. A failed release is logged and the action's
    /// result is kept, as its effects are already committed.
    pub async fn with_room_lock<T, F, Fut>(
        &self,
        room_id: RoomId,
        timeout: Duration,
        action: F,
    ) -> EngineResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = EngineResult<T>>,
    {
        let key = room_lock_key(room_id);
        let held = match self.provider.try_acquire(&key, timeout).await? {
            Some(held) => held,
            None => {
                warn!(%room_id, ?timeout, "Room lock not acquired in time");
                return Err(GameError::RoomBusy { room_id }.into());
            }
        };
        debug!(%room_id, "Room lock acquired");

        let result = action().await;

        if let Err(e) = held.release().await {
            warn!(%room_id, "Failed to release room lock: {}", e);
        } else {
            debug!(%room_id, "Room lock released");
        }
        result
    }
}
