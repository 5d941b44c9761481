//! Lock Coordinator - Per-Component Exclusive Locks
//!
//! Serializes concurrent promotion attempts on the same component. Two
//! requests with different tokens both pass the idempotency check as
//! `Proceed`; without this lock they would interleave inside the store and
//! double-delete or double-reparent. The guard is acquired before the
//! transaction begins and dropped after commit or rollback, which gives the
//! lock transaction scope.
//!
//! The embedded libsql store is single-process, so the lock is an in-process
//! registry of per-key async mutexes rather than a database advisory lock.
//! Acquisition waits a bounded time and then fails with a retryable
//! conflict - the lock never silently skips.

use crate::services::error::PromotionError;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Default bound on how long an acquisition waits for a contended key.
const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(5);

/// Registry entries with no waiter and no holder are pruned once the map
/// grows past this size.
const PRUNE_THRESHOLD: usize = 1024;

/// Exclusive lock guard; dropping it releases the component's lock.
#[derive(Debug)]
pub struct LockGuard {
    _guard: OwnedMutexGuard<()>,
}

/// Per-key exclusive lock registry with bounded wait.
pub struct LockCoordinator {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
    wait_timeout: Duration,
}

impl Default for LockCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl LockCoordinator {
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_WAIT_TIMEOUT)
    }

    pub fn with_timeout(wait_timeout: Duration) -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
            wait_timeout,
        }
    }

    /// Acquire the exclusive lock for `key`, waiting at most the configured
    /// timeout. On timeout the caller gets a retryable `Conflict`.
    pub async fn acquire(&self, key: &str) -> Result<LockGuard, PromotionError> {
        let entry = {
            let mut locks = self
                .locks
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            if locks.len() > PRUNE_THRESHOLD {
                locks.retain(|_, m| Arc::strong_count(m) > 1);
            }
            locks
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };

        match tokio::time::timeout(self.wait_timeout, entry.lock_owned()).await {
            Ok(guard) => Ok(LockGuard { _guard: guard }),
            Err(_) => Err(PromotionError::conflict(format!(
                "Could not acquire promotion lock for component {} within {:?}",
                key, self.wait_timeout
            ))),
        }
    }
}
