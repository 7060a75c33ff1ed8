//! Named run locks with expiry.
//!
//! A periodic job takes a lock before doing any work so that overlapping
//! invocations (a slow tick, a second worker) cannot send duplicate
//! notifications. Locks expire on their own so a crashed holder cannot block
//! the job forever, and a release only clears the lock it was issued for.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{AlarmError, Result};

/// Default lock expiry: 30 minutes.
pub const DEFAULT_LOCK_TTL: Duration = Duration::from_secs(30 * 60);

/// Proof of holding a named lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockToken {
    /// The lock name.
    pub key: String,
    /// Unique value identifying this acquisition.
    pub token: String,
    /// When the lock expires if not released.
    pub expires_at: DateTime<Utc>,
}

/// A cooperative, expiring mutual-exclusion primitive keyed by name.
pub trait RunLock: Send + Sync + std::fmt::Debug {
    /// Takes the lock `key` for `ttl` unless someone else holds it unexpired.
    ///
    /// Returns `None` when the lock is held.
    fn try_acquire(
        &self,
        key: &str,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<Option<LockToken>>;

    /// Releases the lock if `token` still owns it.
    ///
    /// Returns `false` when the lock had expired and been taken over.
    fn release(&self, token: &LockToken) -> Result<bool>;
}

#[derive(Debug, Clone)]
struct Holder {
    token: String,
    expires_at: DateTime<Utc>,
}

/// Process-local [`RunLock`].
///
/// Cloning shares the lock table.
#[derive(Debug, Clone, Default)]
pub struct MemoryRunLock {
    held: Arc<Mutex<HashMap<String, Holder>>>,
}

impl MemoryRunLock {
    /// Creates an empty lock table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if `key` is held and unexpired at `now`.
    #[must_use]
    pub fn is_held(&self, key: &str, now: DateTime<Utc>) -> bool {
        self.held
            .lock()
            .get(key)
            .is_some_and(|h| h.expires_at > now)
    }
}

impl RunLock for MemoryRunLock {
    fn try_acquire(
        &self,
        key: &str,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<Option<LockToken>> {
        let ttl = chrono::Duration::from_std(ttl)
            .map_err(|e| AlarmError::configuration(format!("invalid lock ttl: {e}")))?;

        let mut held = self.held.lock();
        if let Some(holder) = held.get(key) {
            if holder.expires_at > now {
                debug!(key, expires_at = %holder.expires_at, "run lock is held");
                return Ok(None);
            }
            warn!(key, expired_at = %holder.expires_at, "taking over expired run lock");
        }

        let token = LockToken {
            key: key.to_string(),
            token: Uuid::new_v4().to_string(),
            expires_at: now + ttl,
        };
        held.insert(
            key.to_string(),
            Holder {
                token: token.token.clone(),
                expires_at: token.expires_at,
            },
        );
        Ok(Some(token))
    }

    fn release(&self, token: &LockToken) -> Result<bool> {
        let mut held = self.held.lock();
        match held.get(&token.key) {
            Some(holder) if holder.token == token.token => {
                held.remove(&token.key);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

/// Scoped ownership of a named lock; released when dropped.
#[derive(Debug)]
pub struct LockGuard<'a> {
    lock: &'a dyn RunLock,
    token: LockToken,
}

impl<'a> LockGuard<'a> {
    /// Acquires `key`, returning `None` if another holder has it.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock backend fails.
    pub fn acquire(
        lock: &'a dyn RunLock,
        key: &str,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<Option<Self>> {
        Ok(lock
            .try_acquire(key, ttl, now)?
            .map(|token| Self { lock, token }))
    }
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        match self.lock.release(&self.token) {
            Ok(true) => debug!(key = %self.token.key, "released run lock"),
            Ok(false) => warn!(key = %self.token.key, "run lock expired before release"),
            Err(e) => warn!(key = %self.token.key, error = %e, "failed to release run lock"),
        }
    }
}
