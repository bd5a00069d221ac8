//! Distributed lock (§4.6): out of scope as a product choice, so the default
//! adapter is a `sled`-backed compare-and-swap on a dedicated `locks` tree,
//! the same manual-CAS technique used for a Persona's `generation_in_progress`
//! guard (I4).
//!
//! Lock key format and lease/timeout semantics are unchanged from §4.6: a key
//! of `feedback-session-lock:{sessionId}`, held until `release` or until the
//! lease expires, whichever comes first. A timed-out acquisition attempt is
//! `AiServiceTransient` (retriable) rather than stranding the caller — the
//! corrected behavior from §9, not the source's documented bug.

use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LockRecord {
    holder_id: String,
    expires_at_ms: i64,
}

/// Held while in scope; `release()` clears the row early, otherwise the lease
/// expiry reclaims it.
pub struct LockGuard {
    tree: sled::Tree,
    key: String,
    holder_id: String,
}

impl LockGuard {
    pub async fn release(self) -> Result<(), CoreError> {
        if let Some(bytes) = self.tree.get(self.key.as_bytes())? {
            let record: LockRecord = serde_json::from_slice(&bytes)?;
            if record.holder_id == self.holder_id {
                self.tree.remove(self.key.as_bytes())?;
            }
        }
        Ok(())
    }
}

#[async_trait::async_trait]
pub trait DistributedLock: Send + Sync {
    async fn acquire(&self, key: &str, lease: Duration, wait: Duration) -> Result<LockGuard, CoreError>;
}

pub struct SledLock {
    tree: sled::Tree,
}

impl SledLock {
    pub fn new(db: &sled::Db) -> Result<Self, CoreError> {
        Ok(Self {
            tree: db.open_tree("locks")?,
        })
    }

    fn try_once(&self, key: &str, lease: Duration) -> Result<Option<LockGuard>, CoreError> {
        let now_ms = Utc::now().timestamp_millis();
        let holder_id = uuid::Uuid::new_v4().to_string();
        let new_record = LockRecord {
            holder_id: holder_id.clone(),
            expires_at_ms: now_ms + lease.as_millis() as i64,
        };
        let new_bytes = serde_json::to_vec(&new_record)?;

        let current = self.tree.get(key.as_bytes())?;
        let current_is_free = match &current {
            None => true,
            Some(bytes) => {
                let existing: LockRecord = serde_json::from_slice(bytes)?;
                existing.expires_at_ms <= now_ms
            }
        };
        if !current_is_free {
            return Ok(None);
        }

        let swapped = self
            .tree
            .compare_and_swap(key.as_bytes(), current.as_deref(), Some(new_bytes.as_slice()))?;
        if swapped.is_ok() {
            Ok(Some(LockGuard {
                tree: self.tree.clone(),
                key: key.to_string(),
                holder_id,
            }))
        } else {
            Ok(None)
        }
    }
}

#[async_trait::async_trait]
impl DistributedLock for SledLock {
    /// Polls every 20ms until `wait` elapses. A `wait` timeout maps to
    /// `AiServiceTransient` so the termination detector's caller treats it as
    /// retriable (§9: corrected lock-timeout behavior).
    async fn acquire(&self, key: &str, lease: Duration, wait: Duration) -> Result<LockGuard, CoreError> {
        let deadline = tokio::time::Instant::now() + wait;
        loop {
            if let Some(guard) = self.try_once(key, lease)? {
                return Ok(guard);
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(CoreError::AiServiceTransient(format!(
                    "timed out acquiring lock {key}"
                )));
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_db() -> sled::Db {
        sled::Config::new().temporary(true).open().unwrap()
    }

    #[tokio::test]
    async fn second_acquirer_waits_until_release() {
        let db = temp_db();
        let lock = SledLock::new(&db).unwrap();

        let guard = lock
            .acquire("feedback-session-lock:s1", Duration::from_secs(5), Duration::from_millis(50))
            .await
            .unwrap();

        let blocked = lock
            .acquire("feedback-session-lock:s1", Duration::from_secs(5), Duration::from_millis(50))
            .await;
        assert!(blocked.is_err());
        assert!(blocked.unwrap_err().retriable());

        guard.release().await.unwrap();

        let reacquired = lock
            .acquire("feedback-session-lock:s1", Duration::from_secs(5), Duration::from_millis(50))
            .await;
        assert!(reacquired.is_ok());
    }

    #[tokio::test]
    async fn expired_lease_is_reclaimable() {
        let db = temp_db();
        let lock = SledLock::new(&db).unwrap();

        let _guard = lock
            .acquire("feedback-session-lock:s2", Duration::from_millis(10), Duration::from_millis(50))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(30)).await;

        let reacquired = lock
            .acquire("feedback-session-lock:s2", Duration::from_secs(5), Duration::from_millis(50))
            .await;
        assert!(reacquired.is_ok());
    }
}
