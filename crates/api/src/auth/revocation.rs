//! Revoked token registry keyed by `jti`.
//!
//! Entries live until the token's own `exp`; after that the signature check
//! rejects the token anyway, so the entry is dropped on the next insert.
//! Nothing is persisted: revocations do not survive a restart and are not
//! shared between replicas.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Storage seam for revoked token ids.
pub trait RevocationStore: Send + Sync {
    /// Record `jti` as revoked until `expires_at` (UTC Unix seconds).
    fn revoke(&self, jti: &str, expires_at: i64);

    fn is_revoked(&self, jti: &str) -> bool;

    /// Number of tracked entries.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Process-local registry guarded by a mutex.
#[derive(Debug, Default)]
pub struct InMemoryRevocationStore {
    entries: Mutex<HashMap<String, i64>>,
}

impl InMemoryRevocationStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, i64>> {
        // A panic while holding the lock cannot leave the map half-written.
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl RevocationStore for InMemoryRevocationStore {
    fn revoke(&self, jti: &str, expires_at: i64) {
        let now = chrono::Utc::now().timestamp();
        let mut entries = self.entries();
        let before = entries.len();
        entries.retain(|_, exp| *exp > now);
        let swept = before - entries.len();
        entries.insert(jti.to_string(), expires_at);
        if swept > 0 {
            tracing::debug!(swept, remaining = entries.len(), "Swept expired revocations");
        }
    }

    fn is_revoked(&self, jti: &str) -> bool {
        self.entries().contains_key(jti)
    }

    fn len(&self) -> usize {
        self.entries().len()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn in_an_hour() -> i64 {
        chrono::Utc::now().timestamp() + 3600
    }

    #[test]
    fn revoked_id_is_reported() {
        let store = InMemoryRevocationStore::new();
        assert!(!store.is_revoked("abc"));
        store.revoke("abc", in_an_hour());
        assert!(store.is_revoked("abc"));
        assert!(!store.is_revoked("def"));
    }

    #[test]
    fn insert_sweeps_expired_entries() {
        let store = InMemoryRevocationStore::new();
        let past = chrono::Utc::now().timestamp() - 10;
        store.revoke("old", past);
        assert!(store.is_revoked("old"));

        store.revoke("new", in_an_hour());
        assert!(!store.is_revoked("old"));
        assert!(store.is_revoked("new"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn revoking_twice_keeps_one_entry() {
        let store = InMemoryRevocationStore::new();
        store.revoke("abc", in_an_hour());
        store.revoke("abc", in_an_hour());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn concurrent_inserts_are_all_recorded() {
        let store = Arc::new(InMemoryRevocationStore::new());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for i in 0..50 {
                        store.revoke(&format!("{t}-{i}"), in_an_hour());
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(store.len(), 400);
        assert!(store.is_revoked("7-49"));
    }
}
