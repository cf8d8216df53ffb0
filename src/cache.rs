//! Result cache (§4.6): keyed result memoization with diff replay.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use sha2::{Digest, Sha256};
use std::time::Duration;

use crate::model::{AnalysisModuleType, ObservableKey, RootAnalysis};

/// Projects the §3 invariant-(5) 6-tuple
/// `(observable.type, observable.value, observable.time?, amt.name, amt.version, extended_cache_keys…)`
/// to a short deterministic string.
pub fn cache_key(observable: &ObservableKey, amt: &AnalysisModuleType) -> String {
    let mut hasher = Sha256::new();
    hasher.update(observable.obs_type.as_bytes());
    hasher.update(b"\0");
    hasher.update(observable.value.as_bytes());
    hasher.update(b"\0");
    if let Some(time) = observable.time {
        hasher.update(time.to_rfc3339().as_bytes());
    }
    hasher.update(b"\0");
    hasher.update(amt.name.as_bytes());
    hasher.update(b"\0");
    hasher.update(amt.version.to_le_bytes());
    for extra in &amt.extended_cache_keys {
        hasher.update(b"\0");
        hasher.update(extra.as_bytes());
    }
    hex::encode(hasher.finalize())
}

#[derive(Clone)]
struct Entry {
    before: RootAnalysis,
    after: RootAnalysis,
    created_at: DateTime<Utc>,
    ttl: Duration,
}

impl Entry {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        let ttl = chrono::Duration::from_std(self.ttl).unwrap_or(chrono::Duration::zero());
        now - self.created_at >= ttl
    }
}

#[async_trait]
pub trait ResultCache: Send + Sync {
    /// A miss includes an expired entry — it is lazily removed, not
    /// returned (§4.6).
    async fn get(&self, key: &str) -> Option<(RootAnalysis, RootAnalysis)>;

    /// Best-effort idempotent: callers must tolerate a dropped `put` (the
    /// cache is advisory — §4.6).
    async fn put(&self, key: String, before: RootAnalysis, after: RootAnalysis, ttl: Duration);

    async fn sweep_expired(&self) -> usize;
}

#[derive(Default)]
pub struct InMemoryResultCache {
    entries: DashMap<String, Entry>,
}

impl InMemoryResultCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ResultCache for InMemoryResultCache {
    async fn get(&self, key: &str) -> Option<(RootAnalysis, RootAnalysis)> {
        let now = Utc::now();
        match self.entries.get(key) {
            Some(entry) if entry.is_expired(now) => {
                drop(entry);
                self.entries.remove(key);
                None
            }
            Some(entry) => Some((entry.before.clone(), entry.after.clone())),
            None => None,
        }
    }

    async fn put(&self, key: String, before: RootAnalysis, after: RootAnalysis, ttl: Duration) {
        self.entries.insert(key, Entry { before, after, created_at: Utc::now(), ttl });
    }

    async fn sweep_expired(&self) -> usize {
        let now = Utc::now();
        let expired: Vec<String> =
            self.entries.iter().filter(|e| e.value().is_expired(now)).map(|e| e.key().clone()).collect();
        for key in &expired {
            self.entries.remove(key);
        }
        expired.len()
    }
}
