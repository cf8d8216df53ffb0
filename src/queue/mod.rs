//! Per-module work queues (§4.4): FIFO with lease + visibility timeout.

mod memory;

pub use memory::InMemoryWorkQueue;

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::error::AceResult;
use crate::model::AnalysisRequest;

#[async_trait]
pub trait WorkQueue: Send + Sync {
    async fn put(&self, request: AnalysisRequest) -> AceResult<()>;

    /// Leases the head-of-queue request to `owner` for `visibility_timeout`,
    /// or `None` if the queue has nothing visible right now.
    async fn get(&self, owner: &str, visibility_timeout: Duration) -> AceResult<Option<AnalysisRequest>>;

    async fn ack(&self, id: Uuid) -> AceResult<()>;

    /// Returns a leased request to the head of the queue immediately,
    /// clearing its ownership.
    async fn nack(&self, id: Uuid) -> AceResult<()>;

    async fn renew_lease(&self, id: Uuid, owner: &str, visibility_timeout: Duration) -> AceResult<()>;

    /// Reclaims any leases past their visibility timeout back onto the
    /// queue head. Called lazily by `get`, and periodically by the
    /// lease-expiry sweeper (`SPEC_FULL.md` §5) so idle queues don't hold
    /// expired work forever.
    async fn reclaim_expired(&self) -> AceResult<usize>;

    /// Outstanding (queued + leased) request count.
    async fn size(&self) -> usize;
}

/// Router binding one `WorkQueue` per `(AMT name, AMT version)` (§4.4: "need
/// not be fair across AMTs" — each gets its own independent queue). Keying
/// by version too is what makes a re-registration at a new version bind a
/// fresh queue rather than reuse the old one (§4.3: "a fresh queue is bound
/// to the new version identifier, and the old queue is marked invalidated" —
/// the old `(name, old_version)` entry is simply never dispatched into
/// again, since `AceCore::register_module`/`dispatch_new_work` always route
/// through the currently-registered version).
#[derive(Default)]
pub struct WorkQueues {
    queues: DashMap<(String, u32), Arc<dyn WorkQueue>>,
}

impl WorkQueues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue_for(&self, amt_name: &str, amt_version: u32) -> Arc<dyn WorkQueue> {
        self.queues
            .entry((amt_name.to_string(), amt_version))
            .or_insert_with(|| Arc::new(InMemoryWorkQueue::new()))
            .clone()
    }

    pub fn names(&self) -> Vec<(String, u32)> {
        self.queues.iter().map(|e| e.key().clone()).collect()
    }
}
