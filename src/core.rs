//! `AceCore` — the explicit, passed-by-reference subsystem bundle that
//! replaces the Python source's process-global `get_system()` (§9 design
//! note). No singleton: tests and the local/remote dual-backend scenario can
//! hold as many `AceCore`s as they like without collision.

use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::blob::BlobStore;
use crate::cache::ResultCache;
use crate::error::{AceError, AceResult};
use crate::events::EventBus;
use crate::lock::LockManager;
use crate::model::{AnalysisModuleType, AnalysisRequest, AnalysisResult, RootAnalysis};
use crate::processor::{ProcessInput, ProcessorConfig, RequestProcessor};
use crate::queue::WorkQueues;
use crate::registry::{ModuleRegistry, RegisterOutcome};
use crate::trackers::{AlertSink, AnalysisRequestTracker, RootTracker};

/// Every pluggable subsystem, composed behind `Arc<dyn Trait>` (§2). This
/// workspace wires exactly the in-memory family in `main.rs`; a SQL- or
/// Redis-backed deployment would construct the same struct with different
/// concrete types behind each field.
pub struct AceCore {
    pub registry: Arc<dyn ModuleRegistry>,
    pub queues: Arc<WorkQueues>,
    pub locks: Arc<dyn LockManager>,
    pub cache: Arc<dyn ResultCache>,
    pub events: Arc<dyn EventBus>,
    pub roots: Arc<dyn RootTracker>,
    pub requests: Arc<dyn AnalysisRequestTracker>,
    pub alerts: Arc<dyn AlertSink>,
    pub blobs: Arc<dyn BlobStore>,
    processor: RequestProcessor,
    visibility_timeout: Duration,
    /// `None` disables TTL-based root expiration (§3 lifecycle note,
    /// `SPEC_FULL.md` §5).
    root_ttl: Option<chrono::Duration>,
}

#[allow(clippy::too_many_arguments)]
pub struct AceCoreBuilder {
    pub registry: Arc<dyn ModuleRegistry>,
    pub queues: Arc<WorkQueues>,
    pub locks: Arc<dyn LockManager>,
    pub cache: Arc<dyn ResultCache>,
    pub events: Arc<dyn EventBus>,
    pub roots: Arc<dyn RootTracker>,
    pub requests: Arc<dyn AnalysisRequestTracker>,
    pub alerts: Arc<dyn AlertSink>,
    pub blobs: Arc<dyn BlobStore>,
    pub processor_config: ProcessorConfig,
    pub visibility_timeout: Duration,
    pub root_ttl: Option<chrono::Duration>,
}

impl AceCoreBuilder {
    pub fn build(self) -> AceCore {
        let processor = RequestProcessor::new(
            self.registry.clone(),
            self.queues.clone(),
            self.locks.clone(),
            self.cache.clone(),
            self.events.clone(),
            self.roots.clone(),
            self.requests.clone(),
            self.alerts.clone(),
            self.processor_config,
        );
        AceCore {
            registry: self.registry,
            queues: self.queues,
            locks: self.locks,
            cache: self.cache,
            events: self.events,
            roots: self.roots,
            requests: self.requests,
            alerts: self.alerts,
            blobs: self.blobs,
            processor,
            visibility_timeout: self.visibility_timeout,
            root_ttl: self.root_ttl,
        }
    }
}

impl AceCore {
    /// Submit a fresh root (§4.2, path (a)).
    pub async fn submit_root(&self, root: RootAnalysis) -> AceResult<Uuid> {
        self.processor.process_analysis_request(ProcessInput::RootSubmission(root)).await
    }

    /// Post a completed observable-analysis result (§4.2, path (b)).
    pub async fn post_result(&self, result: AnalysisResult) -> AceResult<Uuid> {
        self.processor.process_analysis_request(ProcessInput::Result(result)).await
    }

    pub async fn get_root(&self, uuid: Uuid) -> AceResult<RootAnalysis> {
        self.roots.get(uuid).await.ok_or_else(|| AceError::not_found(format!("no root {uuid}")))
    }

    pub async fn register_module(&self, amt: AnalysisModuleType) -> AceResult<RegisterOutcome> {
        let name = amt.name.clone();
        let outcome = self.registry.register(amt).await?;
        let topic = match outcome {
            RegisterOutcome::New => Some("/core/module/new"),
            RegisterOutcome::Replaced { .. } => Some("/core/module/modified"),
            RegisterOutcome::Unchanged => None,
        };
        if let Some(topic) = topic {
            self.events.emit(topic, serde_json::json!({"name": name}), None).await;
        }
        Ok(outcome)
    }

    pub async fn unregister_module(&self, name: &str) -> AceResult<bool> {
        let removed = self.registry.unregister(name).await?;
        if removed {
            self.events.emit("/core/module/deleted", serde_json::json!({"name": name}), None).await;
        }
        Ok(removed)
    }

    pub async fn get_module(&self, name: &str) -> Option<AnalysisModuleType> {
        self.registry.get(name).await
    }

    /// §4.3: "the core returns a leased request only if the version
    /// matches, else `None`".
    pub async fn get_next_analysis_request(
        &self,
        amt_name: &str,
        amt_version: u32,
        owner: &str,
        visibility_timeout: Option<Duration>,
    ) -> AceResult<Option<AnalysisRequest>> {
        if !self.registry.is_current_version(amt_name, amt_version).await {
            return Ok(None);
        }
        let timeout = visibility_timeout.unwrap_or(self.visibility_timeout);
        self.queues.queue_for(amt_name, amt_version).get(owner, timeout).await
    }

    /// `amt_version` identifies which queue the request was leased from —
    /// callers ack against the version they actually leased, which may be
    /// older than the currently-registered one if the module was replaced
    /// mid-flight (§4.3: "leased-from-old requests still return").
    pub async fn ack_work(&self, amt_name: &str, amt_version: u32, request_id: Uuid) -> AceResult<()> {
        self.queues.queue_for(amt_name, amt_version).ack(request_id).await
    }

    pub async fn store_blob(&self, bytes: Vec<u8>) -> AceResult<crate::model::BlobHandle> {
        self.blobs.store(bytes).await
    }

    pub async fn load_blob(&self, handle: &crate::model::BlobHandle) -> AceResult<Option<Vec<u8>>> {
        self.blobs.load(handle).await
    }

    pub async fn subscribe(&self, topic: &str) -> tokio::sync::broadcast::Receiver<crate::events::Event> {
        self.events.subscribe(topic).await
    }

    /// Lease/cache-TTL sweep, run periodically by `ScheduledExecutor` tasks
    /// (`SPEC_FULL.md` §5).
    pub async fn sweep(&self) {
        for (name, version) in self.queues.names() {
            let reclaimed = self.queues.queue_for(&name, version).reclaim_expired().await.unwrap_or(0);
            if reclaimed > 0 {
                tracing::debug!(amt = %name, version, reclaimed, "work queue lease sweep");
            }
        }
        let reclaimed_locks = self.locks.reclaim_expired().await;
        if reclaimed_locks > 0 {
            tracing::debug!(reclaimed_locks, "lock lease sweep");
        }
        let evicted = self.cache.sweep_expired().await;
        if evicted > 0 {
            tracing::debug!(evicted, "cache sweep");
        }

        if let Some(ttl) = self.root_ttl {
            let cutoff = chrono::Utc::now() - ttl;
            for uuid in self.roots.expired_before(cutoff).await {
                if self.roots.delete(uuid).await {
                    tracing::info!(root = %uuid, "root expired by ttl");
                    self.events
                        .emit("/core/analysis/root/expired", serde_json::json!({"uuid": uuid}), Some(uuid))
                        .await;
                }
            }
        }
    }
}
