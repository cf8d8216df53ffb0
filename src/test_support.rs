//! Test fixture (`SPEC_FULL.md` §1.4): a fully in-memory `AceCore`, the way
//! the teacher's test suite built a throwaway pool via `create_test_db()`.

use std::sync::Arc;
use std::time::Duration;

use crate::blob::InMemoryBlobStore;
use crate::cache::InMemoryResultCache;
use crate::core::{AceCore, AceCoreBuilder};
use crate::events::InMemoryEventBus;
use crate::lock::InMemoryLockManager;
use crate::processor::ProcessorConfig;
use crate::queue::WorkQueues;
use crate::registry::InMemoryModuleRegistry;
use crate::trackers::{InMemoryAlertSink, InMemoryAnalysisRequestTracker, InMemoryRootTracker};

pub fn test_core() -> AceCore {
    AceCoreBuilder {
        registry: Arc::new(InMemoryModuleRegistry::new()),
        queues: Arc::new(WorkQueues::new()),
        locks: Arc::new(InMemoryLockManager::new()),
        cache: Arc::new(InMemoryResultCache::new()),
        events: Arc::new(InMemoryEventBus::new()),
        roots: Arc::new(InMemoryRootTracker::new()),
        requests: Arc::new(InMemoryAnalysisRequestTracker::new()),
        alerts: Arc::new(InMemoryAlertSink::new()),
        blobs: Arc::new(InMemoryBlobStore::new()),
        processor_config: ProcessorConfig {
            lock_wait: Duration::from_secs(2),
            lock_lease: Duration::from_secs(10),
            visibility_timeout: Duration::from_secs(30),
        },
        visibility_timeout: Duration::from_secs(30),
        root_ttl: None,
    }
    .build()
}
