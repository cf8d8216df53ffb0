//! Root/request trackers and the alert sink (§4.8): thin persistent maps.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use uuid::Uuid;

use crate::error::AceResult;
use crate::model::{AnalysisRequest, RootAnalysis};

#[async_trait]
pub trait RootTracker: Send + Sync {
    async fn put(&self, root: RootAnalysis);
    async fn get(&self, uuid: Uuid) -> Option<RootAnalysis>;
    async fn delete(&self, uuid: Uuid) -> bool;
    async fn list(&self) -> Vec<Uuid>;

    /// Roots last touched (put) before `cutoff` (§3's "destroyed on TTL
    /// expiry" lifecycle note, `SPEC_FULL.md` §5). Does not remove them —
    /// the caller deletes and emits the expiry event.
    async fn expired_before(&self, cutoff: DateTime<Utc>) -> Vec<Uuid>;
}

#[derive(Default)]
pub struct InMemoryRootTracker {
    roots: DashMap<Uuid, RootAnalysis>,
    last_touched: DashMap<Uuid, DateTime<Utc>>,
}

impl InMemoryRootTracker {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RootTracker for InMemoryRootTracker {
    async fn put(&self, root: RootAnalysis) {
        self.last_touched.insert(root.uuid, Utc::now());
        self.roots.insert(root.uuid, root);
    }

    async fn get(&self, uuid: Uuid) -> Option<RootAnalysis> {
        self.roots.get(&uuid).map(|r| r.clone())
    }

    async fn delete(&self, uuid: Uuid) -> bool {
        self.last_touched.remove(&uuid);
        self.roots.remove(&uuid).is_some()
    }

    async fn list(&self) -> Vec<Uuid> {
        self.roots.iter().map(|r| *r.key()).collect()
    }

    async fn expired_before(&self, cutoff: DateTime<Utc>) -> Vec<Uuid> {
        self.last_touched
            .iter()
            .filter(|e| *e.value() < cutoff)
            .map(|e| *e.key())
            .collect()
    }
}

#[async_trait]
pub trait AnalysisRequestTracker: Send + Sync {
    async fn put(&self, request: AnalysisRequest);
    async fn get(&self, id: Uuid) -> Option<AnalysisRequest>;
    async fn delete(&self, id: Uuid) -> bool;
    async fn list(&self) -> Vec<Uuid>;
}

#[derive(Default)]
pub struct InMemoryAnalysisRequestTracker {
    requests: DashMap<Uuid, AnalysisRequest>,
}

impl InMemoryAnalysisRequestTracker {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AnalysisRequestTracker for InMemoryAnalysisRequestTracker {
    async fn put(&self, request: AnalysisRequest) {
        self.requests.insert(request.id, request);
    }

    async fn get(&self, id: Uuid) -> Option<AnalysisRequest> {
        self.requests.get(&id).map(|r| r.clone())
    }

    async fn delete(&self, id: Uuid) -> bool {
        self.requests.remove(&id).is_some()
    }

    async fn list(&self) -> Vec<Uuid> {
        self.requests.iter().map(|r| *r.key()).collect()
    }
}

#[async_trait]
pub trait AlertSink: Send + Sync {
    /// Records an alert for `root`, returning whether it actually fired.
    /// Per §8: a root is never alerted twice unless new detection points
    /// were added since the last alert emitted for it.
    async fn track_alert(&self, root: &RootAnalysis) -> AceResult<bool>;
}

#[derive(Default)]
pub struct InMemoryAlertSink {
    last_alerted_count: DashMap<Uuid, usize>,
}

impl InMemoryAlertSink {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AlertSink for InMemoryAlertSink {
    async fn track_alert(&self, root: &RootAnalysis) -> AceResult<bool> {
        let current = root.detection_count();
        let fire = match self.last_alerted_count.get(&root.uuid) {
            Some(last) => current > *last,
            None => current > 0,
        };
        if fire {
            self.last_alerted_count.insert(root.uuid, current);
            tracing::info!(root = %root.uuid, detections = current, "alert tracked");
        }
        Ok(fire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Observable;

    #[tokio::test]
    async fn root_tracker_round_trips() {
        let tracker = InMemoryRootTracker::new();
        let root = RootAnalysis::new("analysis");
        let uuid = root.uuid;
        tracker.put(root).await;
        assert!(tracker.get(uuid).await.is_some());
        assert!(tracker.delete(uuid).await);
        assert!(tracker.get(uuid).await.is_none());
    }

    #[tokio::test]
    async fn a_freshly_touched_root_is_not_expired_by_a_past_cutoff() {
        let tracker = InMemoryRootTracker::new();
        let root = RootAnalysis::new("analysis");
        let uuid = root.uuid;
        tracker.put(root).await;
        let past = chrono::Utc::now() - chrono::Duration::hours(1);
        assert!(!tracker.expired_before(past).await.contains(&uuid));
        let future = chrono::Utc::now() + chrono::Duration::hours(1);
        assert!(tracker.expired_before(future).await.contains(&uuid));
    }

    /// §8 Scenario 6: a detection triggers exactly one alert; re-submitting
    /// the same state does not re-alert.
    #[tokio::test]
    async fn repeated_alerts_without_new_detections_are_suppressed() {
        let sink = InMemoryAlertSink::new();
        let mut root = RootAnalysis::new("analysis");
        let mut observable = Observable::new("ipv4", "3.127.0.4");
        observable.detections.insert("malicious".into());
        root.add_observable(observable);

        assert!(sink.track_alert(&root).await.unwrap());
        assert!(!sink.track_alert(&root).await.unwrap());

        let key = root.observables.keys().next().unwrap().clone();
        root.observables.get_mut(&key).unwrap().detections.insert("botnet".into());
        assert!(sink.track_alert(&root).await.unwrap());
    }

    #[tokio::test]
    async fn a_root_with_no_detections_never_alerts() {
        let sink = InMemoryAlertSink::new();
        let root = RootAnalysis::new("analysis");
        assert!(!sink.track_alert(&root).await.unwrap());
    }
}
