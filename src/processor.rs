//! Request processor (§4.2): the one root-lock-guarded critical section
//! that turns submissions and posted results into tracked-root mutations,
//! new work, cache writes, alerts, and completion.

use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::cache::cache_key;
use crate::error::{AceError, AceResult};
use crate::events::EventBus;
use crate::lock::{root_lock_name, LockManager};
use crate::model::{AnalysisRequest, AnalysisResult, ObservableKey, RootAnalysis};
use crate::queue::WorkQueues;
use crate::registry::ModuleRegistry;
use crate::trackers::{AlertSink, AnalysisRequestTracker, RootTracker};

pub enum ProcessInput {
    /// (a) a fresh root-only request.
    RootSubmission(RootAnalysis),
    /// (b) a returned observable-analysis result.
    Result(AnalysisResult),
}

pub struct ProcessorConfig {
    pub lock_wait: Duration,
    pub lock_lease: Duration,
    pub visibility_timeout: Duration,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            lock_wait: Duration::from_secs(10),
            lock_lease: Duration::from_secs(30),
            visibility_timeout: Duration::from_secs(60),
        }
    }
}

pub struct RequestProcessor {
    registry: Arc<dyn ModuleRegistry>,
    queues: Arc<WorkQueues>,
    locks: Arc<dyn LockManager>,
    cache: Arc<dyn crate::cache::ResultCache>,
    events: Arc<dyn EventBus>,
    roots: Arc<dyn RootTracker>,
    requests: Arc<dyn AnalysisRequestTracker>,
    alerts: Arc<dyn AlertSink>,
    config: ProcessorConfig,
    /// This processor's lock owner identity (§4.5: "a manager picks
    /// `host:pid:thread:uuid`"). Stable for the process's lifetime; safe to
    /// share across concurrent calls because a single call only ever holds
    /// one lock at a time.
    owner: String,
}

impl RequestProcessor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        registry: Arc<dyn ModuleRegistry>,
        queues: Arc<WorkQueues>,
        locks: Arc<dyn LockManager>,
        cache: Arc<dyn crate::cache::ResultCache>,
        events: Arc<dyn EventBus>,
        roots: Arc<dyn RootTracker>,
        requests: Arc<dyn AnalysisRequestTracker>,
        alerts: Arc<dyn AlertSink>,
        config: ProcessorConfig,
    ) -> Self {
        Self {
            registry,
            queues,
            locks,
            cache,
            events,
            roots,
            requests,
            alerts,
            config,
            owner: format!("aced-processor:{}", Uuid::new_v4()),
        }
    }

    /// Steps 1 and 8: acquire/release the root lock around the critical
    /// section in steps 2–7.
    pub async fn process_analysis_request(&self, input: ProcessInput) -> AceResult<Uuid> {
        let root_uuid = match &input {
            ProcessInput::RootSubmission(r) => r.uuid,
            ProcessInput::Result(r) => r.root_uuid,
        };
        let lock_name = root_lock_name(root_uuid);

        self.locks.acquire(&lock_name, &self.owner, self.config.lock_lease, self.config.lock_wait).await?;
        let outcome = self.process_locked(root_uuid, input).await;
        self.locks.release(&lock_name, &self.owner).await;
        outcome
    }

    async fn process_locked(&self, root_uuid: Uuid, input: ProcessInput) -> AceResult<Uuid> {
        let (mut tracked, new_detections) = match input {
            ProcessInput::RootSubmission(incoming) => self.apply_submission(root_uuid, incoming).await?,
            ProcessInput::Result(result) => self.apply_result(root_uuid, result).await?,
        };

        // Step 5: scan for newly-dispatchable AMTs across every observable.
        let dispatched_detections = self.dispatch_new_work(&mut tracked).await?;
        let total_new_detections = new_detections + dispatched_detections;

        // Step 6: alert idempotently on new detection points.
        if total_new_detections > 0 && self.alerts.track_alert(&tracked).await? {
            self.events
                .emit("/core/alert", serde_json::json!({"root_uuid": root_uuid}), Some(root_uuid))
                .await;
        }

        // Step 7: mark complete if nothing is outstanding.
        if tracked.is_complete() {
            self.events
                .emit("/core/analysis/root/completed", serde_json::json!({"root_uuid": root_uuid}), Some(root_uuid))
                .await;
        }

        self.roots.put(tracked).await;
        Ok(root_uuid)
    }

    /// Steps 2–3: a fresh root-only submission, either establishing a new
    /// tracked root or direct-merging onto an existing one.
    async fn apply_submission(&self, root_uuid: Uuid, incoming: RootAnalysis) -> AceResult<(RootAnalysis, usize)> {
        match self.roots.get(root_uuid).await {
            None => {
                self.events
                    .emit("/core/analysis/root/new", serde_json::json!({"root_uuid": root_uuid}), Some(root_uuid))
                    .await;
                let new_detections = incoming.detection_count();
                Ok((incoming, new_detections))
            }
            Some(mut tracked) => {
                let before_count = tracked.detection_count();
                tracked.apply_merge(&incoming);
                let new_detections = tracked.detection_count().saturating_sub(before_count);
                self.events
                    .emit(
                        "/core/analysis/root/modified",
                        serde_json::json!({"root_uuid": root_uuid}),
                        Some(root_uuid),
                    )
                    .await;
                Ok((tracked, new_detections))
            }
        }
    }

    /// Step 4: a posted result, diff-merged onto the tracked root unless the
    /// AMT it was computed against has since been replaced (§8 Scenario 4).
    async fn apply_result(&self, root_uuid: Uuid, result: AnalysisResult) -> AceResult<(RootAnalysis, usize)> {
        let mut tracked = self
            .roots
            .get(root_uuid)
            .await
            .ok_or_else(|| AceError::not_found(format!("no tracked root {root_uuid}")))?;

        if !self.registry.is_current_version(&result.amt_name, result.amt_version).await {
            tracing::debug!(
                amt = %result.amt_name,
                version = result.amt_version,
                request = %result.request_id,
                "dropping stale result: amt version has since been replaced"
            );
            return Ok((tracked, 0));
        }

        let new_detections = tracked.apply_diff_merge(&result.root_before, &result.root);
        tracked.outstanding_requests.remove(&result.request_id);
        if let Some(key) = &result.observable {
            if let Some(obs) = tracked.observables.get_mut(key) {
                obs.outstanding_requests.remove(&result.request_id);
            }
        }
        self.requests.delete(result.request_id).await;

        if let (Some(observable_key), Some(amt)) =
            (&result.observable, self.registry.get(&result.amt_name).await)
        {
            if let Some(ttl_secs) = amt.cache_ttl_secs {
                let key = cache_key(observable_key, &amt);
                self.cache.put(key, result.root_before, result.root, Duration::from_secs(ttl_secs)).await;
            }
        }

        Ok((tracked, new_detections))
    }

    /// Step 5: for every observable, for every registered non-manual AMT
    /// whose type/prerequisites match, whose `depends_on` modules have all
    /// already completed against the observable, and which hasn't already
    /// analyzed it, either replay a cache hit in place or enqueue fresh
    /// work.
    async fn dispatch_new_work(&self, tracked: &mut RootAnalysis) -> AceResult<usize> {
        let amts = self.registry.list().await;
        let mut new_detections = 0;
        let keys: Vec<ObservableKey> = tracked.observables.keys().cloned().collect();

        for key in keys {
            let (obs_type, tags, directives, has_analysis, completed): (
                String,
                _,
                _,
                Box<dyn Fn(&str) -> bool + Send>,
                std::collections::HashSet<String>,
            ) = {
                let obs = &tracked.observables[&key];
                let tags = obs.tags.as_set();
                let directives = obs.directives.as_set();
                let analyses = obs.analyses.keys().cloned().collect::<std::collections::HashSet<_>>();
                let completed = obs
                    .analyses
                    .iter()
                    .filter(|(_, analysis)| !matches!(analysis.status, crate::model::AnalysisStatus::Pending))
                    .map(|(name, _)| name.clone())
                    .collect();
                (obs.obs_type.clone(), tags, directives, Box::new(move |name: &str| analyses.contains(name)), completed)
            };

            for amt in &amts {
                if amt.manual || !amt.accepts(&obs_type) {
                    continue;
                }
                if has_analysis(&amt.name) {
                    continue;
                }
                if !amt.prerequisites_met(&tags, &directives) {
                    continue;
                }
                if !amt.dependencies_met(&completed) {
                    continue;
                }

                if amt.cacheable() {
                    let key_str = cache_key(&key, amt);
                    if let Some((cached_before, cached_after)) = self.cache.get(&key_str).await {
                        // §7 open question (b): replay regardless of whether
                        // `cached_before` matches the current tracked state.
                        new_detections += tracked.apply_diff_merge(&cached_before, &cached_after);
                        tracing::debug!(amt = %amt.name, observable = %key, "cache hit, replayed diff");
                        continue;
                    }
                }

                let request = AnalysisRequest::observable_work(tracked.clone(), key.clone(), amt.clone());
                let request_id = request.id;
                self.requests.put(request.clone()).await;
                self.queues.queue_for(&amt.name, amt.version).put(request).await?;

                tracked.outstanding_requests.insert(request_id);
                if let Some(obs) = tracked.observables.get_mut(&key) {
                    obs.outstanding_requests.insert(request_id);
                }

                self.events
                    .emit(
                        "/core/request/new",
                        serde_json::json!({"request_id": request_id, "amt": amt.name, "observable": key}),
                        Some(tracked.uuid),
                    )
                    .await;
            }
        }

        Ok(new_detections)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::InMemoryResultCache;
    use crate::events::InMemoryEventBus;
    use crate::lock::InMemoryLockManager;
    use crate::model::{AnalysisModuleType, Observable};
    use crate::registry::InMemoryModuleRegistry;
    use crate::trackers::{InMemoryAlertSink, InMemoryAnalysisRequestTracker, InMemoryRootTracker};

    fn processor() -> RequestProcessor {
        RequestProcessor::new(
            Arc::new(InMemoryModuleRegistry::new()),
            Arc::new(WorkQueues::new()),
            Arc::new(InMemoryLockManager::new()),
            Arc::new(InMemoryResultCache::new()),
            Arc::new(InMemoryEventBus::new()),
            Arc::new(InMemoryRootTracker::new()),
            Arc::new(InMemoryAnalysisRequestTracker::new()),
            Arc::new(InMemoryAlertSink::new()),
            ProcessorConfig::default(),
        )
    }

    fn amt(name: &str, version: u32, accepted: &str) -> AnalysisModuleType {
        let mut amt = AnalysisModuleType::new(name, version);
        amt.accepted_observable_types.insert(accepted.to_string());
        amt
    }

    #[tokio::test]
    async fn a_new_root_with_no_modules_completes_immediately() {
        let processor = processor();
        let root = RootAnalysis::new("analysis");
        let uuid = root.uuid;
        processor.process_analysis_request(ProcessInput::RootSubmission(root)).await.unwrap();
        let tracked = processor.roots.get(uuid).await.unwrap();
        assert!(tracked.is_complete());
    }

    #[tokio::test]
    async fn submitting_a_root_with_an_accepting_amt_enqueues_work_and_stays_incomplete() {
        let processor = processor();
        processor.registry.register(amt("amt_whois", 1, "ipv4")).await.unwrap();

        let mut root = RootAnalysis::new("analysis");
        root.add_observable(Observable::new("ipv4", "8.8.8.8"));
        let uuid = root.uuid;
        processor.process_analysis_request(ProcessInput::RootSubmission(root)).await.unwrap();

        let tracked = processor.roots.get(uuid).await.unwrap();
        assert!(!tracked.is_complete());
        assert_eq!(processor.queues.queue_for("amt_whois", 1).size().await, 1);
    }

    /// §8 Scenario 3: a cache hit on re-submission skips the queue entirely.
    #[tokio::test]
    async fn cache_hit_on_resubmission_skips_the_queue() {
        let processor = processor();
        processor.registry.register(amt("amt_whois", 1, "ipv4")).await.unwrap();
        {
            let mut current = processor.registry.get("amt_whois").await.unwrap();
            current.cache_ttl_secs = Some(3600);
            processor.registry.register(current).await.unwrap();
        }

        let mut root = RootAnalysis::new("analysis");
        root.add_observable(Observable::new("ipv4", "8.8.8.8"));
        let uuid = root.uuid;
        processor.process_analysis_request(ProcessInput::RootSubmission(root)).await.unwrap();

        let leased = processor.queues.queue_for("amt_whois", 1).get("worker-1", Duration::from_secs(30)).await.unwrap().unwrap();
        let mut after = leased.root_before.clone();
        let obs_key = leased.observable.clone().unwrap();
        after.observables.get_mut(&obs_key).unwrap().analyses.insert(
            "amt_whois".to_string(),
            crate::model::Analysis::new(),
        );
        let result = AnalysisResult {
            request_id: leased.id,
            root_uuid: uuid,
            observable: Some(obs_key),
            amt_name: "amt_whois".to_string(),
            amt_version: 1,
            root_before: leased.root_before.clone(),
            root: after,
        };
        processor.process_analysis_request(ProcessInput::Result(result)).await.unwrap();
        assert_eq!(processor.queues.queue_for("amt_whois", 1).size().await, 0);

        let mut root2 = RootAnalysis::new("analysis");
        root2.add_observable(Observable::new("ipv4", "8.8.8.8"));
        processor.process_analysis_request(ProcessInput::RootSubmission(root2)).await.unwrap();
        assert_eq!(processor.queues.queue_for("amt_whois", 1).size().await, 0, "cache hit must not enqueue new work");
    }

    /// A dependent AMT is withheld from dispatch until every module it
    /// `depends_on` has a terminal (non-pending) analysis on the observable.
    #[tokio::test]
    async fn a_dependent_amt_is_not_dispatched_until_its_dependency_completes() {
        let processor = processor();
        processor.registry.register(amt("amt_whois", 1, "ipv4")).await.unwrap();
        {
            let mut correlate = amt("amt_correlate", 1, "ipv4");
            correlate.depends_on = vec!["amt_whois".to_string()];
            processor.registry.register(correlate).await.unwrap();
        }

        let mut root = RootAnalysis::new("analysis");
        root.add_observable(Observable::new("ipv4", "8.8.8.8"));
        let uuid = root.uuid;
        processor.process_analysis_request(ProcessInput::RootSubmission(root)).await.unwrap();

        assert_eq!(processor.queues.queue_for("amt_whois", 1).size().await, 1);
        assert_eq!(
            processor.queues.queue_for("amt_correlate", 1).size().await,
            0,
            "amt_correlate must wait for amt_whois to complete"
        );

        let leased =
            processor.queues.queue_for("amt_whois", 1).get("worker-1", Duration::from_secs(30)).await.unwrap().unwrap();
        let obs_key = leased.observable.clone().unwrap();
        let mut after = leased.root_before.clone();
        let mut finished = crate::model::Analysis::new();
        finished.status = crate::model::AnalysisStatus::Success;
        after.observables.get_mut(&obs_key).unwrap().analyses.insert("amt_whois".to_string(), finished);
        let result = AnalysisResult {
            request_id: leased.id,
            root_uuid: uuid,
            observable: Some(obs_key),
            amt_name: "amt_whois".to_string(),
            amt_version: 1,
            root_before: leased.root_before.clone(),
            root: after,
        };
        processor.process_analysis_request(ProcessInput::Result(result)).await.unwrap();

        assert_eq!(
            processor.queues.queue_for("amt_correlate", 1).size().await,
            1,
            "amt_correlate must dispatch once amt_whois has completed"
        );
    }

    /// §8 Scenario 4: a result computed against a replaced AMT version is
    /// silently dropped.
    #[tokio::test]
    async fn a_result_against_a_superseded_amt_version_is_dropped() {
        let processor = processor();
        processor.registry.register(amt("amt_x", 1, "ipv4")).await.unwrap();

        let mut root = RootAnalysis::new("analysis");
        root.add_observable(Observable::new("ipv4", "1.2.3.4"));
        let uuid = root.uuid;
        processor.process_analysis_request(ProcessInput::RootSubmission(root)).await.unwrap();
        let leased = processor.queues.queue_for("amt_x", 1).get("worker-1", Duration::from_secs(30)).await.unwrap().unwrap();

        processor.registry.register(amt("amt_x", 2, "ipv4")).await.unwrap();

        let obs_key = leased.observable.clone().unwrap();
        let mut after = leased.root_before.clone();
        after.observables.get_mut(&obs_key).unwrap().analyses.insert("amt_x".to_string(), crate::model::Analysis::new());
        let result = AnalysisResult {
            request_id: leased.id,
            root_uuid: uuid,
            observable: Some(obs_key),
            amt_name: "amt_x".to_string(),
            amt_version: 1,
            root_before: leased.root_before.clone(),
            root: after,
        };
        processor.process_analysis_request(ProcessInput::Result(result)).await.unwrap();

        let tracked = processor.roots.get(uuid).await.unwrap();
        let key = tracked.observables.keys().next().unwrap();
        assert!(!tracked.observables[key].analyses.contains_key("amt_x"));
    }

    /// §4.3: a version bump binds a fresh queue rather than reusing the old
    /// one — a request queued before the bump sits in the old, now-orphaned
    /// `(name, old_version)` queue and is never handed out by dispatch at the
    /// new version.
    #[tokio::test]
    async fn a_pre_bump_queued_request_is_not_servable_after_a_version_bump() {
        let processor = processor();
        processor.registry.register(amt("amt_x", 1, "ipv4")).await.unwrap();

        let mut root = RootAnalysis::new("analysis");
        root.add_observable(Observable::new("ipv4", "1.2.3.4"));
        processor.process_analysis_request(ProcessInput::RootSubmission(root)).await.unwrap();

        assert_eq!(processor.queues.queue_for("amt_x", 1).size().await, 1);

        processor.registry.register(amt("amt_x", 2, "ipv4")).await.unwrap();

        assert!(
            processor.queues.queue_for("amt_x", 2).get("worker-1", Duration::from_secs(30)).await.unwrap().is_none(),
            "the new version's queue starts empty, it does not inherit the old version's backlog"
        );
        assert_eq!(
            processor.queues.queue_for("amt_x", 1).size().await,
            1,
            "the pre-bump request is still sitting in the old, now-orphaned queue"
        );
        assert!(
            !processor.registry.is_current_version("amt_x", 1).await,
            "version 1 is no longer current, so no caller can reach its queue through the core API"
        );
    }
}
