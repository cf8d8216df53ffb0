//! `RootAnalysis` — the tree root (§3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use super::ids::{BlobHandle, ObservableKey};
use super::monotonic::MonotonicSet;
use super::observable::Observable;

#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct RootAnalysis {
    pub uuid: Uuid,
    #[serde(default)]
    pub description: String,
    pub analysis_mode: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_instance: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<BlobHandle>,

    /// Order-insensitive, keyed by identity (§3 invariant 1).
    #[serde(default, with = "observable_map")]
    pub observables: HashMap<ObservableKey, Observable>,

    #[serde(default)]
    pub tags: MonotonicSet<String>,
    #[serde(default)]
    pub detections: MonotonicSet<String>,
    #[serde(default)]
    pub directives: MonotonicSet<String>,

    #[serde(default)]
    pub outstanding_requests: HashSet<Uuid>,
}

/// `HashMap<ObservableKey, Observable>` serializes as a plain JSON array of
/// `Observable` — the key is a pure function of the value (§3 invariant 1),
/// so carrying it twice on the wire is redundant.
mod observable_map {
    use super::*;
    use serde::{Deserializer, Serializer, ser::SerializeSeq};

    pub fn serialize<S>(
        map: &HashMap<ObservableKey, Observable>,
        serializer: S,
    ) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut seq = serializer.serialize_seq(Some(map.len()))?;
        for obs in map.values() {
            seq.serialize_element(obs)?;
        }
        seq.end()
    }

    pub fn deserialize<'de, D>(
        deserializer: D,
    ) -> Result<HashMap<ObservableKey, Observable>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let items: Vec<Observable> = Vec::deserialize(deserializer)?;
        Ok(items.into_iter().map(|o| (o.key(), o)).collect())
    }
}

impl RootAnalysis {
    pub fn new(analysis_mode: impl Into<String>) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            description: String::new(),
            analysis_mode: analysis_mode.into(),
            tool: None,
            tool_instance: None,
            event_time: None,
            details: None,
            observables: HashMap::new(),
            tags: MonotonicSet::new(),
            detections: MonotonicSet::new(),
            directives: MonotonicSet::new(),
            outstanding_requests: HashSet::new(),
        }
    }

    pub fn add_observable(&mut self, observable: Observable) -> ObservableKey {
        let key = observable.key();
        self.observables.entry(key.clone()).or_insert(observable);
        key
    }

    pub fn has_detections(&self) -> bool {
        !self.detections.is_empty() || self.observables.values().any(Observable::has_detections)
    }

    /// Total detection-point count across the root's own set and every
    /// observable and analysis beneath it (used by the alert sink's
    /// once-per-new-detection idempotency check — §8 Scenario 6).
    pub fn detection_count(&self) -> usize {
        self.detections.len()
            + self
                .observables
                .values()
                .map(|obs| {
                    obs.detections.len()
                        + obs.analyses.values().map(|a| a.detections.len()).sum::<usize>()
                })
                .sum::<usize>()
    }

    pub fn is_complete(&self) -> bool {
        self.outstanding_requests.is_empty()
    }

    /// Direct merge (§4.1, used for fresh submissions against an existing
    /// tracked root — §4.2 step 3). `analysis_mode` IS overwritten: a fresh
    /// submission establishes a new baseline mode rather than reconciling
    /// against one (§9 open question (a)). Every other scalar, including
    /// `description`, is left untouched once set, matching `Analysis`'s
    /// `details`/`status` treatment.
    pub fn apply_merge(&mut self, source: &RootAnalysis) {
        self.analysis_mode = source.analysis_mode.clone();
        if self.description.is_empty() {
            self.description = source.description.clone();
        }
        if self.tool.is_none() {
            self.tool = source.tool.clone();
        }
        if self.tool_instance.is_none() {
            self.tool_instance = source.tool_instance.clone();
        }
        if self.event_time.is_none() {
            self.event_time = source.event_time;
        }
        if self.details.is_none() {
            self.details = source.details.clone();
        }
        self.tags.union_from(&source.tags);
        self.detections.union_from(&source.detections);
        self.directives.union_from(&source.directives);
        for (key, obs) in &source.observables {
            self.observables.entry(key.clone()).or_insert_with(|| obs.clone()).apply_merge(obs);
        }
        for id in &source.outstanding_requests {
            self.outstanding_requests.insert(*id);
        }
    }

    /// Differential merge (§4.1, used for posted results — §4.2 step 4).
    /// Returns the number of newly-added detection points across the whole
    /// tree, which the processor uses to decide whether to (re-)alert.
    pub fn apply_diff_merge(&mut self, before: &RootAnalysis, after: &RootAnalysis) -> usize {
        if before.analysis_mode != after.analysis_mode {
            self.analysis_mode = after.analysis_mode.clone();
        }
        if before.description != after.description {
            self.description = after.description.clone();
        }
        if before.details != after.details {
            self.details = after.details.clone();
        }

        self.tags.apply_diff(&before.tags, &after.tags);
        let mut new_detections = self.detections.apply_diff(&before.detections, &after.detections);
        self.directives.apply_diff(&before.directives, &after.directives);

        for (key, after_obs) in &after.observables {
            match before.observables.get(key) {
                Some(before_obs) => {
                    let target =
                        self.observables.entry(key.clone()).or_insert_with(|| before_obs.clone());
                    new_detections += target.apply_diff_merge(before_obs, after_obs);
                },
                None => {
                    // New relative to `before` — direct-merge the whole
                    // observable in (§4.1 "Observable children").
                    let target = self.observables.entry(key.clone()).or_insert_with(|| {
                        Observable::new(after_obs.obs_type.clone(), after_obs.value.clone())
                    });
                    target.apply_merge(after_obs);
                    new_detections += after_obs.detections.len()
                        + after_obs.analyses.values().map(|a| a.detections.len()).sum::<usize>();
                },
            }
        }
        // Observables present in `before` but absent from `after` are left
        // alone — removal is never propagated through a diff (§4.1).

        for id in &after.outstanding_requests {
            if !before.outstanding_requests.contains(id) {
                self.outstanding_requests.insert(*id);
            }
        }

        new_detections
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_change_survives_concurrent_unrelated_diff() {
        // Scenario 2 from spec §8.
        let mut tracked = RootAnalysis::new("analysis");
        let before = tracked.clone();

        let mut after_a = tracked.clone();
        after_a.analysis_mode = "correlation".to_string();
        tracked.apply_diff_merge(&before, &after_a);
        assert_eq!(tracked.analysis_mode, "correlation");

        let before_b = after_a.clone();
        let after_b = after_a.clone(); // amt_b: mode unchanged in its own before/after
        tracked.apply_diff_merge(&before_b, &after_b);
        assert_eq!(tracked.analysis_mode, "correlation");
    }

    #[test]
    fn empty_diff_merge_is_idempotent() {
        let mut root = RootAnalysis::new("analysis");
        root.add_observable(Observable::new("ipv4", "8.8.8.8"));
        let snapshot = root.clone();
        let new_detections = root.apply_diff_merge(&snapshot, &snapshot);
        assert_eq!(new_detections, 0);
        assert_eq!(root.observables.len(), 1);
    }

    #[test]
    fn direct_merge_twice_equals_once() {
        let mut source = RootAnalysis::new("analysis");
        source.add_observable(Observable::new("ipv4", "8.8.8.8"));
        source.tags.insert("seen".into());

        let mut target = RootAnalysis::new("analysis");
        target.apply_merge(&source);
        let once_len = target.observables.len();
        let once_tags = target.tags.len();
        target.apply_merge(&source);
        assert_eq!(target.observables.len(), once_len);
        assert_eq!(target.tags.len(), once_tags);
    }

    #[test]
    fn removal_is_never_propagated_through_diff() {
        let mut before = RootAnalysis::new("analysis");
        before.add_observable(Observable::new("ipv4", "1.1.1.1"));
        let after = RootAnalysis::new("analysis"); // observable removed

        let mut target = before.clone();
        target.apply_diff_merge(&before, &after);
        assert_eq!(target.observables.len(), 1, "diff-merge must not delete");
    }
}
