//! `Observable` — a typed `(type, value, time?)` datum under analysis (§3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use super::analysis::Analysis;
use super::ids::ObservableKey;
use super::monotonic::MonotonicSet;

#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct Observable {
    #[serde(rename = "type")]
    pub obs_type: String,
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<DateTime<Utc>>,

    #[serde(default)]
    pub tags: MonotonicSet<String>,
    #[serde(default)]
    pub detections: MonotonicSet<String>,
    #[serde(default)]
    pub directives: MonotonicSet<String>,
    /// Keyed by `AnalysisModuleType.name` (§3 invariant 2: at most one
    /// `Analysis` per AMT name).
    #[serde(default)]
    pub analyses: HashMap<String, Analysis>,
    #[serde(default)]
    pub outstanding_requests: std::collections::HashSet<Uuid>,
}

impl Observable {
    pub fn new(obs_type: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            obs_type: obs_type.into(),
            value: value.into(),
            time: None,
            tags: MonotonicSet::new(),
            detections: MonotonicSet::new(),
            directives: MonotonicSet::new(),
            analyses: HashMap::new(),
            outstanding_requests: Default::default(),
        }
    }

    pub fn with_time(mut self, time: DateTime<Utc>) -> Self {
        self.time = Some(time);
        self
    }

    pub fn key(&self) -> ObservableKey {
        ObservableKey { obs_type: self.obs_type.clone(), value: self.value.clone(), time: self.time }
    }

    pub fn has_detections(&self) -> bool {
        !self.detections.is_empty()
    }

    /// Direct merge (§4.1). Scalar identity fields never change (merges are
    /// always keyed by identity, so they're equal already).
    pub fn apply_merge(&mut self, source: &Observable) {
        self.tags.union_from(&source.tags);
        self.detections.union_from(&source.detections);
        self.directives.union_from(&source.directives);
        for (name, analysis) in &source.analyses {
            self.analyses.entry(name.clone()).or_default().apply_merge(analysis);
        }
        for id in &source.outstanding_requests {
            self.outstanding_requests.insert(*id);
        }
    }

    /// Differential merge (§4.1). Returns the number of newly-added
    /// detection points across this observable's direct tags/detections and
    /// every one of its analyses.
    pub fn apply_diff_merge(&mut self, before: &Observable, after: &Observable) -> usize {
        self.tags.apply_diff(&before.tags, &after.tags);
        let mut new_detections = self.detections.apply_diff(&before.detections, &after.detections);
        self.directives.apply_diff(&before.directives, &after.directives);

        for (name, after_analysis) in &after.analyses {
            let before_analysis = before.analyses.get(name);
            let target = self.analyses.entry(name.clone()).or_default();
            match before_analysis {
                Some(before_analysis) => {
                    new_detections += target.apply_diff_merge(before_analysis, after_analysis);
                },
                None => {
                    // Analysis is new relative to `before` — direct-merge it in.
                    target.apply_merge(after_analysis);
                    new_detections += after_analysis.detections.len();
                },
            }
        }

        // Outstanding requests aren't part of the monotonic-set discipline:
        // a diff-merge never removes from `target` (§4.1), but the
        // processor is responsible for explicitly discharging completed
        // request ids (§4.2 step 4) rather than relying on diff semantics.
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
    fn key_ignores_non_identity_fields() {
        let mut a = Observable::new("ipv4", "3.127.0.4");
        a.tags.insert("malicious".into());
        let b = Observable::new("ipv4", "3.127.0.4");
        assert_eq!(a.key(), b.key());
    }

    #[test]
    fn side_effects_from_two_analyses_both_survive_diff_merge() {
        // Scenario 1 from spec §8: amt_b tags the observable, amt_a adds an
        // analysis result with no tag. Applied in either order, the final
        // observable carries both.
        let mut tracked = Observable::new("ipv4", "3.127.0.4");

        let before = tracked.clone();
        let mut after_b = tracked.clone();
        after_b.tags.insert("malicious".into());
        tracked.apply_diff_merge(&before, &after_b);
        assert!(tracked.tags.contains(&"malicious".to_string()));

        let before_a = after_b.clone();
        let mut after_a = after_b.clone();
        after_a.analyses.insert("amt_a".into(), Analysis::new());
        tracked.apply_diff_merge(&before_a, &after_a);

        assert!(tracked.tags.contains(&"malicious".to_string()));
        assert!(tracked.analyses.contains_key("amt_a"));
    }
}
