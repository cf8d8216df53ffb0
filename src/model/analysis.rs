//! `Analysis` — the output of one `(observable, module-type)` pair (§3).

use serde::{Deserialize, Serialize};

use super::ids::{BlobHandle, ObservableKey};
use super::monotonic::MonotonicSet;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStatus {
    Pending,
    Success,
    Failure { reason: String },
}

impl Default for AnalysisStatus {
    fn default() -> Self {
        Self::Pending
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, utoipa::ToSchema)]
pub struct Analysis {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<BlobHandle>,
    /// Identities of observables this analysis contributed; the observables
    /// themselves live on the owning root's observable set (§3, §9).
    pub observables: Vec<ObservableKey>,
    pub tags: MonotonicSet<String>,
    pub detections: MonotonicSet<String>,
    pub directives: MonotonicSet<String>,
    pub status: AnalysisStatus,
}

impl Analysis {
    pub fn new() -> Self {
        Self::default()
    }

    /// Direct merge (§4.1): add anything from `source` not already present.
    /// Scalar fields (`details`, `status`) are left untouched — direct
    /// merge never overwrites scalars on an existing target.
    pub fn apply_merge(&mut self, source: &Analysis) {
        if self.details.is_none() {
            self.details = source.details.clone();
        }
        for key in &source.observables {
            if !self.observables.contains(key) {
                self.observables.push(key.clone());
            }
        }
        self.tags.union_from(&source.tags);
        self.detections.union_from(&source.detections);
        self.directives.union_from(&source.directives);
        if matches!(self.status, AnalysisStatus::Pending) {
            self.status = source.status.clone();
        }
    }

    /// Differential merge (§4.1): apply only the delta between `before`
    /// and `after`. Returns the number of newly-added detection points,
    /// used by the processor to decide whether to (re-)alert (§4.2 step 6).
    pub fn apply_diff_merge(&mut self, before: &Analysis, after: &Analysis) -> usize {
        for key in &after.observables {
            if !before.observables.contains(key) && !self.observables.contains(key) {
                self.observables.push(key.clone());
            }
        }
        self.tags.apply_diff(&before.tags, &after.tags);
        let new_detections = self.detections.apply_diff(&before.detections, &after.detections);
        self.directives.apply_diff(&before.directives, &after.directives);
        if before.details == after.details {
            // unchanged — leave target alone
        } else {
            self.details = after.details.clone();
        }
        if before.status != after.status {
            self.status = after.status.clone();
        }
        new_detections
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_diff_is_a_no_op() {
        let mut a = Analysis::new();
        a.tags.insert("seed".into());
        let snapshot = a.clone();
        let before = a.clone();
        let new_detections = a.apply_diff_merge(&before, &snapshot);
        assert_eq!(new_detections, 0);
        assert_eq!(a.tags.len(), 1);
    }

    #[test]
    fn direct_merge_twice_equals_once() {
        let mut source = Analysis::new();
        source.tags.insert("malicious".into());
        source.observables.push(ObservableKey::new("ipv4", "1.2.3.4"));

        let mut target = Analysis::new();
        target.apply_merge(&source);
        let once = target.clone();
        target.apply_merge(&source);
        assert_eq!(target.tags, once.tags);
        assert_eq!(target.observables, once.observables);
    }
}
