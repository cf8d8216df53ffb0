//! `AnalysisModuleType` (AMT) — a declarative module description (§3, §4.3).

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct AnalysisModuleType {
    pub name: String,
    pub version: u32,
    pub accepted_observable_types: HashSet<String>,
    #[serde(default)]
    pub required_directives: HashSet<String>,
    #[serde(default)]
    pub required_tags: HashSet<String>,
    /// `None` = no cache, per §3.
    #[serde(default)]
    pub cache_ttl_secs: Option<u64>,
    /// Additional cache-key components the module supplies at request
    /// time, appended after `(type, value, time?, name, version)` (§3
    /// invariant 5).
    #[serde(default)]
    pub extended_cache_keys: Vec<String>,
    pub timeout_secs: u64,
    /// Suppresses auto-dispatch (§3, §9 open question (c)).
    #[serde(default)]
    pub manual: bool,
    /// Names of other AMTs this one depends on.
    #[serde(default)]
    pub depends_on: Vec<String>,
}

impl AnalysisModuleType {
    pub fn new(name: impl Into<String>, version: u32) -> Self {
        Self {
            name: name.into(),
            version,
            accepted_observable_types: HashSet::new(),
            required_directives: HashSet::new(),
            required_tags: HashSet::new(),
            cache_ttl_secs: None,
            extended_cache_keys: Vec::new(),
            timeout_secs: 60,
            manual: false,
            depends_on: Vec::new(),
        }
    }

    pub fn accepts(&self, observable_type: &str) -> bool {
        self.accepted_observable_types.contains(observable_type)
    }

    /// Whether the observable satisfies this AMT's prerequisite
    /// directives/tags for auto-dispatch (§4.2 step 5).
    pub fn prerequisites_met(&self, tags: &HashSet<String>, directives: &HashSet<String>) -> bool {
        self.required_tags.iter().all(|t| tags.contains(t))
            && self.required_directives.iter().all(|d| directives.contains(d))
    }

    /// Whether every module this AMT `depends_on` has already completed
    /// against the observable (§3 "module dependencies"). `completed` is
    /// the set of AMT names with a terminal (non-pending) `Analysis`
    /// already present on the observable.
    pub fn dependencies_met(&self, completed: &HashSet<String>) -> bool {
        self.depends_on.iter().all(|name| completed.contains(name))
    }

    pub fn cacheable(&self) -> bool {
        self.cache_ttl_secs.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn an_amt_with_no_dependencies_is_always_dispatchable() {
        let amt = AnalysisModuleType::new("amt_correlate", 1);
        assert!(amt.dependencies_met(&HashSet::new()));
    }

    #[test]
    fn a_dependent_amt_waits_until_every_dependency_has_completed() {
        let mut amt = AnalysisModuleType::new("amt_correlate", 1);
        amt.depends_on = vec!["amt_whois".to_string(), "amt_geoip".to_string()];

        let mut completed = HashSet::new();
        assert!(!amt.dependencies_met(&completed));

        completed.insert("amt_whois".to_string());
        assert!(!amt.dependencies_met(&completed), "only one of two dependencies completed");

        completed.insert("amt_geoip".to_string());
        assert!(amt.dependencies_met(&completed));
    }
}
