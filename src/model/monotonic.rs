//! A set that only ever grows under merge (§3 invariant 6, §4.1).

use std::collections::HashSet;
use std::hash::Hash;

#[derive(Debug, Clone, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct MonotonicSet<T: Eq + Hash>(HashSet<T>);

impl<T: Eq + Hash + Clone> MonotonicSet<T> {
    pub fn new() -> Self {
        Self(HashSet::new())
    }

    pub fn contains(&self, item: &T) -> bool {
        self.0.contains(item)
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Adds `item`, returning whether it was new. Never removes.
    pub fn insert(&mut self, item: T) -> bool {
        self.0.insert(item)
    }

    /// Adds every element of `other` not already present. Returns the
    /// number of genuinely new elements (used to detect "new detection
    /// points were added" in §4.2 step 6).
    pub fn union_from(&mut self, other: &Self) -> usize {
        let mut added = 0;
        for item in other.0.iter() {
            if self.0.insert(item.clone()) {
                added += 1;
            }
        }
        added
    }

    /// `after \ before`, applied onto `self` — the differential-merge rule
    /// for monotonic sets in §4.1. Returns the number of new elements.
    pub fn apply_diff(&mut self, before: &Self, after: &Self) -> usize {
        let mut added = 0;
        for item in after.0.iter() {
            if !before.0.contains(item) && self.0.insert(item.clone()) {
                added += 1;
            }
        }
        added
    }
}

impl<T: Eq + Hash + Clone> MonotonicSet<T> {
    /// A plain-`HashSet` snapshot, for callers (e.g. `AnalysisModuleType::prerequisites_met`)
    /// that don't need the monotonic-growth guarantee.
    pub fn as_set(&self) -> HashSet<T> {
        self.0.clone()
    }
}

impl<T: Eq + Hash> FromIterator<T> for MonotonicSet<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<T: Eq + Hash> IntoIterator for MonotonicSet<T> {
    type Item = T;
    type IntoIter = std::collections::hash_set::IntoIter<T>;
    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn union_from_is_additive_only() {
        let mut target: MonotonicSet<&str> = ["a", "b"].into_iter().collect();
        let source: MonotonicSet<&str> = ["b", "c"].into_iter().collect();
        let added = target.union_from(&source);
        assert_eq!(added, 1);
        assert_eq!(target.len(), 3);
    }

    #[test]
    fn apply_diff_is_noop_for_equal_before_after() {
        let mut target: MonotonicSet<&str> = ["a"].into_iter().collect();
        let snapshot: MonotonicSet<&str> = ["x", "y"].into_iter().collect();
        let added = target.apply_diff(&snapshot, &snapshot);
        assert_eq!(added, 0);
        assert_eq!(target.len(), 1);
    }

    #[test]
    fn apply_diff_only_applies_the_delta() {
        let mut target: MonotonicSet<&str> = ["a"].into_iter().collect();
        let before: MonotonicSet<&str> = ["x"].into_iter().collect();
        let after: MonotonicSet<&str> = ["x", "y"].into_iter().collect();
        let added = target.apply_diff(&before, &after);
        assert_eq!(added, 1);
        assert!(target.contains(&"y"));
        assert!(!target.contains(&"x"));
    }
}
