//! Stability tracker - per-key debounce gate in front of the StateStore
//!
//! A value only becomes authoritative after it has been observed `threshold`
//! times in a row, unchanged, while differing from the committed value.
//!
//! Per key and per observation:
//!
//! 1. Observed value equals the committed value: drop any candidate, stop.
//!    An absent key never equals anything, including `""`.
//! 2. No candidate, or candidate holds another value: stage `{observed, 1}`.
//!    Candidate holds the same value: increment its count.
//! 3. Count reached the threshold: commit to the store and drop the candidate.

use super::store::StateStore;
use super::types::{Candidate, KeyPhase, Observation, StateMap};
use std::collections::HashMap;
use tracing::trace;

/// Default number of consecutive identical reads required to commit
pub const DEFAULT_STABLE_READS: u32 = 2;

/// Per-key candidate bookkeeping
#[derive(Debug, Clone)]
pub struct StabilityTracker {
    threshold: u32,
    candidates: HashMap<String, Candidate>,
}

impl StabilityTracker {
    /// Create a tracker; a threshold of 0 behaves like 1
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold: threshold.max(1),
            candidates: HashMap::new(),
        }
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    /// Feed one observation for one key
    ///
    /// On `Observation::Commit` the store has already been updated and the
    /// candidate removed, so both change together.
    pub fn observe(&mut self, store: &mut StateStore, key: &str, observed: &str) -> Observation {
        if store.read(key) == Some(observed) {
            return match self.candidates.remove(key) {
                Some(dropped) => {
                    trace!(key, dropped = %dropped.value, count = dropped.count, "Candidate reverted");
                    Observation::Reverted
                }
                None => Observation::Unchanged,
            };
        }

        let count = match self.candidates.get_mut(key) {
            Some(candidate) if candidate.value == observed => {
                candidate.count += 1;
                candidate.count
            }
            _ => {
                self.candidates
                    .insert(key.to_string(), Candidate::new(observed));
                1
            }
        };

        if count >= self.threshold {
            self.candidates.remove(key);
            store.commit(key, observed);
            trace!(key, value = observed, "Candidate committed");
            Observation::Commit
        } else {
            trace!(key, value = observed, count, "Candidate pending");
            Observation::Pending { count }
        }
    }

    /// Run every key of one decoded cycle through the gate
    ///
    /// Keys missing from `observed` are left alone. Returns exactly the keys
    /// committed by this call, with their new values.
    pub fn reconcile(&mut self, store: &mut StateStore, observed: &StateMap) -> StateMap {
        let mut changes = StateMap::new();
        for (key, value) in observed {
            if self.observe(store, key, value).is_commit() {
                changes.insert(key.clone(), value.clone());
            }
        }
        changes
    }

    /// Staged candidate for `key`, if any
    pub fn candidate(&self, key: &str) -> Option<&Candidate> {
        self.candidates.get(key)
    }

    /// Number of keys currently awaiting confirmation
    pub fn pending_count(&self) -> usize {
        self.candidates.len()
    }

    /// Drop the candidate for `key` (used when a key is set directly)
    pub fn clear(&mut self, key: &str) -> Option<Candidate> {
        self.candidates.remove(key)
    }

    /// Current debounce phase of `key`
    pub fn phase(&self, store: &StateStore, key: &str) -> KeyPhase {
        let pending = self.candidates.get(key).cloned();
        match (store.read(key), pending) {
            (Some(value), pending) => KeyPhase::Committed {
                value: value.to_string(),
                pending,
            },
            (None, Some(candidate)) => KeyPhase::Pending(candidate),
            (None, None) => KeyPhase::Absent,
        }
    }
}

impl Default for StabilityTracker {
    fn default() -> Self {
        Self::new(DEFAULT_STABLE_READS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn observed(pairs: &[(&str, &str)]) -> StateMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_commit_after_two_consecutive_reads() {
        let mut store = StateStore::new();
        let mut tracker = StabilityTracker::new(2);

        let changes = tracker.reconcile(&mut store, &observed(&[("a", "x")]));
        assert!(changes.is_empty());
        assert_eq!(tracker.candidate("a"), Some(&Candidate::new("x")));
        assert_eq!(store.read("a"), None);

        let changes = tracker.reconcile(&mut store, &observed(&[("a", "x")]));
        assert_eq!(changes, observed(&[("a", "x")]));
        assert_eq!(store.read("a"), Some("x"));
        assert!(tracker.candidate("a").is_none());
    }

    #[test]
    fn test_different_value_resets_count() {
        let mut store = StateStore::new();
        let mut tracker = StabilityTracker::new(2);

        tracker.reconcile(&mut store, &observed(&[("a", "x")]));
        let changes = tracker.reconcile(&mut store, &observed(&[("a", "y")]));

        assert!(changes.is_empty());
        assert_eq!(tracker.candidate("a"), Some(&Candidate::new("y")));
        assert_eq!(store.read("a"), None);
    }

    #[test]
    fn test_oscillation_never_commits() {
        let mut store = StateStore::new();
        let mut tracker = StabilityTracker::new(3);

        for i in 0..20 {
            let value = if i % 2 == 0 { "x" } else { "y" };
            let outcome = tracker.observe(&mut store, "a", value);
            assert_eq!(outcome, Observation::Pending { count: 1 });
        }
        assert!(store.is_empty());
    }

    #[test]
    fn test_reversion_clears_candidate_without_commit() {
        let mut store = StateStore::new();
        store.commit("a", "x");
        let mut tracker = StabilityTracker::new(3);

        assert_eq!(
            tracker.observe(&mut store, "a", "y"),
            Observation::Pending { count: 1 }
        );
        assert_eq!(
            tracker.observe(&mut store, "a", "y"),
            Observation::Pending { count: 2 }
        );
        assert_eq!(tracker.observe(&mut store, "a", "x"), Observation::Reverted);
        assert!(tracker.candidate("a").is_none());
        assert_eq!(store.read("a"), Some("x"));

        // Candidacy restarts from scratch
        assert_eq!(
            tracker.observe(&mut store, "a", "y"),
            Observation::Pending { count: 1 }
        );
    }

    #[test]
    fn test_committed_value_is_idempotent() {
        let mut store = StateStore::new();
        store.commit("a", "x");
        let mut tracker = StabilityTracker::new(2);

        for _ in 0..10 {
            let changes = tracker.reconcile(&mut store, &observed(&[("a", "x")]));
            assert!(changes.is_empty());
        }
        assert_eq!(tracker.pending_count(), 0);
    }

    #[test]
    fn test_absent_key_is_not_empty_string() {
        let mut store = StateStore::new();
        let mut tracker = StabilityTracker::new(2);

        assert_eq!(
            tracker.observe(&mut store, "a", ""),
            Observation::Pending { count: 1 }
        );
        assert_eq!(tracker.observe(&mut store, "a", ""), Observation::Commit);
        assert_eq!(store.read("a"), Some(""));
        assert_eq!(tracker.observe(&mut store, "a", ""), Observation::Unchanged);
    }

    #[test]
    fn test_missing_key_is_retained() {
        let mut store = StateStore::new();
        store.commit("a", "x");
        let mut tracker = StabilityTracker::new(1);

        let changes = tracker.reconcile(&mut store, &observed(&[("b", "y")]));
        assert_eq!(changes, observed(&[("b", "y")]));
        assert_eq!(store.read("a"), Some("x"));
    }

    #[test]
    fn test_threshold_one_commits_immediately() {
        let mut store = StateStore::new();
        let mut tracker = StabilityTracker::new(1);
        assert_eq!(tracker.observe(&mut store, "a", "x"), Observation::Commit);
        assert_eq!(tracker.observe(&mut store, "a", "y"), Observation::Commit);
        assert_eq!(store.read("a"), Some("y"));
    }

    #[test]
    fn test_zero_threshold_is_clamped() {
        assert_eq!(StabilityTracker::new(0).threshold(), 1);
    }

    #[test]
    fn test_only_changed_keys_reported() {
        let mut store = StateStore::new();
        let mut tracker = StabilityTracker::new(2);

        tracker.reconcile(&mut store, &observed(&[("a", "1"), ("b", "1")]));
        let changes = tracker.reconcile(&mut store, &observed(&[("a", "1"), ("b", "2")]));

        assert_eq!(changes, observed(&[("a", "1")]));
        assert_eq!(tracker.candidate("b"), Some(&Candidate::new("2")));
    }

    #[test]
    fn test_phase_transitions() {
        let mut store = StateStore::new();
        let mut tracker = StabilityTracker::new(2);

        assert_eq!(tracker.phase(&store, "a"), KeyPhase::Absent);

        tracker.observe(&mut store, "a", "x");
        assert_eq!(
            tracker.phase(&store, "a"),
            KeyPhase::Pending(Candidate::new("x"))
        );

        tracker.observe(&mut store, "a", "x");
        assert_eq!(
            tracker.phase(&store, "a"),
            KeyPhase::Committed {
                value: "x".to_string(),
                pending: None
            }
        );

        tracker.observe(&mut store, "a", "y");
        assert_eq!(
            tracker.phase(&store, "a"),
            KeyPhase::Committed {
                value: "x".to_string(),
                pending: Some(Candidate::new("y"))
            }
        );
    }

    proptest! {
        #[test]
        fn prop_commit_requires_consecutive_run(
            threshold in 1u32..5,
            reads in proptest::collection::vec(prop_oneof!["a", "b", "c"], 0..60),
        ) {
            let mut store = StateStore::new();
            let mut tracker = StabilityTracker::new(threshold);
            let t = threshold as usize;

            for (i, value) in reads.iter().enumerate() {
                let before = store.read("k").map(str::to_string);
                let outcome = tracker.observe(&mut store, "k", value);

                if outcome.is_commit() {
                    prop_assert!(i + 1 >= t);
                    prop_assert!(reads[i + 1 - t..=i].iter().all(|v| v == value));
                    prop_assert_ne!(before.as_deref(), Some(value.as_str()));
                } else {
                    prop_assert_eq!(store.read("k").map(str::to_string), before);
                }

                if let Some(candidate) = tracker.candidate("k") {
                    prop_assert_ne!(store.read("k"), Some(candidate.value.as_str()));
                    prop_assert!(candidate.count >= 1 && candidate.count < threshold);
                }

                if i + 1 >= t && reads[i + 1 - t..=i].iter().all(|v| v == value) {
                    prop_assert_eq!(store.read("k"), Some(value.as_str()));
                }
            }
        }
    }
}
