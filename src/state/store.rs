//! StateStore - the authoritative committed key/value mapping
//!
//! Keys are never removed once committed. There is no delete operation;
//! a key that stops being reported upstream keeps its last committed value.

use super::types::StateMap;

/// Authoritative committed state
#[derive(Debug, Default, Clone)]
pub struct StateStore {
    entries: StateMap,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current committed value for `key`, if any
    pub fn read(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Owned copy of the full mapping
    pub fn snapshot(&self) -> StateMap {
        self.entries.clone()
    }

    /// Commit `value` for `key`
    ///
    /// Returns `false` (and leaves the store untouched) when the key already
    /// holds exactly this value.
    pub fn commit(&mut self, key: &str, value: &str) -> bool {
        if self.read(key) == Some(value) {
            return false;
        }
        self.entries.insert(key.to_string(), value.to_string());
        true
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commit_reports_change() {
        let mut store = StateStore::new();
        assert!(store.commit("a", "x"));
        assert!(!store.commit("a", "x"));
        assert!(store.commit("a", "y"));
        assert_eq!(store.read("a"), Some("y"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_empty_string_is_a_real_value() {
        let mut store = StateStore::new();
        assert_eq!(store.read("a"), None);
        assert!(store.commit("a", ""));
        assert_eq!(store.read("a"), Some(""));
        assert!(!store.commit("a", ""));
    }

    #[test]
    fn test_snapshot_is_detached() {
        let mut store = StateStore::new();
        store.commit("a", "x");

        let mut snapshot = store.snapshot();
        snapshot.insert("a".to_string(), "tampered".to_string());
        snapshot.insert("b".to_string(), "new".to_string());

        assert_eq!(store.read("a"), Some("x"));
        assert_eq!(store.read("b"), None);
    }
}
