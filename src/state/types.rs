//! State type definitions
//!
//! Defines the committed state map, the staged candidate record and the
//! per-key phase used by the stability tracker.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Committed key/value state (also the shape of decoded observations)
pub type StateMap = HashMap<String, String>;

/// A staged, not-yet-authoritative observed value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    /// Observed value awaiting confirmation
    pub value: String,
    /// Consecutive observations of `value` (always >= 1)
    pub count: u32,
}

impl Candidate {
    /// Start a fresh candidacy for `value`
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            count: 1,
        }
    }
}

/// Result of feeding one observation for one key into the tracker
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observation {
    /// Observed value equals the committed one and nothing was staged
    Unchanged,
    /// Observed value equals the committed one; a staged candidate was dropped
    Reverted,
    /// Candidate created or advanced, threshold not reached yet
    Pending { count: u32 },
    /// Threshold reached; the value is now committed
    Commit,
}

impl Observation {
    pub fn is_commit(&self) -> bool {
        matches!(self, Observation::Commit)
    }
}

/// Explicit per-key debounce phase
///
/// `Absent -> Pending -> Committed`, with `Committed` optionally carrying a
/// newer value staged against the existing commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyPhase {
    /// Never committed and nothing staged
    Absent,
    /// Never committed, a candidate is being confirmed
    Pending(Candidate),
    /// Committed value, optionally with a staged replacement
    Committed {
        value: String,
        pending: Option<Candidate>,
    },
}

/// Where a commit came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    /// Debounced commit from a poll cycle
    Poll,
    /// Administrative override (bypasses the stability gate)
    Override,
}

impl std::fmt::Display for Origin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Origin::Poll => write!(f, "poll"),
            Origin::Override => write!(f, "override"),
        }
    }
}
