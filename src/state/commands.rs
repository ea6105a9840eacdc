//! Command enum for the StateActor
//!
//! Every read and every mutation of committed state goes through one of
//! these messages, so the actor applies them strictly one at a time.

use super::types::{KeyPhase, StateMap};
use crate::broadcast::Subscription;
use crate::protocol::SyncMessage;
use tokio::sync::oneshot;

/// Outcome of reconciling one decoded poll cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Keys committed by this cycle with their new values
    pub committed: StateMap,
    /// Keys still awaiting confirmation after this cycle
    pub pending: usize,
    /// Subscribers the resulting patch was queued for (0 when nothing changed)
    pub recipients: usize,
}

/// Counters for the health endpoint
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StateStats {
    pub keys: usize,
    pub pending: usize,
    pub subscribers: usize,
}

/// Commands for the StateActor
pub enum StateCommand {
    /// Run a decoded cycle through the stability gate and publish the patch
    Reconcile {
        observed: StateMap,
        response: oneshot::Sender<ReconcileReport>,
    },

    /// Commit a value directly, bypassing the stability gate
    ///
    /// Responds with whether the committed value actually changed.
    Override {
        key: String,
        value: String,
        response: oneshot::Sender<bool>,
    },

    /// Read one committed value
    GetValue {
        key: String,
        response: oneshot::Sender<Option<String>>,
    },

    /// Read the whole committed mapping
    GetSnapshot {
        response: oneshot::Sender<StateMap>,
    },

    /// Debounce phase of one key
    GetPhase {
        key: String,
        response: oneshot::Sender<KeyPhase>,
    },

    /// Snapshot plus a receiver registered in the same step
    Subscribe {
        response: oneshot::Sender<(SyncMessage, Subscription)>,
    },

    /// Key/candidate/subscriber counts
    GetStats {
        response: oneshot::Sender<StateStats>,
    },

    /// Stop the actor loop
    Shutdown,
}

impl std::fmt::Debug for StateCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StateCommand::Reconcile { observed, .. } => f
                .debug_struct("Reconcile")
                .field("keys", &observed.len())
                .finish(),
            StateCommand::Override { key, value, .. } => f
                .debug_struct("Override")
                .field("key", key)
                .field("value", value)
                .finish(),
            StateCommand::GetValue { key, .. } => {
                f.debug_struct("GetValue").field("key", key).finish()
            }
            StateCommand::GetSnapshot { .. } => write!(f, "GetSnapshot"),
            StateCommand::GetPhase { key, .. } => {
                f.debug_struct("GetPhase").field("key", key).finish()
            }
            StateCommand::Subscribe { .. } => write!(f, "Subscribe"),
            StateCommand::GetStats { .. } => write!(f, "GetStats"),
            StateCommand::Shutdown => write!(f, "Shutdown"),
        }
    }
}
