//! StateActorHandle - Public API for the StateActor
//!
//! Wraps message passing with async methods. Every query is a command plus a
//! oneshot reply; `StateError::Unavailable` is returned once the actor has
//! stopped.

use tokio::sync::{mpsc, oneshot};

use super::commands::{ReconcileReport, StateCommand, StateStats};
use super::types::{KeyPhase, StateMap};
use crate::broadcast::Subscription;
use crate::error::StateError;
use crate::protocol::SyncMessage;

/// Handle for interacting with the StateActor
///
/// Cheap to clone; shared by the poller, the HTTP handlers and every
/// WebSocket subscriber.
#[derive(Clone)]
pub struct StateActorHandle {
    cmd_tx: mpsc::UnboundedSender<StateCommand>,
}

impl StateActorHandle {
    pub fn new(cmd_tx: mpsc::UnboundedSender<StateCommand>) -> Self {
        Self { cmd_tx }
    }

    /// Spawn a new StateActor and return a handle
    pub fn spawn(stable_reads: u32, broadcast_capacity: usize) -> Self {
        super::actor::StateActor::spawn(stable_reads, broadcast_capacity)
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> StateCommand,
    ) -> Result<T, StateError> {
        let (response_tx, response_rx) = oneshot::channel();
        self.cmd_tx
            .send(make(response_tx))
            .map_err(|_| StateError::Unavailable)?;
        response_rx.await.map_err(|_| StateError::Unavailable)
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Feed one decoded cycle through the stability gate
    ///
    /// Commits and the resulting patch happen inside the actor as one step.
    pub async fn reconcile(&self, observed: StateMap) -> Result<ReconcileReport, StateError> {
        self.request(|response| StateCommand::Reconcile { observed, response })
            .await
    }

    /// Administrative fast path: commit `value` without debouncing
    ///
    /// Returns whether the committed value changed. A change is published as
    /// a one-key patch like any other commit.
    pub async fn override_value(
        &self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<bool, StateError> {
        let (key, value) = (key.into(), value.into());
        self.request(|response| StateCommand::Override {
            key,
            value,
            response,
        })
        .await
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub async fn get(&self, key: impl Into<String>) -> Result<Option<String>, StateError> {
        let key = key.into();
        self.request(|response| StateCommand::GetValue { key, response })
            .await
    }

    pub async fn snapshot(&self) -> Result<StateMap, StateError> {
        self.request(|response| StateCommand::GetSnapshot { response })
            .await
    }

    pub async fn phase(&self, key: impl Into<String>) -> Result<KeyPhase, StateError> {
        let key = key.into();
        self.request(|response| StateCommand::GetPhase { key, response })
            .await
    }

    pub async fn stats(&self) -> Result<StateStats, StateError> {
        self.request(|response| StateCommand::GetStats { response })
            .await
    }

    /// Register a subscriber
    ///
    /// Returns the `snapshot` message to send first and the receiver for the
    /// patches that follow it.
    pub async fn subscribe(&self) -> Result<(SyncMessage, Subscription), StateError> {
        self.request(|response| StateCommand::Subscribe { response })
            .await
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Returns false once the actor has stopped
    pub fn is_alive(&self) -> bool {
        !self.cmd_tx.is_closed()
    }

    /// Fire-and-forget shutdown request
    pub fn shutdown(&self) {
        let _ = self.cmd_tx.send(StateCommand::Shutdown);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_is_clone() {
        fn assert_clone<T: Clone>() {}
        assert_clone::<StateActorHandle>();
    }

    #[tokio::test]
    async fn test_is_alive_when_channel_open() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let handle = StateActorHandle::new(tx);
        assert!(handle.is_alive());
    }

    #[tokio::test]
    async fn test_requests_fail_when_channel_closed() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let handle = StateActorHandle::new(tx);
        assert!(!handle.is_alive());
        assert!(matches!(
            handle.get("a").await,
            Err(StateError::Unavailable)
        ));
    }
}
