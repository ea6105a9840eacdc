//! StateActor - sole owner of committed state, candidates and the broadcast sender
//!
//! Commands are processed one at a time, so:
//! - a poll cycle's commits and its patch are applied as one step
//! - a new subscriber's snapshot and receiver are taken as one step, which
//!   means the first patch it receives is exactly the next change after its
//!   snapshot
//! - HTTP reads never observe a half-applied cycle

use super::actor_handle::StateActorHandle;
use super::commands::{ReconcileReport, StateCommand, StateStats};
use super::stability::StabilityTracker;
use super::store::StateStore;
use super::types::{Origin, StateMap};
use crate::broadcast::BroadcastChannel;
use crate::protocol::SyncMessage;
use tokio::sync::mpsc;
use tracing::{debug, info, trace};

/// Actor owning the stability-gated state
///
/// ```text
/// poller ──Reconcile──┐
/// api ────Override────┤      ┌──────────────────────────────┐
/// api ────Get*────────┼────► │ StabilityTracker → StateStore │ ──publish──► subscribers
/// ws ─────Subscribe───┘      └──────────────────────────────┘
/// ```
pub struct StateActor {
    store: StateStore,
    tracker: StabilityTracker,
    channel: BroadcastChannel,
    command_rx: mpsc::UnboundedReceiver<StateCommand>,
    /// Total commits applied (poll + override)
    commit_count: u64,
}

impl StateActor {
    /// Spawn the actor on the current runtime and return its handle
    ///
    /// # Arguments
    ///
    /// * `stable_reads` - consecutive identical reads required to commit
    /// * `broadcast_capacity` - messages buffered per subscriber before it lags
    pub fn spawn(stable_reads: u32, broadcast_capacity: usize) -> StateActorHandle {
        let (cmd_tx, command_rx) = mpsc::unbounded_channel();

        let actor = StateActor {
            store: StateStore::new(),
            tracker: StabilityTracker::new(stable_reads),
            channel: BroadcastChannel::new(broadcast_capacity),
            command_rx,
            commit_count: 0,
        };

        info!(
            stable_reads = actor.tracker.threshold(),
            broadcast_capacity, "StateActor spawned"
        );

        tokio::spawn(actor.run());

        StateActorHandle::new(cmd_tx)
    }

    async fn run(mut self) {
        debug!("StateActor run loop started");

        while let Some(cmd) = self.command_rx.recv().await {
            trace!(?cmd, "Processing command");

            match cmd {
                StateCommand::Reconcile { observed, response } => {
                    let report = self.handle_reconcile(&observed);
                    let _ = response.send(report);
                }
                StateCommand::Override {
                    key,
                    value,
                    response,
                } => {
                    let changed = self.handle_override(&key, &value);
                    let _ = response.send(changed);
                }
                StateCommand::GetValue { key, response } => {
                    let _ = response.send(self.store.read(&key).map(str::to_string));
                }
                StateCommand::GetSnapshot { response } => {
                    let _ = response.send(self.store.snapshot());
                }
                StateCommand::GetPhase { key, response } => {
                    let _ = response.send(self.tracker.phase(&self.store, &key));
                }
                StateCommand::Subscribe { response } => {
                    let rx = self.channel.subscribe();
                    let snapshot = SyncMessage::snapshot(self.store.snapshot());
                    if response.send((snapshot, rx)).is_ok() {
                        debug!(
                            subscribers = self.channel.subscriber_count(),
                            "Subscriber registered"
                        );
                    }
                }
                StateCommand::GetStats { response } => {
                    let _ = response.send(StateStats {
                        keys: self.store.len(),
                        pending: self.tracker.pending_count(),
                        subscribers: self.channel.subscriber_count(),
                    });
                }
                StateCommand::Shutdown => {
                    info!("StateActor received shutdown command");
                    break;
                }
            }
        }

        info!(
            commit_count = self.commit_count,
            keys = self.store.len(),
            "StateActor run loop terminated"
        );
    }

    fn handle_reconcile(&mut self, observed: &StateMap) -> ReconcileReport {
        let committed = self.tracker.reconcile(&mut self.store, observed);
        let pending = self.tracker.pending_count();

        if committed.is_empty() {
            return ReconcileReport {
                committed,
                pending,
                recipients: 0,
            };
        }

        self.commit_count += committed.len() as u64;
        for (key, value) in &committed {
            debug!(key = %key, value = %value, origin = %Origin::Poll, "Committed");
        }

        let recipients = self.channel.publish(SyncMessage::patch(committed.clone()));
        ReconcileReport {
            committed,
            pending,
            recipients,
        }
    }

    /// Direct commit path. The stability gate is skipped on purpose; any
    /// candidate staged for the key is dropped so it cannot equal the new
    /// committed value.
    fn handle_override(&mut self, key: &str, value: &str) -> bool {
        self.tracker.clear(key);

        if !self.store.commit(key, value) {
            debug!(key, "Override matches committed value");
            return false;
        }

        self.commit_count += 1;
        info!(key, value, origin = %Origin::Override, "Committed");

        let mut changes = StateMap::new();
        changes.insert(key.to_string(), value.to_string());
        self.channel.publish(SyncMessage::patch(changes));
        true
    }
}
