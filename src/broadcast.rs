//! Broadcast channel - fan-out of sync messages to connected subscribers
//!
//! Wraps a bounded `tokio::sync::broadcast` channel. Receivers dropped by
//! disconnected subscribers are pruned by the channel itself; publishing with
//! nobody listening is not an error.

use crate::protocol::SyncMessage;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::trace;

/// Default number of messages buffered per subscriber before it lags
pub const DEFAULT_BROADCAST_CAPACITY: usize = 256;

/// Receiving side handed to one subscriber
pub type Subscription = broadcast::Receiver<Arc<SyncMessage>>;

/// Sending side, owned by the state actor
#[derive(Debug, Clone)]
pub struct BroadcastChannel {
    tx: broadcast::Sender<Arc<SyncMessage>>,
}

impl BroadcastChannel {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Deliver `message` to every open subscriber
    ///
    /// Returns the number of subscribers the message was queued for.
    pub fn publish(&self, message: SyncMessage) -> usize {
        match self.tx.send(Arc::new(message)) {
            Ok(n) => {
                trace!(subscribers = n, "Message published");
                n
            }
            Err(_) => {
                trace!("Message published with no subscribers");
                0
            }
        }
    }

    /// Register a new receiver; it only sees messages published afterwards
    pub fn subscribe(&self) -> Subscription {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for BroadcastChannel {
    fn default() -> Self {
        Self::new(DEFAULT_BROADCAST_CAPACITY)
    }
}
