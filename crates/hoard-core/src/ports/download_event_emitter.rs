//! Download event emitter port.
//!
//! Lets the download manager emit events without coupling to how they are
//! delivered (channels, UI bindings, logs).

use tokio::sync::broadcast;

use crate::download::DownloadEvent;

/// Port for emitting download events.
///
/// Events for one job are emitted in the order its state changed, so
/// implementations must not reorder them.
pub trait DownloadEventEmitterPort: Send + Sync {
    /// Emit a download event. Must not block.
    fn emit(&self, event: DownloadEvent);

    /// Clone this emitter into a boxed trait object.
    fn clone_box(&self) -> Box<dyn DownloadEventEmitterPort>;
}

/// Default channel capacity for [`BroadcastDownloadEmitter`].
const CHANNEL_CAPACITY: usize = 1024;

/// Fans download events out to any number of subscribers.
///
/// A subscriber that falls more than the channel capacity behind sees
/// `RecvError::Lagged` and skips the oldest events.
#[derive(Debug, Clone)]
pub struct BroadcastDownloadEmitter {
    sender: broadcast::Sender<DownloadEvent>,
}

impl BroadcastDownloadEmitter {
    /// Create an emitter with the default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(CHANNEL_CAPACITY)
    }

    /// Create an emitter with a custom channel capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Subscribe to events emitted from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<DownloadEvent> {
        self.sender.subscribe()
    }

    /// Number of live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for BroadcastDownloadEmitter {
    fn default() -> Self {
        Self::new()
    }
}

impl DownloadEventEmitterPort for BroadcastDownloadEmitter {
    fn emit(&self, event: DownloadEvent) {
        // No receivers is not an error.
        let _ = self.sender.send(event);
    }

    fn clone_box(&self) -> Box<dyn DownloadEventEmitterPort> {
        Box::new(self.clone())
    }
}
