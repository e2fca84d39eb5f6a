// ABOUTME: Schema-change notifications for display layers
// ABOUTME: Broadcast channel fired when descriptor labels or units change

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tracing::debug;

const CHANNEL_CAPACITY: usize = 64;

/// Emitted after changed descriptors have been persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaChanged {
    pub instance_id: String,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct SchemaNotifier {
    sender: broadcast::Sender<SchemaChanged>,
}

impl SchemaNotifier {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SchemaChanged> {
        self.sender.subscribe()
    }

    /// Send to every current subscriber. Having none is not an error.
    pub fn notify(&self, instance_id: &str) {
        let event = SchemaChanged {
            instance_id: instance_id.to_string(),
            at: Utc::now(),
        };
        match self.sender.send(event) {
            Ok(receivers) => debug!(
                "Schema change for '{}' sent to {} subscribers",
                instance_id, receivers
            ),
            Err(_) => debug!("Schema change for '{}' had no subscribers", instance_id),
        }
    }
}

impl Default for SchemaNotifier {
    fn default() -> Self {
        Self::new()
    }
}
