use dashmap::DashMap;
use tokio::sync::broadcast;

use crate::model::Event;

const CHANNEL_CAPACITY: usize = 256;

/// Broadcast hub for LISTEN/NOTIFY per technician.
pub struct NotifyHub {
    channels: DashMap<String, broadcast::Sender<Event>>,
}

impl Default for NotifyHub {
    fn default() -> Self {
        Self::new()
    }
}

impl NotifyHub {
    pub fn new() -> Self {
        Self {
            channels: DashMap::new(),
        }
    }

    /// Subscribe to a technician's events. Creates the channel if needed.
    pub fn subscribe(&self, technician: &str) -> broadcast::Receiver<Event> {
        let sender = self
            .channels
            .entry(technician.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0);
        sender.subscribe()
    }

    /// Send a notification. No-op if nobody is listening.
    pub fn send(&self, technician: &str, event: &Event) {
        if let Some(sender) = self.channels.get(technician) {
            let _ = sender.send(event.clone());
        }
    }

    /// Drop a channel (the technician left the roster).
    pub fn remove(&self, technician: &str) {
        self.channels.remove(technician);
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }
}
