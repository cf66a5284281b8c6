use dashmap::DashMap;
use tokio::sync::broadcast;
use ulid::Ulid;

use crate::model::Event;

const CHANNEL_CAPACITY: usize = 256;

/// Per-court broadcast of committed booking events.
pub struct NotifyHub {
    channels: DashMap<Ulid, broadcast::Sender<Event>>,
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

    /// Creates the court's channel on first use.
    pub fn subscribe(&self, court_id: Ulid) -> broadcast::Receiver<Event> {
        self.channels
            .entry(court_id)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    /// No-op without subscribers. A channel whose receivers have all gone is
    /// dropped.
    pub fn send(&self, court_id: Ulid, event: &Event) {
        let orphaned = match self.channels.get(&court_id) {
            Some(sender) => sender.send(event.clone()).is_err(),
            None => return,
        };
        if orphaned {
            self.channels.remove_if(&court_id, |_, sender| sender.receiver_count() == 0);
        }
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }
}
