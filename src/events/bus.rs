use super::types::{EventSequence, MonitorEvent, MonitorEventPayload};
use crate::logging::EventJournal;
use chrono::Utc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, warn};

pub type EventReceiver = broadcast::Receiver<MonitorEvent>;
pub type EventSender = broadcast::Sender<MonitorEvent>;

/// Event bus for distributing monitor notifications
#[derive(Clone, Debug)]
pub struct EventBus {
    sender: EventSender,
    sequence: Arc<AtomicU64>,
    journal: Option<EventJournal>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            sequence: Arc::new(AtomicU64::new(1)),
            journal: None,
        }
    }

    /// Also append every published event to `journal`
    pub fn with_journal(mut self, journal: EventJournal) -> Self {
        self.journal = Some(journal);
        self
    }

    /// Publish an event (returns sequence number)
    ///
    /// Having no subscribers is not an error; the monitor keeps running.
    pub fn publish(&self, payload: MonitorEventPayload) -> EventSequence {
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst);

        let event = MonitorEvent {
            sequence,
            timestamp: Utc::now(),
            payload,
        };

        if let Some(journal) = &self.journal {
            if let Err(e) = journal.append(&event) {
                warn!("Failed to write event journal: {}", e);
            }
        }

        if self.sender.send(event).is_err() {
            debug!(sequence, "No event subscribers");
        }

        sequence
    }

    /// Subscribe to events
    pub fn subscribe(&self) -> EventReceiver {
        self.sender.subscribe()
    }

    /// Get current sequence number
    pub fn current_sequence(&self) -> EventSequence {
        self.sequence.load(Ordering::SeqCst)
    }

    /// Get number of active receivers
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
