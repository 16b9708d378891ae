//! Fan-out of captured events to live observers.
//!
//! Every subscriber owns a mailbox holding at most one event. Delivery is a
//! non-blocking attempt: a full mailbox drops the event for that subscriber.

use super::events::Event;
use std::collections::HashMap;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// Mailbox capacity per subscriber.
pub const SUBSCRIBER_BUFFER: usize = 1;

/// Handle identifying a registered subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

/// A registered observer: its ID plus the receiving end of its mailbox.
///
/// `receiver.recv()` yields `None` once the hub has closed the mailbox.
#[derive(Debug)]
pub struct Subscriber {
    pub id: SubscriberId,
    pub receiver: mpsc::Receiver<Event>,
}

/// Outcome of a single broadcast.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    pub dropped: usize,
}

/// Registry of live subscriber mailboxes.
#[derive(Debug, Default)]
pub struct SubscriberHub {
    senders: HashMap<SubscriberId, mpsc::Sender<Event>>,
    next_id: u64,
}

impl SubscriberHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self) -> Subscriber {
        self.next_id += 1;
        let id = SubscriberId(self.next_id);
        let (tx, receiver) = mpsc::channel(SUBSCRIBER_BUFFER);
        self.senders.insert(id, tx);
        Subscriber { id, receiver }
    }

    /// Remove a subscriber and close its mailbox. Unknown IDs are ignored.
    pub fn unsubscribe(&mut self, id: SubscriberId) -> bool {
        // Dropping the only sender closes the channel.
        self.senders.remove(&id).is_some()
    }

    /// Offer `event` to every subscriber without waiting on any of them.
    pub fn broadcast(&mut self, event: &Event) -> BroadcastReport {
        let mut report = BroadcastReport::default();
        let mut gone = Vec::new();

        for (id, tx) in &self.senders {
            match tx.try_send(event.clone()) {
                Ok(()) => report.delivered += 1,
                Err(TrySendError::Full(_)) => report.dropped += 1,
                Err(TrySendError::Closed(_)) => gone.push(*id),
            }
        }

        // Receivers dropped without unsubscribing.
        for id in gone {
            self.senders.remove(&id);
        }
        report
    }

    /// Close every mailbox and empty the registry.
    pub fn close_all(&mut self) -> usize {
        let count = self.senders.len();
        self.senders.clear();
        count
    }

    pub fn len(&self) -> usize {
        self.senders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.senders.is_empty()
    }
}
