//! Change feed plumbing shared by the store adapters.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::broadcast;

/// Buffered notifications per subscriber before it starts lagging.
const FEED_CAPACITY: usize = 256;

/// What kind of write happened.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
    /// Notifications were dropped; something changed
    Unknown,
}

/// A change notification. Subscribers should not rely on the payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub record_id: Option<String>,
}

impl ChangeEvent {
    pub fn insert(id: &str) -> Self {
        Self {
            kind: ChangeKind::Insert,
            record_id: Some(id.to_string()),
        }
    }

    pub fn update(id: &str) -> Self {
        Self {
            kind: ChangeKind::Update,
            record_id: Some(id.to_string()),
        }
    }

    pub fn delete(id: &str) -> Self {
        Self {
            kind: ChangeKind::Delete,
            record_id: Some(id.to_string()),
        }
    }

    fn unknown() -> Self {
        Self {
            kind: ChangeKind::Unknown,
            record_id: None,
        }
    }
}

/// The subscription's channel is in an error state.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FeedError {
    #[error("change feed closed")]
    Closed,
}

/// A live change-feed subscription. Dropping it releases the subscription.
pub struct ChangeSubscription {
    receiver: broadcast::Receiver<ChangeEvent>,
    _slot: SubscriptionSlot,
}

impl ChangeSubscription {
    /// Wait for the next notification.
    ///
    /// A subscriber that fell behind gets one `ChangeKind::Unknown` event in
    /// place of the notifications it missed.
    pub async fn recv(&mut self) -> Result<ChangeEvent, FeedError> {
        match self.receiver.recv().await {
            Ok(event) => Ok(event),
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                log::warn!("Change feed lagged, {} notifications dropped", missed);
                Ok(ChangeEvent::unknown())
            }
            Err(broadcast::error::RecvError::Closed) => Err(FeedError::Closed),
        }
    }
}

impl std::fmt::Debug for ChangeSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeSubscription").finish_non_exhaustive()
    }
}

/// Counts one open subscription for as long as it lives.
struct SubscriptionSlot {
    active: Arc<AtomicUsize>,
}

impl Drop for SubscriptionSlot {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Broadcast hub a store publishes its writes to.
pub struct ChangeFeed {
    sender: Mutex<broadcast::Sender<ChangeEvent>>,
    active: Arc<AtomicUsize>,
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeFeed {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(FEED_CAPACITY);
        Self {
            sender: Mutex::new(sender),
            active: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn subscribe(&self) -> ChangeSubscription {
        let receiver = match self.sender.lock() {
            Ok(sender) => sender.subscribe(),
            Err(poisoned) => poisoned.into_inner().subscribe(),
        };
        self.active.fetch_add(1, Ordering::SeqCst);
        ChangeSubscription {
            receiver,
            _slot: SubscriptionSlot {
                active: Arc::clone(&self.active),
            },
        }
    }

    /// Notify every open subscription. No subscribers is not an error.
    pub fn publish(&self, event: ChangeEvent) {
        let sender = match self.sender.lock() {
            Ok(sender) => sender,
            Err(poisoned) => poisoned.into_inner(),
        };
        let _ = sender.send(event);
    }

    /// Close every open subscription's channel. New subscriptions work.
    pub fn disconnect_all(&self) {
        let (fresh, _) = broadcast::channel(FEED_CAPACITY);
        let old = match self.sender.lock() {
            Ok(mut sender) => std::mem::replace(&mut *sender, fresh),
            Err(poisoned) => std::mem::replace(&mut *poisoned.into_inner(), fresh),
        };
        drop(old);
    }

    /// Subscriptions not yet dropped.
    pub fn active_subscriptions(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }
}
