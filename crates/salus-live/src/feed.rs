//! Process-wide change feed.
//!
//! One shared channel carries "something changed" signals from every
//! mutating operation to every interested view.  Events never carry
//! payloads worth trusting: consumers re-fetch from the store.
//!
//! The feed has an explicit lifecycle: it counts its subscribers, logs the
//! start of the underlying stream when the first one arrives, and logs the
//! stop when the last one leaves.  Dropping a [`FeedSubscription`] releases
//! its slot, so no mount can leak a listener.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast;
use uuid::Uuid;

/// Buffered events per subscriber.  A lagged subscriber does not lose
/// correctness — it re-pulls on the next event it does see.
const FEED_CAPACITY: usize = 64;

/// Which persisted entity changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Message,
    Notification,
    Attachment,
}

/// A "something changed" signal.  The optional ids let subscribers skip
/// events that cannot concern them; they are hints, not payloads.
#[derive(Debug, Clone)]
pub struct ChangeEvent {
    pub entity: EntityKind,
    pub subject_id: Option<Uuid>,
    pub recipient_id: Option<Uuid>,
}

impl ChangeEvent {
    pub fn message(subject_id: Uuid) -> Self {
        Self {
            entity: EntityKind::Message,
            subject_id: Some(subject_id),
            recipient_id: None,
        }
    }

    pub fn notification(recipient_id: Uuid) -> Self {
        Self {
            entity: EntityKind::Notification,
            subject_id: None,
            recipient_id: Some(recipient_id),
        }
    }

    pub fn attachment(subject_id: Uuid) -> Self {
        Self {
            entity: EntityKind::Attachment,
            subject_id: Some(subject_id),
            recipient_id: None,
        }
    }
}

struct FeedInner {
    tx: broadcast::Sender<ChangeEvent>,
    subscribers: AtomicUsize,
}

/// Handle to the shared change feed.  Cheap to clone; all clones feed the
/// same stream.
#[derive(Clone)]
pub struct ChangeFeed {
    inner: Arc<FeedInner>,
}

impl ChangeFeed {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(FEED_CAPACITY);
        Self {
            inner: Arc::new(FeedInner {
                tx,
                subscribers: AtomicUsize::new(0),
            }),
        }
    }

    /// Publish a change signal.  A feed with no subscribers drops the event,
    /// which is fine: a late subscriber starts with a fresh fetch anyway.
    pub fn publish(&self, event: ChangeEvent) {
        tracing::trace!(entity = ?event.entity, "publishing change event");
        let _ = self.inner.tx.send(event);
    }

    /// Register interest in one entity kind.
    pub fn subscribe(&self, entity: EntityKind) -> FeedSubscription {
        let previous = self.inner.subscribers.fetch_add(1, Ordering::SeqCst);
        if previous == 0 {
            tracing::info!("change feed started");
        }

        FeedSubscription {
            rx: self.inner.tx.subscribe(),
            entity,
            feed: self.clone(),
        }
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.load(Ordering::SeqCst)
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}

/// A live subscription to the change feed, filtered to one entity kind.
/// Dropping it releases the feed slot and stops delivery.
pub struct FeedSubscription {
    rx: broadcast::Receiver<ChangeEvent>,
    entity: EntityKind,
    feed: ChangeFeed,
}

impl FeedSubscription {
    /// Wait for the next change to the subscribed entity.
    ///
    /// Returns `None` once the feed is gone.  A lagged receiver is treated
    /// as a change signal for the subscribed entity: under the re-pull
    /// model, a missed event and a seen event trigger the same refresh.
    pub async fn changed(&mut self) -> Option<ChangeEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) if event.entity == self.entity => return Some(event),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "change feed lagged, forcing re-pull");
                    return Some(ChangeEvent {
                        entity: self.entity,
                        subject_id: None,
                        recipient_id: None,
                    });
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

impl Drop for FeedSubscription {
    fn drop(&mut self) {
        let previous = self.feed.inner.subscribers.fetch_sub(1, Ordering::SeqCst);
        if previous == 1 {
            tracing::info!("change feed stopped");
        }
    }
}
