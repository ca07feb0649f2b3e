//! Cross-type notification feed for the signed-in actor.
//!
//! The aggregator never tracks the badge incrementally: every change event
//! triggers a full fetch-and-recompute from the store, so whatever a race
//! did to the optimistic local view is overwritten by truth one event
//! later.  The only local mutation is the optimistic acknowledge, and it
//! only ever moves the count toward what the store will confirm.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex as StdMutex};

use salus_shared::constants::NOTIFICATION_KIND_CHAT;
use salus_store::{Database, Notification};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::LiveError;
use crate::feed::{ChangeFeed, EntityKind};

/// Snapshot of the recipient's feed: the badge count and the notifications
/// grouped by kind, newest first within each group.  Soft-deleted rows are
/// filtered out before this struct is built.
#[derive(Debug, Clone, Default)]
pub struct NotificationView {
    pub unread: usize,
    pub grouped: BTreeMap<String, Vec<Notification>>,
}

/// Navigation target carried by a chat notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatTarget {
    pub subject_id: Uuid,
    pub subject_name: Option<String>,
}

struct AggregatorInner {
    db: Arc<Mutex<Database>>,
    feed: ChangeFeed,
    recipient_id: Uuid,
    view: StdMutex<NotificationView>,
}

/// Unread feed view model for one recipient.
#[derive(Clone)]
pub struct NotificationAggregator {
    inner: Arc<AggregatorInner>,
}

impl NotificationAggregator {
    pub fn new(db: Arc<Mutex<Database>>, feed: ChangeFeed, recipient_id: Uuid) -> Self {
        Self {
            inner: Arc::new(AggregatorInner {
                db,
                feed,
                recipient_id,
                view: StdMutex::new(NotificationView::default()),
            }),
        }
    }

    pub fn recipient_id(&self) -> Uuid {
        self.inner.recipient_id
    }

    /// Re-fetch the recipient's notifications and rebuild the whole view.
    ///
    /// Called on mount and after every change event; this is the
    /// reconciliation point that keeps the badge honest.
    pub async fn refresh(&self) -> Result<(), LiveError> {
        let rows = {
            let db = self.inner.db.lock().await;
            db.notifications_for_recipient(self.inner.recipient_id)?
        };

        let unread = rows.iter().filter(|n| !n.read).count();

        // Rows arrive newest first; pushing in order keeps each group
        // newest first too.
        let mut grouped: BTreeMap<String, Vec<Notification>> = BTreeMap::new();
        for notification in rows {
            grouped
                .entry(notification.kind.clone())
                .or_default()
                .push(notification);
        }

        debug!(
            recipient_id = %self.inner.recipient_id,
            unread,
            kinds = grouped.len(),
            "notification view recomputed"
        );

        *self.inner.view.lock().expect("view lock poisoned") =
            NotificationView { unread, grouped };
        Ok(())
    }

    /// Badge count from the last recompute.
    pub fn current_unread(&self) -> usize {
        self.inner.view.lock().expect("view lock poisoned").unread
    }

    /// Kind-grouped feed from the last recompute.
    pub fn current_grouped(&self) -> BTreeMap<String, Vec<Notification>> {
        self.inner
            .view
            .lock()
            .expect("view lock poisoned")
            .grouped
            .clone()
    }

    /// Acknowledge a notification: persist read=true, then optimistically
    /// patch the local view.  The next re-pull confirms or corrects; a
    /// stale decrement self-heals.
    pub async fn acknowledge(&self, id: Uuid) -> Result<(), LiveError> {
        let transitioned = {
            let db = self.inner.db.lock().await;
            db.mark_notification_read(id)?
        };

        if !transitioned {
            // Already read, e.g. a double-click or another session got
            // there first.  The view is already right.
            return Ok(());
        }

        let mut view = self.inner.view.lock().expect("view lock poisoned");
        for group in view.grouped.values_mut() {
            if let Some(n) = group.iter_mut().find(|n| n.id == id) {
                n.read = true;
            }
        }
        view.unread = view.unread.saturating_sub(1);

        info!(notification_id = %id, "notification acknowledged");
        Ok(())
    }

    /// Acknowledge a chat notification and hand back its conversation
    /// target.
    ///
    /// The acknowledge completes before the target is returned, so a fast
    /// double-click cannot double-decrement the badge or navigate with a
    /// stale count.  Non-chat notifications acknowledge normally and
    /// return no target.
    pub async fn acknowledge_and_navigate(
        &self,
        notification: &Notification,
    ) -> Result<Option<ChatTarget>, LiveError> {
        self.acknowledge(notification.id).await?;

        if notification.kind != NOTIFICATION_KIND_CHAT {
            return Ok(None);
        }

        let subject_id = notification
            .context
            .get("subjectId")
            .and_then(|v| v.as_str())
            .and_then(|s| Uuid::parse_str(s).ok());

        match subject_id {
            Some(subject_id) => Ok(Some(ChatTarget {
                subject_id,
                subject_name: notification
                    .context
                    .get("subjectName")
                    .and_then(|v| v.as_str())
                    .map(str::to_string),
            })),
            None => {
                warn!(
                    notification_id = %notification.id,
                    "chat notification without subjectId context"
                );
                Ok(None)
            }
        }
    }

    /// Register for change-driven refreshes.
    ///
    /// Every notification change event triggers a full re-pull followed by
    /// `on_change`, so the caller re-renders from `current_unread` /
    /// `current_grouped`.  Dropping the returned [`Subscription`] stops
    /// further invocations and releases the feed slot.
    pub fn subscribe<F>(&self, on_change: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        let mut sub = self.inner.feed.subscribe(EntityKind::Notification);
        let aggregator = self.clone();

        let handle = tokio::spawn(async move {
            while let Some(event) = sub.changed().await {
                // The recipient hint lets us skip other users' events; an
                // absent hint means re-pull to be safe.
                if matches!(event.recipient_id, Some(r) if r != aggregator.recipient_id()) {
                    continue;
                }
                if let Err(e) = aggregator.refresh().await {
                    warn!(error = %e, "notification re-pull failed, keeping stale view");
                }
                on_change();
            }
        });

        Subscription { handle }
    }
}

/// Handle to an active aggregator subscription.  Unsubscribe explicitly or
/// drop it on unmount; either way delivery stops.
pub struct Subscription {
    handle: JoinHandle<()>,
}

impl Subscription {
    pub fn unsubscribe(self) {
        self.handle.abort();
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::ChangeEvent;
    use chrono::{Duration, Utc};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration as StdDuration;
    use tempfile::TempDir;

    fn open_db() -> (Arc<Mutex<Database>>, TempDir) {
        let dir = TempDir::new().unwrap();
        let db = Arc::new(Mutex::new(
            Database::open_at(&dir.path().join("test.db")).unwrap(),
        ));
        (db, dir)
    }

    fn notification(recipient: Uuid, kind: &str, age_secs: i64) -> Notification {
        Notification {
            id: Uuid::new_v4(),
            recipient_id: recipient,
            kind: kind.to_string(),
            title: format!("{kind} update"),
            body: "details".to_string(),
            context: json!({}),
            created_at: Utc::now() - Duration::seconds(age_secs),
            read: false,
            deleted: false,
        }
    }

    #[tokio::test]
    async fn refresh_groups_by_kind_newest_first() {
        let (db, _dir) = open_db();
        let recipient = Uuid::new_v4();

        let old_chat = notification(recipient, "chat", 60);
        let new_chat = notification(recipient, "chat", 5);
        let sched = notification(recipient, "scheduling", 30);
        {
            let db = db.lock().await;
            for n in [&old_chat, &new_chat, &sched] {
                db.insert_notification(n).unwrap();
            }
        }

        let aggregator = NotificationAggregator::new(db, ChangeFeed::new(), recipient);
        aggregator.refresh().await.unwrap();

        assert_eq!(aggregator.current_unread(), 3);
        let grouped = aggregator.current_grouped();
        assert_eq!(grouped.len(), 2);
        let chat_ids: Vec<Uuid> = grouped["chat"].iter().map(|n| n.id).collect();
        assert_eq!(chat_ids, vec![new_chat.id, old_chat.id]);
    }

    #[tokio::test]
    async fn optimistic_acknowledge_reconciles_without_undercount() {
        let (db, _dir) = open_db();
        let recipient = Uuid::new_v4();

        let a = notification(recipient, "chat", 10);
        let b = notification(recipient, "chat", 20);
        let c = notification(recipient, "system", 30);
        {
            let db = db.lock().await;
            for n in [&a, &b, &c] {
                db.insert_notification(n).unwrap();
            }
        }

        let aggregator = NotificationAggregator::new(db.clone(), ChangeFeed::new(), recipient);
        aggregator.refresh().await.unwrap();
        assert_eq!(aggregator.current_unread(), 3);

        // Optimistic decrement...
        aggregator.acknowledge(a.id).await.unwrap();
        assert_eq!(aggregator.current_unread(), 2);

        // ...a double-click does not decrement twice...
        aggregator.acknowledge(a.id).await.unwrap();
        assert_eq!(aggregator.current_unread(), 2);

        // ...and the forced re-pull lands exactly on store truth.
        aggregator.refresh().await.unwrap();
        let truth = db.lock().await.unread_notification_count(recipient).unwrap();
        assert_eq!(aggregator.current_unread() as i64, truth);
        assert_eq!(truth, 2);
    }

    #[tokio::test]
    async fn chat_acknowledge_yields_navigation_target() {
        let (db, _dir) = open_db();
        let recipient = Uuid::new_v4();
        let subject = Uuid::new_v4();

        let mut chat = notification(recipient, "chat", 1);
        chat.context = json!({ "subjectId": subject.to_string(), "subjectName": "Maria Souza" });
        let system = notification(recipient, "system", 2);
        {
            let db = db.lock().await;
            db.insert_notification(&chat).unwrap();
            db.insert_notification(&system).unwrap();
        }

        let aggregator = NotificationAggregator::new(db, ChangeFeed::new(), recipient);
        aggregator.refresh().await.unwrap();

        let target = aggregator.acknowledge_and_navigate(&chat).await.unwrap();
        assert_eq!(
            target,
            Some(ChatTarget {
                subject_id: subject,
                subject_name: Some("Maria Souza".to_string()),
            })
        );
        assert_eq!(aggregator.current_unread(), 1);

        // Double-clicking navigates again but leaves the badge alone.
        let again = aggregator.acknowledge_and_navigate(&chat).await.unwrap();
        assert!(again.is_some());
        assert_eq!(aggregator.current_unread(), 1);

        // Non-chat kinds acknowledge without a target.
        assert_eq!(
            aggregator.acknowledge_and_navigate(&system).await.unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn subscription_refreshes_until_dropped() {
        let (db, _dir) = open_db();
        let recipient = Uuid::new_v4();
        let feed = ChangeFeed::new();
        let aggregator = NotificationAggregator::new(db.clone(), feed.clone(), recipient);

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let subscription = aggregator.subscribe(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        // A new notification lands server-side and the feed pings.
        {
            let db = db.lock().await;
            db.insert_notification(&notification(recipient, "chat", 0))
                .unwrap();
        }
        feed.publish(ChangeEvent::notification(recipient));
        tokio::time::sleep(StdDuration::from_millis(100)).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(aggregator.current_unread(), 1);

        // Another recipient's event is skipped.
        feed.publish(ChangeEvent::notification(Uuid::new_v4()));
        tokio::time::sleep(StdDuration::from_millis(100)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // After unsubscribing, nothing fires and the feed slot is released.
        subscription.unsubscribe();
        tokio::time::sleep(StdDuration::from_millis(50)).await;
        feed.publish(ChangeEvent::notification(recipient));
        tokio::time::sleep(StdDuration::from_millis(100)).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(feed.subscriber_count(), 0);
    }
}
