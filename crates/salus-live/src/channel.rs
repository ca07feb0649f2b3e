//! Per-patient conversation threads.
//!
//! A thread is nothing but message accumulation plus the one-way per-message
//! read transition.  Display order is reconstructed on every fetch by
//! sorting on `(created_at, id)` — the transport and the store are never
//! trusted to return events in order, and the id tie-break keeps concurrent
//! sends from interleaving differently across repeated reads.

use std::sync::Arc;

use chrono::Utc;
use salus_files::normalize_storage_path;
use salus_shared::SessionContext;
use salus_store::{Attachment, AttachmentRef, Database, Message};
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

use crate::error::LiveError;
use crate::feed::{ChangeEvent, ChangeFeed};

/// Render-time state of a message's attachment reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttachmentView<'a> {
    /// The reference resolves against the current catalog.
    Available(&'a Attachment),
    /// The message outlived its attachment; render "attachment removed"
    /// instead of attempting resolution.
    Removed,
}

/// Send/fetch/mark-read surface for one-subject conversation threads.
pub struct ConversationChannel {
    db: Arc<Mutex<Database>>,
    feed: ChangeFeed,
}

impl ConversationChannel {
    pub fn new(db: Arc<Mutex<Database>>, feed: ChangeFeed) -> Self {
        Self { db, feed }
    }

    /// All messages for a subject in display order: ascending `created_at`,
    /// ties broken by id so repeated reads agree.
    pub async fn fetch(&self, subject_id: Uuid) -> Result<Vec<Message>, LiveError> {
        let mut messages = {
            let db = self.db.lock().await;
            db.messages_for_subject(subject_id)?
        };
        messages.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(messages)
    }

    /// Persist a new message and signal the change.
    ///
    /// Text and attachment may coexist; the attachment must already be
    /// cataloged — the channel never uploads on the caller's behalf.
    /// Concurrent sends from different actors both persist: this is an
    /// insert, never an upsert.
    pub async fn send(
        &self,
        subject_id: Uuid,
        session: &SessionContext,
        content: String,
        attachment: Option<AttachmentRef>,
    ) -> Result<Message, LiveError> {
        if content.trim().is_empty() && attachment.is_none() {
            return Err(LiveError::EmptyMessage);
        }

        let message = Message {
            id: Uuid::new_v4(),
            subject_id,
            tenant_id: session.tenant_id,
            author_id: session.user_id,
            author_role: session.role,
            content,
            attachment,
            created_at: Utc::now(),
            read: false,
        };

        {
            let db = self.db.lock().await;
            db.insert_message(&message)?;
        }

        info!(
            message_id = %message.id,
            subject_id = %subject_id,
            role = %message.author_role,
            has_attachment = message.attachment.is_some(),
            "Message sent"
        );

        self.feed.publish(ChangeEvent::message(subject_id));
        Ok(message)
    }

    /// Mark every message the reader has not yet seen as read.  Returns the
    /// number of messages updated; calling again immediately returns zero.
    pub async fn mark_read(
        &self,
        subject_id: Uuid,
        session: &SessionContext,
    ) -> Result<usize, LiveError> {
        let updated = {
            let db = self.db.lock().await;
            db.mark_messages_read(subject_id, session.user_id)?
        };

        if updated > 0 {
            info!(subject_id = %subject_id, updated, "Messages marked read");
            self.feed.publish(ChangeEvent::message(subject_id));
        }
        Ok(updated)
    }
}

/// Resolve a message's attachment reference against the current catalog.
///
/// Returns `None` for plain text messages.  Paths are normalized on both
/// sides, so a reference stored as a full URL still matches its catalog
/// row.
pub fn resolve_attachment<'a>(
    message: &Message,
    live_attachments: &'a [Attachment],
) -> Option<AttachmentView<'a>> {
    let reference = message.attachment.as_ref()?;
    let wanted = normalize_storage_path(&reference.storage_path);

    let found = live_attachments
        .iter()
        .find(|a| normalize_storage_path(&a.storage_path) == wanted);

    Some(match found {
        Some(attachment) => AttachmentView::Available(attachment),
        None => AttachmentView::Removed,
    })
}
