//! Domain model structs persisted in the SQLite database.
//!
//! Every struct derives `Serialize` and `Deserialize` so it can be handed
//! directly to the UI layer.

use chrono::{DateTime, Utc};
use salus_shared::{ActorRef, ActorRole, MediaType};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// Reference from a message to a previously uploaded attachment.
///
/// Holds the stable relative storage path and the declared media type, never
/// a resolved URL; resolved URLs are ephemeral and minted per preview.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AttachmentRef {
    pub storage_path: String,
    pub media_type: MediaType,
}

/// A single line in a patient's conversation thread.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    /// Unique message identifier.
    pub id: Uuid,
    /// The patient this thread belongs to.
    pub subject_id: Uuid,
    /// Clinic scope, when the sending session carried one.
    pub tenant_id: Option<Uuid>,
    /// Who sent the message.
    pub author_id: Uuid,
    pub author_role: ActorRole,
    /// Free text; may be empty for attachment-only messages.
    pub content: String,
    /// Optional reference to a cataloged attachment.
    pub attachment: Option<AttachmentRef>,
    pub created_at: DateTime<Utc>,
    /// Read flag; transitions false to true exactly once, never back.
    pub read: bool,
}

// ---------------------------------------------------------------------------
// Notification
// ---------------------------------------------------------------------------

/// An entry in a recipient's cross-type notification feed.
///
/// Created by server-side business logic outside this subsystem; this core
/// only reads it, acknowledges it, and filters the soft-delete flag.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Notification {
    pub id: Uuid,
    pub recipient_id: Uuid,
    /// Open set: "chat", "scheduling", "system", ...
    pub kind: String,
    pub title: String,
    pub body: String,
    /// Kind-specific payload, e.g. `{"subjectId": ..., "subjectName": ...}`
    /// for chat notifications.
    pub context: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub read: bool,
    /// Soft delete; suppresses display, never removed from the store.
    pub deleted: bool,
}

// ---------------------------------------------------------------------------
// Attachment
// ---------------------------------------------------------------------------

/// Metadata row for a file held in the object store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Attachment {
    pub id: Uuid,
    /// The patient this file belongs to.
    pub subject_id: Uuid,
    /// Original file name as uploaded.
    pub file_name: String,
    pub media_type: MediaType,
    pub size_bytes: i64,
    /// Opaque relative path into the object store.  NOT a public URL.
    pub storage_path: String,
    pub category: String,
    pub uploaded_at: DateTime<Utc>,
    /// Discriminated attribution: exactly one role+id pair.
    pub uploaded_by: ActorRef,
}
