//! v001 -- Initial schema creation.
//!
//! Creates the three core tables: `messages`, `notifications`, and
//! `attachments`.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Messages (per-subject conversation log; append-only plus the
-- one-way read transition)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS messages (
    id                    TEXT PRIMARY KEY NOT NULL,  -- UUID v4
    subject_id            TEXT NOT NULL,              -- patient UUID
    tenant_id             TEXT,                       -- nullable clinic UUID
    author_id             TEXT NOT NULL,
    author_role           TEXT NOT NULL,              -- doctor|patient|clinic|staff
    content               TEXT NOT NULL,              -- may be empty (attachment-only)
    attachment_path       TEXT,                       -- relative storage path
    attachment_media_type TEXT,                       -- set iff attachment_path is
    created_at            TEXT NOT NULL,              -- ISO-8601 / RFC-3339
    read                  INTEGER NOT NULL DEFAULT 0  -- boolean 0/1
);

CREATE INDEX IF NOT EXISTS idx_messages_subject_created
    ON messages(subject_id, created_at);

-- ----------------------------------------------------------------
-- Notifications (cross-type feed; soft delete only)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS notifications (
    id           TEXT PRIMARY KEY NOT NULL,           -- UUID v4
    recipient_id TEXT NOT NULL,
    kind         TEXT NOT NULL,                       -- open set: chat, scheduling, ...
    title        TEXT NOT NULL,
    body         TEXT NOT NULL,
    context      TEXT NOT NULL,                       -- kind-specific JSON payload
    created_at   TEXT NOT NULL,
    read         INTEGER NOT NULL DEFAULT 0,
    deleted      INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_notifications_recipient_created
    ON notifications(recipient_id, created_at DESC);

-- ----------------------------------------------------------------
-- Attachments (metadata catalog; the bytes live in the object store)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS attachments (
    id               TEXT PRIMARY KEY NOT NULL,       -- UUID v4
    subject_id       TEXT NOT NULL,
    file_name        TEXT NOT NULL,
    media_type       TEXT NOT NULL,                   -- whitelisted MIME type
    size_bytes       INTEGER NOT NULL,
    storage_path     TEXT NOT NULL UNIQUE,            -- relative object-store path
    category         TEXT NOT NULL,
    uploaded_at      TEXT NOT NULL,
    uploaded_by_role TEXT NOT NULL,                   -- doctor|patient|clinic|staff
    uploaded_by_id   TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_attachments_subject_uploaded
    ON attachments(subject_id, uploaded_at DESC);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
