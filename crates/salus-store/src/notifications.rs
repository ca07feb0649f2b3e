//! CRUD operations for [`Notification`] records.
//!
//! Notifications are created by server-side business logic outside this
//! subsystem; the insert below is the statement that logic (and the tests)
//! use.  This layer never hard-deletes: rows only ever gain `read = 1` or
//! `deleted = 1`.

use chrono::{DateTime, Utc};
use rusqlite::params;
use uuid::Uuid;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::messages::parse_uuid;
use crate::models::Notification;

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Insert a new notification.
    pub fn insert_notification(&self, notification: &Notification) -> Result<()> {
        self.conn().execute(
            "INSERT INTO notifications
                 (id, recipient_id, kind, title, body, context, created_at, read, deleted)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                notification.id.to_string(),
                notification.recipient_id.to_string(),
                notification.kind,
                notification.title,
                notification.body,
                notification.context.to_string(),
                notification.created_at.to_rfc3339(),
                notification.read as i32,
                notification.deleted as i32,
            ],
        )?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    /// Fetch a single notification by UUID.
    pub fn get_notification(&self, id: Uuid) -> Result<Notification> {
        self.conn()
            .query_row(
                "SELECT id, recipient_id, kind, title, body, context, created_at, read, deleted
                 FROM notifications
                 WHERE id = ?1",
                params![id.to_string()],
                row_to_notification,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })
    }

    /// All non-deleted notifications for a recipient, newest first.
    pub fn notifications_for_recipient(&self, recipient_id: Uuid) -> Result<Vec<Notification>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, recipient_id, kind, title, body, context, created_at, read, deleted
             FROM notifications
             WHERE recipient_id = ?1 AND deleted = 0
             ORDER BY created_at DESC",
        )?;

        let rows = stmt.query_map(params![recipient_id.to_string()], row_to_notification)?;

        let mut notifications = Vec::new();
        for row in rows {
            notifications.push(row?);
        }
        Ok(notifications)
    }

    /// True unread count for a recipient: `read = 0 AND deleted = 0`.
    ///
    /// The badge shown in the UI is always reconciled against this query,
    /// never tracked incrementally.
    pub fn unread_notification_count(&self, recipient_id: Uuid) -> Result<i64> {
        let count = self.conn().query_row(
            "SELECT COUNT(*) FROM notifications
             WHERE recipient_id = ?1 AND read = 0 AND deleted = 0",
            params![recipient_id.to_string()],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    // ------------------------------------------------------------------
    // Update
    // ------------------------------------------------------------------

    /// Acknowledge a notification.  Returns `true` if the row transitioned;
    /// acknowledging an already-read notification is a no-op.
    pub fn mark_notification_read(&self, id: Uuid) -> Result<bool> {
        let affected = self.conn().execute(
            "UPDATE notifications SET read = 1 WHERE id = ?1 AND read = 0",
            params![id.to_string()],
        )?;
        Ok(affected > 0)
    }

    /// Soft-delete a notification.  Set by an out-of-scope process; exposed
    /// here so that process (and the tests) share one statement.
    pub fn soft_delete_notification(&self, id: Uuid) -> Result<bool> {
        let affected = self.conn().execute(
            "UPDATE notifications SET deleted = 1 WHERE id = ?1 AND deleted = 0",
            params![id.to_string()],
        )?;
        Ok(affected > 0)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Map a `rusqlite::Row` to a [`Notification`].
fn row_to_notification(row: &rusqlite::Row<'_>) -> rusqlite::Result<Notification> {
    let id_str: String = row.get(0)?;
    let recipient_str: String = row.get(1)?;
    let kind: String = row.get(2)?;
    let title: String = row.get(3)?;
    let body: String = row.get(4)?;
    let context_str: String = row.get(5)?;
    let created_str: String = row.get(6)?;
    let read_int: i32 = row.get(7)?;
    let deleted_int: i32 = row.get(8)?;

    let id = parse_uuid(id_str, 0)?;
    let recipient_id = parse_uuid(recipient_str, 1)?;

    let context: serde_json::Value = serde_json::from_str(&context_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
    })?;

    let created_at: DateTime<Utc> = DateTime::parse_from_rfc3339(&created_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(6, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(Notification {
        id,
        recipient_id,
        kind,
        title,
        body,
        context,
        created_at,
        read: read_int != 0,
        deleted: deleted_int != 0,
    })
}
