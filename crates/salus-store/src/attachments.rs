//! CRUD operations for [`Attachment`] metadata records.
//!
//! Only the metadata lives here; the bytes live in the object store.  The
//! registry (salus-files) guarantees that a row is only inserted after the
//! store write succeeded.

use chrono::{DateTime, Utc};
use rusqlite::params;
use salus_shared::{ActorRef, ActorRole, MediaType};
use uuid::Uuid;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::messages::parse_uuid;
use crate::models::Attachment;

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Insert an attachment metadata row.
    pub fn insert_attachment(&self, attachment: &Attachment) -> Result<()> {
        self.conn().execute(
            "INSERT INTO attachments
                 (id, subject_id, file_name, media_type, size_bytes, storage_path,
                  category, uploaded_at, uploaded_by_role, uploaded_by_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                attachment.id.to_string(),
                attachment.subject_id.to_string(),
                attachment.file_name,
                attachment.media_type.as_mime(),
                attachment.size_bytes,
                attachment.storage_path,
                attachment.category,
                attachment.uploaded_at.to_rfc3339(),
                attachment.uploaded_by.role.as_str(),
                attachment.uploaded_by.id.to_string(),
            ],
        )?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    /// Fetch a single attachment by UUID.
    pub fn get_attachment(&self, id: Uuid) -> Result<Attachment> {
        self.conn()
            .query_row(
                "SELECT id, subject_id, file_name, media_type, size_bytes, storage_path,
                        category, uploaded_at, uploaded_by_role, uploaded_by_id
                 FROM attachments
                 WHERE id = ?1",
                params![id.to_string()],
                row_to_attachment,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })
    }

    /// All attachments for a subject, newest first.
    pub fn attachments_for_subject(&self, subject_id: Uuid) -> Result<Vec<Attachment>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, subject_id, file_name, media_type, size_bytes, storage_path,
                    category, uploaded_at, uploaded_by_role, uploaded_by_id
             FROM attachments
             WHERE subject_id = ?1
             ORDER BY uploaded_at DESC, id ASC",
        )?;

        let rows = stmt.query_map(params![subject_id.to_string()], row_to_attachment)?;

        let mut attachments = Vec::new();
        for row in rows {
            attachments.push(row?);
        }
        Ok(attachments)
    }

    // ------------------------------------------------------------------
    // Delete
    // ------------------------------------------------------------------

    /// Delete an attachment metadata row.  Returns `true` if a row was
    /// deleted.  The registry removes the store object first.
    pub fn delete_attachment(&self, id: Uuid) -> Result<bool> {
        let affected = self.conn().execute(
            "DELETE FROM attachments WHERE id = ?1",
            params![id.to_string()],
        )?;
        Ok(affected > 0)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Map a `rusqlite::Row` to an [`Attachment`].
fn row_to_attachment(row: &rusqlite::Row<'_>) -> rusqlite::Result<Attachment> {
    let id_str: String = row.get(0)?;
    let subject_str: String = row.get(1)?;
    let file_name: String = row.get(2)?;
    let mime: String = row.get(3)?;
    let size_bytes: i64 = row.get(4)?;
    let storage_path: String = row.get(5)?;
    let category: String = row.get(6)?;
    let uploaded_str: String = row.get(7)?;
    let role_str: String = row.get(8)?;
    let uploader_str: String = row.get(9)?;

    let id = parse_uuid(id_str, 0)?;
    let subject_id = parse_uuid(subject_str, 1)?;

    let media_type = MediaType::from_mime(&mime).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            3,
            rusqlite::types::Type::Text,
            format!("unknown media type '{mime}'").into(),
        )
    })?;

    let uploaded_at: DateTime<Utc> = DateTime::parse_from_rfc3339(&uploaded_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(7, rusqlite::types::Type::Text, Box::new(e))
        })?;

    let role = ActorRole::parse(&role_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            8,
            rusqlite::types::Type::Text,
            format!("unknown actor role '{role_str}'").into(),
        )
    })?;
    let uploader_id = parse_uuid(uploader_str, 9)?;

    Ok(Attachment {
        id,
        subject_id,
        file_name,
        media_type,
        size_bytes,
        storage_path,
        category,
        uploaded_at,
        uploaded_by: ActorRef::new(role, uploader_id),
    })
}
