//! CRUD operations for [`Message`] records.

use chrono::{DateTime, Utc};
use rusqlite::params;
use salus_shared::{ActorRole, MediaType};
use uuid::Uuid;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{AttachmentRef, Message};

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Insert a new message.  Messages are append-only; the only later
    /// mutation is the read transition.
    pub fn insert_message(&self, message: &Message) -> Result<()> {
        self.conn().execute(
            "INSERT INTO messages
                 (id, subject_id, tenant_id, author_id, author_role, content,
                  attachment_path, attachment_media_type, created_at, read)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                message.id.to_string(),
                message.subject_id.to_string(),
                message.tenant_id.map(|t| t.to_string()),
                message.author_id.to_string(),
                message.author_role.as_str(),
                message.content,
                message.attachment.as_ref().map(|a| a.storage_path.clone()),
                message.attachment.as_ref().map(|a| a.media_type.as_mime()),
                message.created_at.to_rfc3339(),
                message.read as i32,
            ],
        )?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    /// Fetch a single message by UUID.
    pub fn get_message(&self, id: Uuid) -> Result<Message> {
        self.conn()
            .query_row(
                "SELECT id, subject_id, tenant_id, author_id, author_role, content,
                        attachment_path, attachment_media_type, created_at, read
                 FROM messages
                 WHERE id = ?1",
                params![id.to_string()],
                row_to_message,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })
    }

    /// All messages for a subject.
    ///
    /// The SQL orders by `created_at`, but callers must not depend on the
    /// returned order; the display layer re-sorts with a stable tie-break.
    pub fn messages_for_subject(&self, subject_id: Uuid) -> Result<Vec<Message>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, subject_id, tenant_id, author_id, author_role, content,
                    attachment_path, attachment_media_type, created_at, read
             FROM messages
             WHERE subject_id = ?1
             ORDER BY created_at ASC",
        )?;

        let rows = stmt.query_map(params![subject_id.to_string()], row_to_message)?;

        let mut messages = Vec::new();
        for row in rows {
            messages.push(row?);
        }
        Ok(messages)
    }

    /// Count of unread messages for a subject that the given reader did not
    /// author.
    pub fn unread_message_count(&self, subject_id: Uuid, reader_id: Uuid) -> Result<i64> {
        let count = self.conn().query_row(
            "SELECT COUNT(*) FROM messages
             WHERE subject_id = ?1 AND read = 0 AND author_id != ?2",
            params![subject_id.to_string(), reader_id.to_string()],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    // ------------------------------------------------------------------
    // Update
    // ------------------------------------------------------------------

    /// Mark every currently-unread message for a subject as read, excluding
    /// the reader's own messages.  Returns the number of rows updated.
    ///
    /// The `read = 0` guard makes the false-to-true transition structural:
    /// re-running the statement is a no-op and nothing ever flips back.
    pub fn mark_messages_read(&self, subject_id: Uuid, reader_id: Uuid) -> Result<usize> {
        let affected = self.conn().execute(
            "UPDATE messages SET read = 1
             WHERE subject_id = ?1 AND read = 0 AND author_id != ?2",
            params![subject_id.to_string(), reader_id.to_string()],
        )?;
        Ok(affected)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Map a `rusqlite::Row` to a [`Message`].
fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<Message> {
    let id_str: String = row.get(0)?;
    let subject_str: String = row.get(1)?;
    let tenant_str: Option<String> = row.get(2)?;
    let author_str: String = row.get(3)?;
    let role_str: String = row.get(4)?;
    let content: String = row.get(5)?;
    let attachment_path: Option<String> = row.get(6)?;
    let attachment_mime: Option<String> = row.get(7)?;
    let created_str: String = row.get(8)?;
    let read_int: i32 = row.get(9)?;

    let id = parse_uuid(id_str, 0)?;
    let subject_id = parse_uuid(subject_str, 1)?;
    let tenant_id = tenant_str.map(|s| parse_uuid(s, 2)).transpose()?;
    let author_id = parse_uuid(author_str, 3)?;

    let author_role = ActorRole::parse(&role_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            4,
            rusqlite::types::Type::Text,
            format!("unknown actor role '{role_str}'").into(),
        )
    })?;

    let attachment = match (attachment_path, attachment_mime) {
        (Some(storage_path), Some(mime)) => {
            let media_type = MediaType::from_mime(&mime).ok_or_else(|| {
                rusqlite::Error::FromSqlConversionFailure(
                    7,
                    rusqlite::types::Type::Text,
                    format!("unknown media type '{mime}'").into(),
                )
            })?;
            Some(AttachmentRef {
                storage_path,
                media_type,
            })
        }
        _ => None,
    };

    let created_at: DateTime<Utc> = DateTime::parse_from_rfc3339(&created_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(8, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(Message {
        id,
        subject_id,
        tenant_id,
        author_id,
        author_role,
        content,
        attachment,
        created_at,
        read: read_int != 0,
    })
}

pub(crate) fn parse_uuid(s: String, column: usize) -> rusqlite::Result<Uuid> {
    Uuid::parse_str(&s).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Text, Box::new(e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use salus_shared::ActorRole;

    fn open_db() -> (Database, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open_at(&dir.path().join("test.db")).unwrap();
        (db, dir)
    }

    fn message(subject: Uuid, author: Uuid, role: ActorRole, content: &str) -> Message {
        Message {
            id: Uuid::new_v4(),
            subject_id: subject,
            tenant_id: None,
            author_id: author,
            author_role: role,
            content: content.to_string(),
            attachment: None,
            created_at: Utc::now(),
            read: false,
        }
    }

    #[test]
    fn insert_and_fetch_round_trip() {
        let (db, _dir) = open_db();
        let subject = Uuid::new_v4();
        let author = Uuid::new_v4();

        let msg = message(subject, author, ActorRole::Doctor, "Bom dia");
        db.insert_message(&msg).unwrap();

        let fetched = db.get_message(msg.id).unwrap();
        assert_eq!(fetched, msg);

        let all = db.messages_for_subject(subject).unwrap();
        assert_eq!(all.len(), 1);
    }

    #[test]
    fn attachment_ref_round_trip() {
        let (db, _dir) = open_db();
        let subject = Uuid::new_v4();

        let mut msg = message(subject, Uuid::new_v4(), ActorRole::Staff, "");
        msg.attachment = Some(AttachmentRef {
            storage_path: format!("{subject}/1700000000000-aa/exam.pdf"),
            media_type: MediaType::Pdf,
        });
        db.insert_message(&msg).unwrap();

        let fetched = db.get_message(msg.id).unwrap();
        assert_eq!(fetched.attachment, msg.attachment);
    }

    #[test]
    fn mark_read_skips_own_and_is_idempotent() {
        let (db, _dir) = open_db();
        let subject = Uuid::new_v4();
        let doctor = Uuid::new_v4();
        let patient = Uuid::new_v4();

        db.insert_message(&message(subject, patient, ActorRole::Patient, "oi"))
            .unwrap();
        db.insert_message(&message(subject, patient, ActorRole::Patient, "tudo bem?"))
            .unwrap();
        db.insert_message(&message(subject, doctor, ActorRole::Doctor, "ola"))
            .unwrap();

        // Doctor reads: two patient messages flip, the doctor's own does not.
        assert_eq!(db.mark_messages_read(subject, doctor).unwrap(), 2);
        assert_eq!(db.unread_message_count(subject, doctor).unwrap(), 0);

        // Second pass changes nothing.
        assert_eq!(db.mark_messages_read(subject, doctor).unwrap(), 0);
    }

    #[test]
    fn missing_message_is_not_found() {
        let (db, _dir) = open_db();
        assert!(matches!(
            db.get_message(Uuid::new_v4()),
            Err(StoreError::NotFound)
        ));
    }
}
