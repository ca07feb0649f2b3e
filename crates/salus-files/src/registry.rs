//! Per-patient attachment catalog.
//!
//! The registry owns the validation rules and the upload/remove lifecycle;
//! the bytes themselves live behind the [`ObjectStore`] seam.  Commit order
//! on upload is store-write-then-register: a store object with no metadata
//! row is a cleanable orphan, a metadata row with no object is an invalid
//! state this ordering makes unreachable.

use std::sync::Arc;

use chrono::Utc;
use rand::Rng;
use salus_shared::constants::{
    DEFAULT_ATTACHMENT_CATEGORY, DEFAULT_PREVIEW_TTL_SECS, MAX_ATTACHMENT_BYTES,
    STORAGE_PATH_MARKER,
};
use salus_shared::{ActorRef, MediaType};
use salus_store::{Attachment, Database};
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{FilesError, ValidationError};
use crate::object_store::ObjectStore;

/// An upload as received from the UI: original name, declared MIME type,
/// and the raw bytes.
#[derive(Debug, Clone)]
pub struct FileUpload {
    pub file_name: String,
    pub media_type: String,
    pub bytes: Vec<u8>,
}

/// Validates, catalogs, and exposes attachment metadata per subject.
pub struct AttachmentRegistry {
    db: Arc<Mutex<Database>>,
    store: Arc<dyn ObjectStore>,
}

impl AttachmentRegistry {
    pub fn new(db: Arc<Mutex<Database>>, store: Arc<dyn ObjectStore>) -> Self {
        Self { db, store }
    }

    /// All attachments for a subject, newest first.
    pub async fn list(&self, subject_id: Uuid) -> Result<Vec<Attachment>, FilesError> {
        let db = self.db.lock().await;
        Ok(db.attachments_for_subject(subject_id)?)
    }

    /// Validate and store an upload, then catalog it.
    ///
    /// Rejected uploads never reach the object store; a failed store write
    /// never reaches the catalog.
    pub async fn upload(
        &self,
        subject_id: Uuid,
        upload: FileUpload,
        actor: ActorRef,
    ) -> Result<Attachment, FilesError> {
        if upload.bytes.len() > MAX_ATTACHMENT_BYTES {
            return Err(ValidationError::TooLarge {
                size: upload.bytes.len(),
                max: MAX_ATTACHMENT_BYTES,
            }
            .into());
        }

        let media_type = MediaType::from_mime(&upload.media_type)
            .ok_or_else(|| ValidationError::UnsupportedType(upload.media_type.clone()))?;

        let storage_path = object_path(subject_id, &upload.file_name);

        self.store
            .put(&storage_path, &upload.bytes, media_type.as_mime())
            .await?;

        let attachment = Attachment {
            id: Uuid::new_v4(),
            subject_id,
            file_name: upload.file_name,
            media_type,
            size_bytes: upload.bytes.len() as i64,
            storage_path,
            category: DEFAULT_ATTACHMENT_CATEGORY.to_string(),
            uploaded_at: Utc::now(),
            uploaded_by: actor,
        };

        {
            let db = self.db.lock().await;
            db.insert_attachment(&attachment)?;
        }

        info!(
            attachment_id = %attachment.id,
            subject_id = %subject_id,
            file_name = %attachment.file_name,
            size = attachment.size_bytes,
            role = %actor.role,
            "Attachment uploaded"
        );

        Ok(attachment)
    }

    /// Remove an attachment: store object first, then the metadata row.
    ///
    /// An orphaned metadata row (store removal succeeded, row delete
    /// failed) is recoverable by re-running remove; the reverse order would
    /// leave an unreachable row pointing at nothing.
    pub async fn remove(&self, attachment: &Attachment) -> Result<(), FilesError> {
        let path = normalize_storage_path(&attachment.storage_path);

        self.store.remove(path).await?;

        {
            let db = self.db.lock().await;
            db.delete_attachment(attachment.id)?;
        }

        info!(
            attachment_id = %attachment.id,
            subject_id = %attachment.subject_id,
            "Attachment removed"
        );
        Ok(())
    }

    /// Mint a signed preview URL with the default chat-preview TTL.
    pub async fn preview_url(&self, attachment: &Attachment) -> Result<String, FilesError> {
        self.preview_url_with_ttl(attachment, DEFAULT_PREVIEW_TTL_SECS)
            .await
    }

    /// Mint a signed preview URL valid for `ttl_secs` seconds.
    ///
    /// Every resolution failure maps to the user-facing "not available or
    /// removed" error: the attachment may have been deleted by another
    /// actor, which is a normal condition, not a fault.
    pub async fn preview_url_with_ttl(
        &self,
        attachment: &Attachment,
        ttl_secs: u64,
    ) -> Result<String, FilesError> {
        let path = normalize_storage_path(&attachment.storage_path);

        self.store.signed_url(path, ttl_secs).await.map_err(|e| {
            warn!(
                attachment_id = %attachment.id,
                error = %e,
                "Preview URL request failed"
            );
            FilesError::NotFoundOrExpired
        })
    }
}

/// Compute a fresh, collision-resistant object path for an upload:
/// `{subject}/{millis}-{random}/{file_name}`.
fn object_path(subject_id: Uuid, file_name: &str) -> String {
    let token = format!(
        "{}-{}",
        Utc::now().timestamp_millis(),
        hex::encode(rand::thread_rng().gen::<[u8; 4]>())
    );
    format!("{subject_id}/{token}/{file_name}")
}

/// Normalize a stored path to the relative form the object store expects.
///
/// `storage_path` normally holds a bare relative path, but records written
/// by earlier clients can hold the full public URL; both forms normalize to
/// the same relative path.
pub fn normalize_storage_path(raw: &str) -> &str {
    if let Some(pos) = raw.find(STORAGE_PATH_MARKER) {
        &raw[pos + STORAGE_PATH_MARKER.len()..]
    } else {
        raw.trim_start_matches('/')
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use crate::error::ObjectStoreError;
    use crate::object_store::FsObjectStore;
    use async_trait::async_trait;
    use salus_shared::ActorRole;
    use tempfile::TempDir;

    async fn test_registry() -> (AttachmentRegistry, Arc<FsObjectStore>, TempDir) {
        let dir = TempDir::new().unwrap();
        let db = Database::open_at(&dir.path().join("test.db")).unwrap();
        let store = Arc::new(
            FsObjectStore::new(StoreConfig {
                root: dir.path().join("objects"),
                max_object_bytes: MAX_ATTACHMENT_BYTES,
            })
            .await
            .unwrap(),
        );
        let registry = AttachmentRegistry::new(Arc::new(Mutex::new(db)), store.clone());
        (registry, store, dir)
    }

    fn doctor() -> ActorRef {
        ActorRef::new(ActorRole::Doctor, Uuid::new_v4())
    }

    fn pdf_upload(name: &str, size: usize) -> FileUpload {
        FileUpload {
            file_name: name.to_string(),
            media_type: "application/pdf".to_string(),
            bytes: vec![0x25; size],
        }
    }

    #[tokio::test]
    async fn upload_then_list_and_preview() {
        let (registry, store, _dir) = test_registry().await;
        let subject = Uuid::new_v4();

        let created = registry
            .upload(subject, pdf_upload("exam.pdf", 2 * 1024 * 1024), doctor())
            .await
            .unwrap();

        assert_eq!(created.category, DEFAULT_ATTACHMENT_CATEGORY);
        assert_eq!(created.uploaded_by.role, ActorRole::Doctor);

        let listed = registry.list(subject).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, created.id);

        // A fresh signed URL resolves to the same bytes within the TTL.
        let url = registry.preview_url(&created).await.unwrap();
        let bytes = store.resolve(&url).await.unwrap();
        assert_eq!(bytes.len(), 2 * 1024 * 1024);
    }

    #[tokio::test]
    async fn oversized_upload_rejected_before_any_write() {
        let (registry, store, _dir) = test_registry().await;
        let subject = Uuid::new_v4();

        let err = registry
            .upload(subject, pdf_upload("big.pdf", 15 * 1024 * 1024), doctor())
            .await;
        assert!(matches!(
            err,
            Err(FilesError::Validation(ValidationError::TooLarge { .. }))
        ));

        assert!(registry.list(subject).await.unwrap().is_empty());
        // Nothing landed under the subject's namespace either.
        assert!(!store.base_path().join(subject.to_string()).exists());
    }

    #[tokio::test]
    async fn unsupported_type_rejected() {
        let (registry, _store, _dir) = test_registry().await;
        let subject = Uuid::new_v4();

        let upload = FileUpload {
            file_name: "notes.docx".to_string(),
            media_type:
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
                    .to_string(),
            bytes: vec![0u8; 1024],
        };

        let err = registry.upload(subject, upload, doctor()).await;
        assert!(matches!(
            err,
            Err(FilesError::Validation(ValidationError::UnsupportedType(_)))
        ));
        assert!(registry.list(subject).await.unwrap().is_empty());
    }

    /// Object store whose writes always fail.
    struct FailingStore;

    #[async_trait]
    impl ObjectStore for FailingStore {
        async fn put(&self, _: &str, _: &[u8], _: &str) -> Result<(), ObjectStoreError> {
            Err(ObjectStoreError::Io(std::io::Error::other("disk full")))
        }
        async fn remove(&self, _: &str) -> Result<(), ObjectStoreError> {
            Err(ObjectStoreError::Io(std::io::Error::other("disk full")))
        }
        async fn signed_url(&self, _: &str, _: u64) -> Result<String, ObjectStoreError> {
            Err(ObjectStoreError::Io(std::io::Error::other("disk full")))
        }
        async fn resolve(&self, _: &str) -> Result<Vec<u8>, ObjectStoreError> {
            Err(ObjectStoreError::Io(std::io::Error::other("disk full")))
        }
    }

    #[tokio::test]
    async fn failed_store_write_leaves_no_registry_row() {
        let dir = TempDir::new().unwrap();
        let db = Database::open_at(&dir.path().join("test.db")).unwrap();
        let registry = AttachmentRegistry::new(Arc::new(Mutex::new(db)), Arc::new(FailingStore));
        let subject = Uuid::new_v4();

        let err = registry
            .upload(subject, pdf_upload("exam.pdf", 1024), doctor())
            .await;
        assert!(matches!(err, Err(FilesError::Object(_))));
        assert!(registry.list(subject).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn remove_deletes_object_and_row() {
        let (registry, store, _dir) = test_registry().await;
        let subject = Uuid::new_v4();

        let created = registry
            .upload(subject, pdf_upload("exam.pdf", 1024), doctor())
            .await
            .unwrap();

        registry.remove(&created).await.unwrap();
        assert!(registry.list(subject).await.unwrap().is_empty());
        assert!(matches!(
            store.signed_url(&created.storage_path, 60).await,
            Err(ObjectStoreError::NotFound(_))
        ));

        // Re-running remove is safe: the store removal is idempotent.
        registry.remove(&created).await.unwrap();
    }

    #[tokio::test]
    async fn preview_of_removed_attachment_is_unavailable() {
        let (registry, _store, _dir) = test_registry().await;
        let subject = Uuid::new_v4();

        let created = registry
            .upload(subject, pdf_upload("exam.pdf", 1024), doctor())
            .await
            .unwrap();
        registry.remove(&created).await.unwrap();

        assert!(matches!(
            registry.preview_url(&created).await,
            Err(FilesError::NotFoundOrExpired)
        ));
    }

    #[tokio::test]
    async fn full_url_storage_path_normalizes() {
        let (registry, store, _dir) = test_registry().await;
        let subject = Uuid::new_v4();

        let mut created = registry
            .upload(subject, pdf_upload("exam.pdf", 1024), doctor())
            .await
            .unwrap();

        // Older records hold the full public URL instead of the bare path.
        let relative = created.storage_path.clone();
        created.storage_path =
            format!("https://store.salus.example/v1/object/attachments/{relative}");

        let url = registry.preview_url(&created).await.unwrap();
        assert!(store.resolve(&url).await.is_ok());

        registry.remove(&created).await.unwrap();
        assert!(registry.list(subject).await.unwrap().is_empty());
    }

    #[test]
    fn normalize_handles_both_forms() {
        assert_eq!(normalize_storage_path("p1/t/a.pdf"), "p1/t/a.pdf");
        assert_eq!(normalize_storage_path("/p1/t/a.pdf"), "p1/t/a.pdf");
        assert_eq!(
            normalize_storage_path("https://x.example/object/attachments/p1/t/a.pdf"),
            "p1/t/a.pdf"
        );
    }
}
