//! # salus-files
//!
//! Attachment pipeline for the Salus messaging core.
//!
//! Two layers:
//!
//! - [`object_store`] -- the store adapter: raw bytes keyed by opaque
//!   relative paths, plus short-lived signed URLs for read access.
//! - [`registry`] -- the per-patient attachment catalog: validation rules,
//!   upload/remove lifecycle, and preview-URL minting.
//!
//! The registry enforces the commit order "store write, then metadata row":
//! an orphaned store object is recoverable, a metadata row with no backing
//! object is not.

pub mod config;
pub mod object_store;
pub mod registry;

mod error;

pub use config::StoreConfig;
pub use error::{FilesError, ObjectStoreError, ValidationError};
pub use object_store::{FsObjectStore, ObjectStore};
pub use registry::{normalize_storage_path, AttachmentRegistry, FileUpload};
