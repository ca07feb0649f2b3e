use thiserror::Error;

/// Errors from the object-store adapter.
#[derive(Error, Debug)]
pub enum ObjectStoreError {
    /// Writing to an occupied path.  Uploads always target a fresh
    /// timestamp-qualified path, so hitting this means a caller bug.
    #[error("Object already exists at '{0}'")]
    AlreadyExists(String),

    /// No object behind the given path.
    #[error("Object not found: {0}")]
    NotFound(String),

    /// The signed URL is unknown or its TTL has elapsed.
    #[error("Signed URL expired or unknown")]
    Expired,

    /// Object exceeds the adapter's hard size cap.
    #[error("Object too large: {size} bytes (max {max})")]
    TooLarge { size: usize, max: usize },

    /// Path escapes the store namespace.
    #[error("Invalid object path: {0}")]
    InvalidPath(String),

    /// Malformed signed URL.
    #[error("Invalid signed URL: {0}")]
    InvalidUrl(String),

    /// Underlying I/O failure.
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Caller-fixable upload rejections.  Surfaced inline in the UI; retrying
/// without changing the file will fail again.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("File too large: {size} bytes (max {max})")]
    TooLarge { size: usize, max: usize },

    #[error("Unsupported file type: {0}")]
    UnsupportedType(String),
}

/// Errors from the attachment registry.
#[derive(Error, Debug)]
pub enum FilesError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Object store error: {0}")]
    Object(#[from] ObjectStoreError),

    #[error("Store error: {0}")]
    Store(#[from] salus_store::StoreError),

    /// Preview resolution failed.  The attachment may legitimately have
    /// been deleted by another actor; callers show this string and move on.
    #[error("Attachment not available or removed")]
    NotFoundOrExpired,
}
