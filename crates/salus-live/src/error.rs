use thiserror::Error;

/// Errors produced by the live layer.
///
/// Nothing here is fatal: every variant has a user-visible fallback, and the
/// worst outcome anywhere in this crate is a stale badge count that heals on
/// the next change event.
#[derive(Error, Debug)]
pub enum LiveError {
    /// Backing store failure.  Surfaced as a dismissible message; the retry
    /// is the user re-invoking the action.
    #[error("Store error: {0}")]
    Store(#[from] salus_store::StoreError),

    /// A send with no text and no attachment.
    #[error("Message has no content and no attachment")]
    EmptyMessage,
}
