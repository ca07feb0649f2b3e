/// Maximum attachment size in bytes (10 MiB).
pub const MAX_ATTACHMENT_BYTES: usize = 10 * 1024 * 1024;

/// MIME types accepted for attachment uploads.
pub const ALLOWED_MEDIA_TYPES: [&str; 3] = ["image/jpeg", "image/png", "application/pdf"];

/// Default time-to-live for signed preview URLs, in seconds.
///
/// Chat-embedded previews request a fresh URL each time; 60 seconds is long
/// enough to load the file and short enough that a leaked URL goes stale
/// quickly.
pub const DEFAULT_PREVIEW_TTL_SECS: u64 = 60;

/// Path segment that marks the start of the relative storage path inside a
/// full public URL handed back by older records.
///
/// A `storage_path` column normally holds a bare relative path, but records
/// written by earlier clients can hold the full store URL; everything after
/// this marker is the relative path.
pub const STORAGE_PATH_MARKER: &str = "/attachments/";

/// Category assigned to uploads that do not specify one.
pub const DEFAULT_ATTACHMENT_CATEGORY: &str = "general";

/// Notification kind carried by chat notifications.  The set of kinds is
/// open; this one is special-cased because acknowledging it navigates into
/// the related conversation.
pub const NOTIFICATION_KIND_CHAT: &str = "chat";
