//! Object-store configuration loaded from environment variables.
//!
//! All settings have defaults so the store can run with zero configuration
//! in local development and tests.

use std::path::PathBuf;

use salus_shared::constants::MAX_ATTACHMENT_BYTES;

/// Filesystem object-store configuration.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Base directory for stored objects.
    /// Env: `SALUS_STORE_ROOT`
    /// Default: `./attachments`
    pub root: PathBuf,

    /// Hard cap on a single object, in bytes.  The registry rejects
    /// oversized uploads before they get here; the adapter enforces the cap
    /// again for callers that bypass the registry.
    /// Env: `SALUS_STORE_MAX_OBJECT_BYTES`
    /// Default: 10 MiB
    pub max_object_bytes: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("./attachments"),
            max_object_bytes: MAX_ATTACHMENT_BYTES,
        }
    }
}

impl StoreConfig {
    /// Load configuration from environment variables, falling back to
    /// defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(root) = std::env::var("SALUS_STORE_ROOT") {
            config.root = PathBuf::from(root);
        }

        if let Ok(val) = std::env::var("SALUS_STORE_MAX_OBJECT_BYTES") {
            match val.parse::<usize>() {
                Ok(n) => config.max_object_bytes = n,
                Err(_) => {
                    tracing::warn!(value = %val, "Invalid SALUS_STORE_MAX_OBJECT_BYTES, using default");
                }
            }
        }

        config
    }
}
