//! Object store adapter: opaque paths in, bytes and signed URLs out.
//!
//! The adapter is pure I/O; there is no caching layer.  A client that wants
//! a live preview requests a fresh signed URL every time.  Expiry is
//! enforced here, not by the client: resolving a URL after its TTL fails no
//! matter who holds it.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use tokio::fs;
use tracing::{debug, info};

use crate::config::StoreConfig;
use crate::error::ObjectStoreError;

/// URL scheme prefix for signed URLs minted by [`FsObjectStore`].
const SIGNED_URL_PREFIX: &str = "salus+store://signed/";

/// Contract every object-store backend satisfies.
///
/// All three write-side operations are plain I/O against the store; callers
/// branch on the returned errors and never retry silently — on a failed
/// `signed_url` the attachment may legitimately have been deleted by
/// another actor.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store bytes at `path`.  Fails with [`ObjectStoreError::AlreadyExists`]
    /// if the path is occupied; there is no silent overwrite.
    async fn put(&self, path: &str, bytes: &[u8], content_type: &str)
        -> Result<(), ObjectStoreError>;

    /// Remove the object at `path`.  Idempotent: removing a non-existent
    /// object is not an error.
    async fn remove(&self, path: &str) -> Result<(), ObjectStoreError>;

    /// Mint a URL granting read access to `path` for exactly `ttl_secs`
    /// seconds.  The TTL of an issued URL is never extended.
    async fn signed_url(&self, path: &str, ttl_secs: u64) -> Result<String, ObjectStoreError>;

    /// Read the bytes behind a signed URL.  Unknown or expired URLs fail
    /// with [`ObjectStoreError::Expired`].
    async fn resolve(&self, url: &str) -> Result<Vec<u8>, ObjectStoreError>;
}

/// An outstanding signed-URL grant.
#[derive(Debug, Clone)]
struct SignedGrant {
    path: String,
    expires_at: DateTime<Utc>,
}

/// Filesystem-backed object store.
///
/// Objects live under a base directory at their relative path; signed URLs
/// are random capability tokens kept in an in-memory grant table.
pub struct FsObjectStore {
    base_path: PathBuf,
    max_size: usize,
    grants: Mutex<HashMap<String, SignedGrant>>,
}

impl FsObjectStore {
    pub async fn new(config: StoreConfig) -> Result<Self, ObjectStoreError> {
        fs::create_dir_all(&config.root).await?;

        info!(path = %config.root.display(), "Object store initialized");

        Ok(Self {
            base_path: config.root,
            max_size: config.max_object_bytes,
            grants: Mutex::new(HashMap::new()),
        })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Resolve a relative object path under the base directory, rejecting
    /// anything that would escape it.
    fn safe_object_path(&self, path: &str) -> Result<PathBuf, ObjectStoreError> {
        if path.is_empty() || path.starts_with('/') || path.contains('\\') {
            return Err(ObjectStoreError::InvalidPath(path.to_string()));
        }

        let mut resolved = self.base_path.clone();
        for component in Path::new(path).components() {
            match component {
                Component::Normal(c) => resolved.push(c),
                _ => return Err(ObjectStoreError::InvalidPath(path.to_string())),
            }
        }
        Ok(resolved)
    }

    /// Drop grants whose TTL has elapsed.  Called opportunistically while
    /// the table lock is held.
    fn prune_expired(grants: &mut HashMap<String, SignedGrant>, now: DateTime<Utc>) {
        grants.retain(|_, grant| grant.expires_at > now);
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn put(
        &self,
        path: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<(), ObjectStoreError> {
        if bytes.len() > self.max_size {
            return Err(ObjectStoreError::TooLarge {
                size: bytes.len(),
                max: self.max_size,
            });
        }

        let full = self.safe_object_path(path)?;
        if full.exists() {
            return Err(ObjectStoreError::AlreadyExists(path.to_string()));
        }

        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&full, bytes).await?;

        debug!(path, size = bytes.len(), content_type, "Stored object");
        Ok(())
    }

    async fn remove(&self, path: &str) -> Result<(), ObjectStoreError> {
        let full = self.safe_object_path(path)?;

        match fs::remove_file(&full).await {
            Ok(()) => {
                debug!(path, "Removed object");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ObjectStoreError::Io(e)),
        }
    }

    async fn signed_url(&self, path: &str, ttl_secs: u64) -> Result<String, ObjectStoreError> {
        let full = self.safe_object_path(path)?;
        if !full.exists() {
            return Err(ObjectStoreError::NotFound(path.to_string()));
        }

        let token = hex::encode(rand::thread_rng().gen::<[u8; 16]>());
        let now = Utc::now();
        let expires_at = now + Duration::seconds(ttl_secs as i64);

        {
            let mut grants = self.grants.lock().expect("grant table lock poisoned");
            Self::prune_expired(&mut grants, now);
            grants.insert(
                token.clone(),
                SignedGrant {
                    path: path.to_string(),
                    expires_at,
                },
            );
        }

        debug!(path, ttl_secs, "Issued signed URL");
        Ok(format!("{SIGNED_URL_PREFIX}{token}"))
    }

    async fn resolve(&self, url: &str) -> Result<Vec<u8>, ObjectStoreError> {
        let token = url
            .strip_prefix(SIGNED_URL_PREFIX)
            .ok_or_else(|| ObjectStoreError::InvalidUrl(url.to_string()))?;

        let now = Utc::now();
        let grant = {
            let mut grants = self.grants.lock().expect("grant table lock poisoned");
            match grants.get(token) {
                Some(grant) if grant.expires_at > now => grant.clone(),
                Some(_) => {
                    grants.remove(token);
                    return Err(ObjectStoreError::Expired);
                }
                None => return Err(ObjectStoreError::Expired),
            }
        };

        let full = self.safe_object_path(&grant.path)?;
        match fs::read(&full).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(ObjectStoreError::NotFound(grant.path))
            }
            Err(e) => Err(ObjectStoreError::Io(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration as StdDuration;
    use tempfile::TempDir;

    async fn test_store() -> (FsObjectStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = FsObjectStore::new(StoreConfig {
            root: dir.path().to_path_buf(),
            max_object_bytes: 1024 * 1024,
        })
        .await
        .unwrap();
        (store, dir)
    }

    #[tokio::test]
    async fn put_sign_resolve_round_trip() {
        let (store, _dir) = test_store().await;
        let data = b"pdf-bytes";

        store
            .put("p1/1700000000000-aa/exam.pdf", data, "application/pdf")
            .await
            .unwrap();

        let url = store
            .signed_url("p1/1700000000000-aa/exam.pdf", 60)
            .await
            .unwrap();
        let resolved = store.resolve(&url).await.unwrap();
        assert_eq!(resolved, data);
    }

    #[tokio::test]
    async fn no_silent_overwrite() {
        let (store, _dir) = test_store().await;

        store.put("p1/t/a.png", b"one", "image/png").await.unwrap();
        let err = store.put("p1/t/a.png", b"two", "image/png").await;
        assert!(matches!(err, Err(ObjectStoreError::AlreadyExists(_))));
    }

    #[tokio::test]
    async fn remove_is_idempotent() {
        let (store, _dir) = test_store().await;

        store.put("p1/t/a.png", b"bytes", "image/png").await.unwrap();
        store.remove("p1/t/a.png").await.unwrap();
        store.remove("p1/t/a.png").await.unwrap();

        assert!(matches!(
            store.signed_url("p1/t/a.png", 60).await,
            Err(ObjectStoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn signed_url_expires() {
        let (store, _dir) = test_store().await;
        store.put("p1/t/a.png", b"bytes", "image/png").await.unwrap();

        let short = store.signed_url("p1/t/a.png", 1).await.unwrap();
        let long = store.signed_url("p1/t/a.png", 60).await.unwrap();

        tokio::time::sleep(StdDuration::from_secs(2)).await;

        assert!(matches!(
            store.resolve(&short).await,
            Err(ObjectStoreError::Expired)
        ));
        // A later mint never touches an earlier grant's TTL.
        assert!(store.resolve(&long).await.is_ok());
    }

    #[tokio::test]
    async fn resolve_after_concurrent_delete() {
        let (store, _dir) = test_store().await;
        store.put("p1/t/a.png", b"bytes", "image/png").await.unwrap();

        let url = store.signed_url("p1/t/a.png", 60).await.unwrap();
        store.remove("p1/t/a.png").await.unwrap();

        assert!(matches!(
            store.resolve(&url).await,
            Err(ObjectStoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn path_traversal_rejected() {
        let (store, _dir) = test_store().await;

        for bad in ["../escape", "/abs/path", "p1/../../etc/passwd", ""] {
            assert!(matches!(
                store.put(bad, b"x", "image/png").await,
                Err(ObjectStoreError::InvalidPath(_))
            ));
        }
    }

    #[tokio::test]
    async fn oversized_object_rejected() {
        let (store, _dir) = test_store().await;
        let big = vec![0u8; 2 * 1024 * 1024];

        assert!(matches!(
            store.put("p1/t/big.bin", &big, "image/png").await,
            Err(ObjectStoreError::TooLarge { .. })
        ));
    }
}
