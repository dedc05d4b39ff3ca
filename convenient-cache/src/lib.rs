//! Content-addressed remote cache handle for build event artifacts
//!
//! This crate provides the pieces needed to publish build artifacts to a
//! content-addressable store and refer to them by `bytestream://` URIs.
//!
//! # Features
//!
//! - SHA256-based content hashing
//! - Pluggable async blob storage ([`BlobStore`])
//! - Reference-counted cache handles ([`RemoteCache`])
//! - One-shot construction of a byte-stream artifact uploader
//!
//! # Example
//!
//! ```
//! use convenient_cache::{ByteStreamUploaderFactory, InMemoryBlobStore, LocalArtifact, RemoteCache};
//!
//! # tokio_test::block_on(async {
//! let cache = RemoteCache::new(InMemoryBlobStore::new());
//! let factory = ByteStreamUploaderFactory::new(cache, "cache.example.com", "main")
//!     .with_request_ids("build-1", "command-1");
//!
//! let uploader = factory.create()?;
//! let uris = uploader
//!     .upload(&[LocalArtifact::new("bazel-out/app.log", b"built".to_vec())])
//!     .await?;
//! assert!(uris["bazel-out/app.log"].starts_with("bytestream://cache.example.com/main/blobs/"));
//!
//! // the factory only ever builds one uploader
//! assert!(factory.create().is_err());
//! # Ok::<(), convenient_cache::CacheError>(())
//! # }).unwrap();
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![warn(unused_results)]

pub mod uploader;

pub use uploader::{ByteStreamUploader, ByteStreamUploaderFactory, LocalArtifact};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Error types for cache operations
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Content not found in cache
    #[error("Content not found: {0}")]
    NotFound(String),

    /// Invalid hash format
    #[error("Invalid hash: {0}")]
    InvalidHash(String),

    /// The factory already built its uploader
    #[error("Uploader already created")]
    AlreadyCreated,

    /// Backing store failure
    #[error("Store error: {0}")]
    Store(String),
}

/// Result type for cache operations
pub type CacheResult<T> = Result<T, CacheError>;

/// Content hash (SHA256)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContentHash(String);

impl ContentHash {
    /// Create a new content hash from a string
    ///
    /// # Errors
    ///
    /// Returns `CacheError::InvalidHash` if the hash is not a valid SHA256 hex string
    pub fn new(hash: String) -> CacheResult<Self> {
        if hash.len() != 64 || !hash.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(CacheError::InvalidHash(hash));
        }
        Ok(Self(hash.to_ascii_lowercase()))
    }

    /// Calculate SHA256 hash of content
    #[must_use]
    pub fn from_content(content: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(content);
        Self(hex::encode(hasher.finalize()))
    }

    /// Get the hash as a string
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Content-addressable blob storage
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store a blob and return its hash
    async fn put_blob(&self, content: &[u8]) -> CacheResult<ContentHash>;

    /// Retrieve a blob by hash
    ///
    /// # Errors
    ///
    /// Returns `CacheError::NotFound` if the blob doesn't exist
    async fn get_blob(&self, hash: &ContentHash) -> CacheResult<Vec<u8>>;

    /// Check if a blob exists
    async fn has_blob(&self, hash: &ContentHash) -> CacheResult<bool>;
}

/// Blob store kept in process memory
#[derive(Debug, Default)]
pub struct InMemoryBlobStore {
    blobs: RwLock<HashMap<ContentHash, Vec<u8>>>,
}

impl InMemoryBlobStore {
    /// Empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored blobs
    pub async fn len(&self) -> usize {
        self.blobs.read().await.len()
    }

    /// Whether the store holds no blobs
    pub async fn is_empty(&self) -> bool {
        self.blobs.read().await.is_empty()
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn put_blob(&self, content: &[u8]) -> CacheResult<ContentHash> {
        let hash = ContentHash::from_content(content);
        let _ = self
            .blobs
            .write()
            .await
            .entry(hash.clone())
            .or_insert_with(|| content.to_vec());
        Ok(hash)
    }

    async fn get_blob(&self, hash: &ContentHash) -> CacheResult<Vec<u8>> {
        self.blobs
            .read()
            .await
            .get(hash)
            .cloned()
            .ok_or_else(|| CacheError::NotFound(hash.to_string()))
    }

    async fn has_blob(&self, hash: &ContentHash) -> CacheResult<bool> {
        Ok(self.blobs.read().await.contains_key(hash))
    }
}

/// Shared, reference-counted handle to a remote cache
#[derive(Clone)]
pub struct RemoteCache {
    store: Arc<dyn BlobStore>,
}

impl fmt::Debug for RemoteCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteCache")
            .field("references", &self.ref_count())
            .finish()
    }
}

impl RemoteCache {
    /// Wrap a blob store
    pub fn new(store: impl BlobStore + 'static) -> Self {
        Self {
            store: Arc::new(store),
        }
    }

    /// Take another reference to the same cache
    #[must_use]
    pub fn retain(&self) -> Self {
        self.clone()
    }

    /// Number of live handles to this cache
    #[must_use]
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.store)
    }

    /// Underlying blob store
    #[must_use]
    pub fn store(&self) -> &dyn BlobStore {
        self.store.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_hash_from_content() {
        let hash = ContentHash::from_content(b"Hello, World!");
        assert_eq!(
            hash.as_str(),
            "dffd6021bb2bd5b0af676290809ec3a53191dd81c7f70a4b28688a362182986f"
        );
    }

    #[test]
    fn test_content_hash_validation() {
        assert!(ContentHash::new("a".repeat(64)).is_ok());
        assert!(ContentHash::new("a".repeat(63)).is_err());
        assert!(ContentHash::new("z".repeat(64)).is_err());
        assert_eq!(ContentHash::new("A".repeat(64)).unwrap().as_str(), "a".repeat(64));
    }

    #[tokio::test]
    async fn test_in_memory_store_round_trip() {
        let store = InMemoryBlobStore::new();
        let hash = store.put_blob(b"payload").await.unwrap();
        assert!(store.has_blob(&hash).await.unwrap());
        assert_eq!(store.get_blob(&hash).await.unwrap(), b"payload".to_vec());
        assert_eq!(store.len().await, 1);

        let missing = ContentHash::from_content(b"other");
        assert!(matches!(store.get_blob(&missing).await, Err(CacheError::NotFound(_))));
    }

    #[test]
    fn test_retain_counts_references() {
        let cache = RemoteCache::new(InMemoryBlobStore::new());
        assert_eq!(cache.ref_count(), 1);
        let retained = cache.retain();
        assert_eq!(cache.ref_count(), 2);
        drop(retained);
        assert_eq!(cache.ref_count(), 1);
    }
}
