//! Byte-stream artifact uploader
//!
//! Publishes local build artifacts to the remote cache and reports a
//! `bytestream://` URI for each one. The factory hands out exactly one
//! uploader per command, retaining the cache handle for it.

use crate::{CacheError, CacheResult, ContentHash, RemoteCache};
use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};
use tracing::{debug, info_span, warn, Instrument};

/// Artifact produced locally that should be published
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalArtifact {
    /// Path or name the artifact is reported under
    pub name: String,
    /// File contents
    pub content: Vec<u8>,
}

impl LocalArtifact {
    /// Create an artifact
    pub fn new(name: &str, content: Vec<u8>) -> Self {
        Self {
            name: name.to_string(),
            content,
        }
    }
}

/// Uploads artifacts to a remote cache and names them by byte-stream URI
#[derive(Debug)]
pub struct ByteStreamUploader {
    cache: RemoteCache,
    remote_server: String,
    instance_name: String,
    build_request_id: String,
    command_id: String,
    verbose_failures: bool,
}

impl ByteStreamUploader {
    /// Build request this uploader reports for
    pub fn build_request_id(&self) -> &str {
        &self.build_request_id
    }

    /// Command this uploader reports for
    pub fn command_id(&self) -> &str {
        &self.command_id
    }

    /// URI of a blob on the remote server
    pub fn uri(&self, hash: &ContentHash, size: usize) -> String {
        if self.instance_name.is_empty() {
            format!("bytestream://{}/blobs/{}/{}", self.remote_server, hash, size)
        } else {
            format!(
                "bytestream://{}/{}/blobs/{}/{}",
                self.remote_server, self.instance_name, hash, size
            )
        }
    }

    /// Upload artifacts that the cache does not have yet.
    ///
    /// Returns the URI of every artifact keyed by artifact name.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::Store` if the store rejects a blob.
    pub async fn upload(&self, artifacts: &[LocalArtifact]) -> CacheResult<BTreeMap<String, String>> {
        let span = info_span!(
            "bytestream_upload",
            build_request_id = %self.build_request_id,
            command_id = %self.command_id,
        );
        self.upload_all(artifacts).instrument(span).await
    }

    async fn upload_all(&self, artifacts: &[LocalArtifact]) -> CacheResult<BTreeMap<String, String>> {
        let store = self.cache.store();
        let mut uris = BTreeMap::new();

        for artifact in artifacts {
            let hash = ContentHash::from_content(&artifact.content);
            if store.has_blob(&hash).await? {
                debug!("{} already in cache as {}", artifact.name, hash);
            } else {
                let stored = store.put_blob(&artifact.content).await.map_err(|e| {
                    if self.verbose_failures {
                        warn!("Uploading {} failed: {}", artifact.name, e);
                        CacheError::Store(format!("{}: {e}", artifact.name))
                    } else {
                        e
                    }
                })?;
                if stored != hash {
                    return Err(CacheError::Store(format!(
                        "store returned {stored} for content hashed as {hash}"
                    )));
                }
                debug!("Uploaded {} ({} bytes)", artifact.name, artifact.content.len());
            }
            let _ = uris.insert(artifact.name.clone(), self.uri(&hash, artifact.content.len()));
        }

        Ok(uris)
    }
}

/// Builds the single [`ByteStreamUploader`] of a command
#[derive(Debug)]
pub struct ByteStreamUploaderFactory {
    cache: RemoteCache,
    remote_server: String,
    instance_name: String,
    build_request_id: String,
    command_id: String,
    verbose_failures: bool,
    uploader: OnceLock<Arc<ByteStreamUploader>>,
}

impl ByteStreamUploaderFactory {
    /// Factory bound to a cache, server authority and instance name
    pub fn new(cache: RemoteCache, remote_server: &str, instance_name: &str) -> Self {
        Self {
            cache,
            remote_server: remote_server.to_string(),
            instance_name: instance_name.to_string(),
            build_request_id: String::new(),
            command_id: String::new(),
            verbose_failures: false,
            uploader: OnceLock::new(),
        }
    }

    /// Request identifiers reported with uploads
    #[must_use]
    pub fn with_request_ids(mut self, build_request_id: &str, command_id: &str) -> Self {
        self.build_request_id = build_request_id.to_string();
        self.command_id = command_id.to_string();
        self
    }

    /// Name the failing artifact in upload errors
    #[must_use]
    pub fn with_verbose_failures(mut self, verbose_failures: bool) -> Self {
        self.verbose_failures = verbose_failures;
        self
    }

    /// Build the uploader, retaining the cache for it.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::AlreadyCreated` on every call after the first.
    pub fn create(&self) -> CacheResult<Arc<ByteStreamUploader>> {
        let mut created = false;
        let uploader = self.uploader.get_or_init(|| {
            created = true;
            Arc::new(ByteStreamUploader {
                cache: self.cache.retain(),
                remote_server: self.remote_server.clone(),
                instance_name: self.instance_name.clone(),
                build_request_id: self.build_request_id.clone(),
                command_id: self.command_id.clone(),
                verbose_failures: self.verbose_failures,
            })
        });

        if created {
            Ok(Arc::clone(uploader))
        } else {
            Err(CacheError::AlreadyCreated)
        }
    }

    /// The uploader, if it was created
    pub fn get(&self) -> Option<Arc<ByteStreamUploader>> {
        self.uploader.get().cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BlobStore, InMemoryBlobStore};
    use async_trait::async_trait;
    use tracing_test::traced_test;

    struct Rejecting;

    #[async_trait]
    impl BlobStore for Rejecting {
        async fn put_blob(&self, _content: &[u8]) -> CacheResult<ContentHash> {
            Err(CacheError::Store("quota exceeded".to_string()))
        }

        async fn get_blob(&self, hash: &ContentHash) -> CacheResult<Vec<u8>> {
            Err(CacheError::NotFound(hash.to_string()))
        }

        async fn has_blob(&self, _hash: &ContentHash) -> CacheResult<bool> {
            Ok(false)
        }
    }

    #[test]
    fn test_create_only_once() {
        let cache = RemoteCache::new(InMemoryBlobStore::new());
        let factory = ByteStreamUploaderFactory::new(cache.retain(), "cache:443", "");
        assert!(factory.get().is_none());

        let uploader = factory.create().unwrap();
        assert!(matches!(factory.create(), Err(CacheError::AlreadyCreated)));
        assert!(Arc::ptr_eq(&uploader, &factory.get().unwrap()));
    }

    #[test]
    fn test_uploader_retains_cache() {
        let cache = RemoteCache::new(InMemoryBlobStore::new());
        let factory = ByteStreamUploaderFactory::new(cache.retain(), "cache:443", "main");
        assert_eq!(cache.ref_count(), 2);

        let uploader = factory.create().unwrap();
        assert_eq!(cache.ref_count(), 3);

        drop(factory);
        drop(uploader);
        assert_eq!(cache.ref_count(), 1);
    }

    #[test]
    fn test_uri_layout() {
        let factory = ByteStreamUploaderFactory::new(RemoteCache::new(InMemoryBlobStore::new()), "cache:443", "");
        let uploader = factory.create().unwrap();
        let hash = ContentHash::from_content(b"x");
        assert_eq!(uploader.uri(&hash, 1), format!("bytestream://cache:443/blobs/{hash}/1"));
    }

    #[tokio::test]
    #[traced_test]
    async fn test_upload_skips_present_blobs() {
        let cache = RemoteCache::new(InMemoryBlobStore::new());
        let _ = cache.store().put_blob(b"already").await.unwrap();

        let factory = ByteStreamUploaderFactory::new(cache.retain(), "cache:443", "main")
            .with_request_ids("req-1", "cmd-1");
        let uploader = factory.create().unwrap();
        assert_eq!(uploader.build_request_id(), "req-1");
        assert_eq!(uploader.command_id(), "cmd-1");

        let uris = uploader
            .upload(&[
                LocalArtifact::new("a.txt", b"already".to_vec()),
                LocalArtifact::new("b.txt", b"fresh".to_vec()),
            ])
            .await
            .unwrap();

        assert_eq!(uris.len(), 2);
        assert!(uris["b.txt"].ends_with("/5"));
        assert!(logs_contain("a.txt already in cache"));
        assert!(logs_contain("Uploaded b.txt (5 bytes)"));
        assert!(
            cache
                .store()
                .has_blob(&ContentHash::from_content(b"fresh"))
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_verbose_failures_name_artifact() {
        let factory = ByteStreamUploaderFactory::new(RemoteCache::new(Rejecting), "cache:443", "main")
            .with_verbose_failures(true);
        let uploader = factory.create().unwrap();

        let err = uploader
            .upload(&[LocalArtifact::new("out.log", b"log".to_vec())])
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Store error: out.log: Store error: quota exceeded");
    }
}
