//! Object storage abstraction (S3, GCS)

use async_trait::async_trait;
use bytes::Bytes;

use crate::domain::DomainError;

/// Listing entry for one stored object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectInfo {
    pub key: String,
    /// Checksum used to detect content changes (ETag, MD5)
    pub content_hash: String,
    pub size: u64,
}

impl ObjectInfo {
    pub fn new(key: impl Into<String>, content_hash: impl Into<String>, size: u64) -> Self {
        Self {
            key: key.into(),
            content_hash: content_hash.into(),
            size,
        }
    }
}

/// Read access to a bucket
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// List all objects whose key starts with `prefix`, across all pages
    async fn list(&self, prefix: &str) -> Result<Vec<ObjectInfo>, DomainError>;

    /// Download an object body
    async fn get(&self, key: &str) -> Result<Bytes, DomainError>;

    /// Bucket name for logging
    fn bucket(&self) -> &str;
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// In-memory bucket that counts downloads
    #[derive(Debug, Default)]
    pub struct FakeObjectStore {
        objects: Mutex<BTreeMap<String, (String, Bytes)>>,
        gets: AtomicUsize,
        fail_list: Mutex<bool>,
    }

    impl FakeObjectStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn put(&self, key: &str, content_hash: &str, body: impl Into<Bytes>) {
            self.objects
                .lock()
                .unwrap()
                .insert(key.to_string(), (content_hash.to_string(), body.into()));
        }

        pub fn fail_listing(&self, fail: bool) {
            *self.fail_list.lock().unwrap() = fail;
        }

        pub fn get_count(&self) -> usize {
            self.gets.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ObjectStore for FakeObjectStore {
        async fn list(&self, prefix: &str) -> Result<Vec<ObjectInfo>, DomainError> {
            if *self.fail_list.lock().unwrap() {
                return Err(DomainError::object_store("listing failed"));
            }
            Ok(self
                .objects
                .lock()
                .unwrap()
                .iter()
                .filter(|(key, _)| key.starts_with(prefix))
                .map(|(key, (hash, body))| ObjectInfo::new(key.clone(), hash.clone(), body.len() as u64))
                .collect())
        }

        async fn get(&self, key: &str) -> Result<Bytes, DomainError> {
            self.gets.fetch_add(1, Ordering::SeqCst);
            self.objects
                .lock()
                .unwrap()
                .get(key)
                .map(|(_, body)| body.clone())
                .ok_or_else(|| DomainError::object_store(format!("no such key: {}", key)))
        }

        fn bucket(&self) -> &str {
            "test-bucket"
        }
    }
}
