//! In-process object store
//!
//! Keeps objects in a sorted map and mints fake presigned URLs against a
//! configurable endpoint. Used by tests and for running the API without a
//! storage backend.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::{encode_key, Method, ObjectEntry, ObjectStore, StoreUrl};
use crate::error::{Error, Result};

#[derive(Debug, Clone)]
struct StoredObject {
    size: u64,
    last_modified: String,
}

/// Object store held in memory
pub struct MemoryStore {
    endpoint: String,
    bucket: String,
    objects: RwLock<BTreeMap<String, StoredObject>>,
    delete_calls: AtomicUsize,
    unavailable: AtomicBool,
}

impl MemoryStore {
    /// Empty store answering for `endpoint`/`bucket`
    pub fn new(endpoint: &str, bucket: &str) -> Self {
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            bucket: bucket.to_string(),
            objects: RwLock::new(BTreeMap::new()),
            delete_calls: AtomicUsize::new(0),
            unavailable: AtomicBool::new(false),
        }
    }

    /// Store an object of `size` bytes
    pub async fn insert(&self, key: &str, size: u64) {
        self.objects.write().await.insert(
            key.to_string(),
            StoredObject {
                size,
                last_modified: Utc::now().to_rfc3339(),
            },
        );
    }

    /// All stored keys in order
    pub async fn keys(&self) -> Vec<String> {
        self.objects.read().await.keys().cloned().collect()
    }

    /// Number of `delete` calls received
    pub fn delete_calls(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }

    /// Make every call fail as if the backend were unreachable
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(Error::Upstream(format!("{} unreachable", self.endpoint)));
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn list(&self, prefix: &str, delimiter: Option<&str>) -> Result<Vec<ObjectEntry>> {
        self.check_available()?;
        let objects = self.objects.read().await;

        let mut folders = BTreeSet::new();
        let mut entries = Vec::new();
        for (key, object) in objects.range(prefix.to_string()..) {
            let rest = match key.strip_prefix(prefix) {
                Some(r) => r,
                None => break,
            };
            match delimiter.and_then(|d| rest.find(d).map(|i| i + d.len())) {
                Some(end) => {
                    folders.insert(format!("{}{}", prefix, &rest[..end]));
                }
                None => entries.push(ObjectEntry::Object {
                    key: key.clone(),
                    size: object.size,
                    last_modified: object.last_modified.clone(),
                }),
            }
        }

        entries.extend(folders.into_iter().map(|key| ObjectEntry::Folder { key }));
        Ok(entries)
    }

    async fn presign(&self, key: &str, method: Method, ttl: Duration) -> Result<StoreUrl> {
        self.check_available()?;
        let method = match method {
            Method::Get => "GET",
            Method::Put => "PUT",
        };
        Ok(StoreUrl {
            url: format!(
                "{}/{}/{}?X-Amz-Expires={}&X-Amz-Method={}&X-Amz-Signature=memory",
                self.endpoint,
                self.bucket,
                encode_key(key),
                ttl.as_secs(),
                method
            ),
            internal: true,
        })
    }

    fn object_url(&self, key: &str) -> StoreUrl {
        StoreUrl {
            url: format!("{}/{}/{}", self.endpoint, self.bucket, encode_key(key)),
            internal: true,
        }
    }

    async fn delete(&self, keys: &[String]) -> Result<()> {
        self.check_available()?;
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        let mut objects = self.objects.write().await;
        for key in keys {
            objects.remove(key);
        }
        Ok(())
    }

    async fn put_empty(&self, key: &str) -> Result<()> {
        self.check_available()?;
        self.insert(key, 0).await;
        Ok(())
    }

    async fn ensure_bucket(&self) -> Result<()> {
        self.check_available()
    }
}
