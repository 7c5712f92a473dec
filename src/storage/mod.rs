//! Object Storage Module
//!
//! The object store is an external capability. Everything above this
//! module talks to it through [`ObjectStore`], which keeps the S3 client
//! swappable for the in-process [`MemoryStore`] in tests.

mod memory;
mod rewrite;
mod s3_store;

use std::time::Duration;
use async_trait::async_trait;

use crate::error::Result;

pub use memory::MemoryStore;
pub use rewrite::UrlRewriter;
pub use s3_store::S3Store;

/// One entry of a listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectEntry {
    /// Common prefix, key ends with the delimiter
    Folder { key: String },
    /// Stored object
    Object {
        key: String,
        size: u64,
        last_modified: String,
    },
}

impl ObjectEntry {
    pub fn key(&self) -> &str {
        match self {
            ObjectEntry::Folder { key } | ObjectEntry::Object { key, .. } => key,
        }
    }
}

/// HTTP method a presigned URL is valid for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Put,
}

/// URL handed out by the store.
///
/// `internal` is set when the URL points at the cluster-local endpoint and
/// has to be rewritten before it crosses to a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreUrl {
    pub url: String,
    pub internal: bool,
}

/// Object store capability
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// List keys under `prefix`; with a delimiter, deeper keys collapse into folders
    async fn list(&self, prefix: &str, delimiter: Option<&str>) -> Result<Vec<ObjectEntry>>;

    /// Time-limited signed URL for one object
    async fn presign(&self, key: &str, method: Method, ttl: Duration) -> Result<StoreUrl>;

    /// Unsigned URL addressing one object directly
    fn object_url(&self, key: &str) -> StoreUrl;

    /// Delete many keys in one call. Missing keys are not an error.
    async fn delete(&self, keys: &[String]) -> Result<()>;

    /// Create a zero-length object
    async fn put_empty(&self, key: &str) -> Result<()>;

    /// Create the bucket if it does not exist yet
    async fn ensure_bucket(&self) -> Result<()>;
}

/// Percent-encode a key for use as a URL path, keeping `/` separators
pub(crate) fn encode_key(key: &str) -> String {
    key.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}
