//! Drive Service
//!
//! The file operations behind the HTTP API. Every call resolves the
//! client's logical path into its tier's key space before touching the
//! object store, and every URL handed back goes through the rewriter.

use std::sync::Arc;
use std::time::Duration;
use serde::{Deserialize, Serialize};

use crate::config::StorageConfig;
use crate::error::{Error, Result};
use crate::namespace;
use crate::storage::{Method, ObjectEntry, ObjectStore, UrlRewriter};

/// Folder in a listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FolderItem {
    pub name: String,
    /// Logical path, ends with `/`
    pub path: String,
}

/// File in a listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileItem {
    pub name: String,
    /// Size in MiB, two decimals
    pub size: f64,
    pub last_modified: String,
    pub url: String,
    #[serde(rename = "type")]
    pub kind: String,
    /// Logical path
    pub full_path: String,
}

/// Result of listing one folder
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    pub folders: Vec<FolderItem>,
    pub files: Vec<FileItem>,
}

/// Presigned upload destination
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadTarget {
    pub url: String,
    pub full_path: String,
}

/// Tier-scoped file operations over an object store
pub struct DriveService {
    store: Arc<dyn ObjectStore>,
    rewriter: UrlRewriter,
    presign_ttl: Duration,
    public_direct_urls: bool,
}

impl DriveService {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        rewriter: UrlRewriter,
        presign_ttl: Duration,
        public_direct_urls: bool,
    ) -> Self {
        Self {
            store,
            rewriter,
            presign_ttl,
            public_direct_urls,
        }
    }

    /// Service configured from the storage section
    pub fn from_config(store: Arc<dyn ObjectStore>, config: &StorageConfig) -> Self {
        let rewriter = UrlRewriter::new(&config.endpoint_url(), config.external_url.as_deref());
        Self::new(store, rewriter, config.presign_ttl(), config.public_direct_urls)
    }

    /// Underlying store
    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    /// Whether returned URLs get rewritten to the external base
    pub fn rewrites_urls(&self) -> bool {
        self.rewriter.is_enabled()
    }

    /// List one folder of a tier.
    ///
    /// Store failures yield an empty listing so the client stays usable.
    pub async fn list(&self, path: &str, is_private: bool) -> Result<Listing> {
        namespace::validate(path)?;
        let prefix = namespace::folder_prefix(path, is_private);

        match self.list_prefix(&prefix, is_private).await {
            Ok(listing) => Ok(listing),
            Err(e) => {
                tracing::warn!("Listing {:?} failed, returning empty result: {}", prefix, e);
                Ok(Listing::default())
            }
        }
    }

    async fn list_prefix(&self, prefix: &str, is_private: bool) -> Result<Listing> {
        let entries = self.store.list(prefix, Some("/")).await?;

        let mut listing = Listing::default();
        for entry in entries {
            match entry {
                ObjectEntry::Folder { key } => {
                    let name = namespace::display_name(prefix, &key).trim_matches('/');
                    if name.is_empty() {
                        continue;
                    }
                    listing.folders.push(FolderItem {
                        name: name.to_string(),
                        path: namespace::logical_path(&key, is_private)
                            .unwrap_or(key.as_str())
                            .to_string(),
                    });
                }
                ObjectEntry::Object {
                    key,
                    size,
                    last_modified,
                } => {
                    // The folder's own marker
                    if key == prefix || key.ends_with('/') {
                        continue;
                    }
                    let name = namespace::display_name(prefix, &key).to_string();
                    listing.files.push(FileItem {
                        kind: file_kind(&name).to_string(),
                        url: self.download_url(&key, is_private).await?,
                        size: size_in_mib(size),
                        last_modified,
                        full_path: namespace::logical_path(&key, is_private)
                            .unwrap_or(key.as_str())
                            .to_string(),
                        name,
                    });
                }
            }
        }
        Ok(listing)
    }

    /// Client-reachable URL for reading one object.
    ///
    /// Private objects are always presigned; public objects are addressed
    /// directly unless direct URLs are turned off.
    async fn download_url(&self, key: &str, is_private: bool) -> Result<String> {
        let url = if !is_private && self.public_direct_urls {
            self.store.object_url(key)
        } else {
            self.store.presign(key, Method::Get, self.presign_ttl).await?
        };
        Ok(self.rewriter.apply(url))
    }

    /// Presigned PUT URL for `prefix + filename`
    pub async fn upload_url(&self, prefix: &str, filename: &str, is_private: bool) -> Result<UploadTarget> {
        if filename.is_empty() || filename.ends_with('/') {
            return Err(Error::InvalidPath(format!("invalid file name {:?}", filename)));
        }
        let logical = format!("{}{}", prefix, filename);
        namespace::validate(&logical)?;

        let key = namespace::provider_key(&logical, is_private);
        let url = self.store.presign(&key, Method::Put, self.presign_ttl).await?;
        Ok(UploadTarget {
            url: self.rewriter.apply(url),
            full_path: logical.trim_start_matches('/').to_string(),
        })
    }

    /// Create a folder marker. Recreating an existing folder is harmless.
    pub async fn create_folder(&self, path: &str, is_private: bool) -> Result<()> {
        namespace::validate(path)?;
        if path.trim_matches('/').is_empty() {
            return Err(Error::InvalidPath("folder name required".into()));
        }

        let key = namespace::folder_prefix(path, is_private);
        self.store.put_empty(&key).await?;
        tracing::info!("Created folder {:?}", key);
        Ok(())
    }

    /// Delete files and folders. Folders are removed recursively.
    ///
    /// All keys go to the store in a single batched call. Returns the number
    /// of keys deleted.
    pub async fn delete(&self, paths: &[String], is_private: bool) -> Result<usize> {
        let mut keys = Vec::new();
        for path in paths {
            namespace::validate(path)?;
            if path.trim_start_matches('/').is_empty() {
                return Err(Error::InvalidPath("refusing to delete the root folder".into()));
            }

            let key = namespace::provider_key(path, is_private);
            if namespace::is_folder(path) {
                let entries = self.store.list(&key, None).await?;
                keys.extend(entries.into_iter().map(|e| e.key().to_string()));
            } else {
                keys.push(key);
            }
        }

        keys.sort();
        keys.dedup();
        if keys.is_empty() {
            return Ok(0);
        }

        self.store.delete(&keys).await?;
        tracing::info!("Deleted {} objects", keys.len());
        Ok(keys.len())
    }
}

fn file_kind(name: &str) -> &'static str {
    let lower = name.to_ascii_lowercase();
    if lower.ends_with(".mp4") || lower.ends_with(".mp3") {
        "video"
    } else {
        "doc"
    }
}

fn size_in_mib(bytes: u64) -> f64 {
    (bytes as f64 / 1024.0 / 1024.0 * 100.0).round() / 100.0
}
