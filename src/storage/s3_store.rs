//! S3-compatible object store backed by rust-s3

use std::time::Duration;
use async_trait::async_trait;
use futures::stream::{self, TryStreamExt};
use s3::bucket_ops::BucketConfiguration;
use s3::creds::Credentials;
use s3::error::S3Error;
use s3::region::Region;
use s3::Bucket;

use super::{encode_key, Method, ObjectEntry, ObjectStore, StoreUrl};
use crate::config::StorageConfig;
use crate::error::{Error, Result};

/// Deletes in flight at once; rust-s3 has no multi-object delete
const DELETE_CONCURRENCY: usize = 16;

/// Object store client for MinIO and other S3-compatible services
pub struct S3Store {
    bucket: Box<Bucket>,
    name: String,
    region: Region,
    credentials: Credentials,
    endpoint: String,
    internal: bool,
}

impl S3Store {
    /// Build a path-style client for the configured bucket
    pub fn new(config: &StorageConfig) -> Result<Self> {
        let endpoint = config.endpoint_url();
        let region = Region::Custom {
            region: config.region.clone(),
            endpoint: endpoint.clone(),
        };
        let credentials = Credentials::new(
            Some(&config.access_key),
            Some(&config.secret_key),
            None,
            None,
            None,
        )
        .map_err(|e| Error::Config(format!("invalid storage credentials: {}", e)))?;

        let bucket = Bucket::new(&config.bucket, region.clone(), credentials.clone())?
            .with_path_style();

        Ok(Self {
            bucket,
            name: config.bucket.clone(),
            region,
            credentials,
            endpoint,
            // Only URLs that will be rewritten need flagging
            internal: config.external_url.is_some(),
        })
    }

    fn expiry_secs(ttl: Duration) -> u32 {
        u32::try_from(ttl.as_secs()).unwrap_or(u32::MAX).max(1)
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn list(&self, prefix: &str, delimiter: Option<&str>) -> Result<Vec<ObjectEntry>> {
        let pages = self
            .bucket
            .list(prefix.to_string(), delimiter.map(str::to_string))
            .await?;

        let mut entries = Vec::new();
        for page in pages {
            for common in page.common_prefixes.into_iter().flatten() {
                entries.push(ObjectEntry::Folder { key: common.prefix });
            }
            for object in page.contents {
                entries.push(ObjectEntry::Object {
                    key: object.key,
                    size: object.size,
                    last_modified: object.last_modified,
                });
            }
        }

        tracing::debug!("Listed {} entries under {:?}", entries.len(), prefix);
        Ok(entries)
    }

    async fn presign(&self, key: &str, method: Method, ttl: Duration) -> Result<StoreUrl> {
        let expiry = Self::expiry_secs(ttl);
        let url = match method {
            Method::Get => self.bucket.presign_get(key, expiry, None).await?,
            Method::Put => self.bucket.presign_put(key, expiry, None, None).await?,
        };
        Ok(StoreUrl {
            url,
            internal: self.internal,
        })
    }

    fn object_url(&self, key: &str) -> StoreUrl {
        StoreUrl {
            url: format!("{}/{}/{}", self.endpoint, self.name, encode_key(key)),
            internal: self.internal,
        }
    }

    async fn delete(&self, keys: &[String]) -> Result<()> {
        stream::iter(keys.iter().map(Ok::<_, Error>))
            .try_for_each_concurrent(DELETE_CONCURRENCY, |key| async move {
                let response = self.bucket.delete_object(key).await?;
                let code = response.status_code();
                // 404 means already gone
                if (200..300).contains(&code) || code == 404 {
                    Ok(())
                } else {
                    Err(Error::Upstream(format!("delete {} failed with HTTP {}", key, code)))
                }
            })
            .await?;

        tracing::debug!("Deleted {} objects", keys.len());
        Ok(())
    }

    async fn put_empty(&self, key: &str) -> Result<()> {
        let response = self.bucket.put_object(key, &[]).await?;
        let code = response.status_code();
        if !(200..300).contains(&code) {
            return Err(Error::Upstream(format!("put {} failed with HTTP {}", key, code)));
        }
        Ok(())
    }

    async fn ensure_bucket(&self) -> Result<()> {
        if self.bucket.exists().await? {
            return Ok(());
        }

        tracing::info!("Creating bucket {}", self.name);
        let response = Bucket::create_with_path_style(
            &self.name,
            self.region.clone(),
            self.credentials.clone(),
            BucketConfiguration::default(),
        )
        .await?;

        if !response.success() {
            return Err(Error::Upstream(format!(
                "create bucket {} failed with HTTP {}",
                self.name, response.response_code
            )));
        }
        Ok(())
    }
}

impl From<S3Error> for Error {
    fn from(e: S3Error) -> Self {
        Error::Upstream(format!("S3 error: {}", e))
    }
}
