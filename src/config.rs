//! NingDrive Configuration
//!
//! Configuration is read from an optional TOML file and then overlaid with
//! environment variables, so a container deployment can run with no file at
//! all.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Port of the reverse proxy that fronts the object store for browsers
const LEGACY_PROXY_PORT: u16 = 8080;

/// Path under which the reverse proxy forwards to the object store
const LEGACY_PROXY_PATH: &str = "/minio-api";

/// Main NingDrive configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DriveConfig {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Object store connection configuration
    #[serde(default)]
    pub storage: StorageConfig,

    /// Password and token configuration
    #[serde(default)]
    pub auth: AuthConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP API bind address
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Directory holding the state database
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Enable permissive CORS
    #[serde(default = "default_true")]
    pub cors_enabled: bool,
}

/// Object store connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Cluster-local endpoint (host:port, scheme optional)
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Use https towards the endpoint
    #[serde(default)]
    pub secure: bool,

    /// Access key
    #[serde(default = "default_access_key")]
    pub access_key: String,

    /// Secret key
    #[serde(default = "default_secret_key")]
    pub secret_key: String,

    /// Bucket holding both tiers
    #[serde(default = "default_bucket")]
    pub bucket: String,

    /// Region name sent in signatures
    #[serde(default = "default_region")]
    pub region: String,

    /// Externally reachable base URL that replaces the internal endpoint
    #[serde(default)]
    pub external_url: Option<String>,

    /// Lifetime of presigned URLs in seconds
    #[serde(default = "default_presign_ttl_secs")]
    pub presign_ttl_secs: u64,

    /// Address public objects directly instead of presigning them
    #[serde(default = "default_true")]
    pub public_direct_urls: bool,
}

/// Password and token configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Seed value for the public site password
    #[serde(default = "default_site_password")]
    pub site_password: String,

    /// Seed value for the private space password
    #[serde(default = "default_private_password")]
    pub private_password: String,

    /// Token lifetime in days
    #[serde(default = "default_token_lifetime_days")]
    pub token_lifetime_days: u32,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

// Default value functions
fn default_bind_address() -> String {
    "0.0.0.0:8000".to_string()
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("/var/lib/ningdrive")
}

fn default_endpoint() -> String {
    "minio:9000".to_string()
}

fn default_access_key() -> String {
    "ningguru".to_string()
}

fn default_secret_key() -> String {
    "12345678".to_string()
}

fn default_bucket() -> String {
    "ningguru-files".to_string()
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_presign_ttl_secs() -> u64 {
    3600
}

pub(crate) fn default_site_password() -> String {
    "admin".to_string()
}

pub(crate) fn default_private_password() -> String {
    "private".to_string()
}

fn default_token_lifetime_days() -> u32 {
    30
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            data_dir: default_data_dir(),
            cors_enabled: true,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            secure: false,
            access_key: default_access_key(),
            secret_key: default_secret_key(),
            bucket: default_bucket(),
            region: default_region(),
            external_url: None,
            presign_ttl_secs: default_presign_ttl_secs(),
            public_direct_urls: true,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            site_password: default_site_password(),
            private_password: default_private_password(),
            token_lifetime_days: default_token_lifetime_days(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl StorageConfig {
    /// Endpoint as a full origin URL, e.g. `http://minio:9000`
    pub fn endpoint_url(&self) -> String {
        if self.endpoint.contains("://") {
            return self.endpoint.trim_end_matches('/').to_string();
        }
        let scheme = if self.secure { "https" } else { "http" };
        format!("{}://{}", scheme, self.endpoint.trim_end_matches('/'))
    }

    /// Presigned URL lifetime as Duration
    pub fn presign_ttl(&self) -> Duration {
        Duration::from_secs(self.presign_ttl_secs)
    }
}

impl AuthConfig {
    /// Token lifetime as a chrono Duration
    pub fn token_lifetime(&self) -> chrono::Duration {
        chrono::Duration::days(i64::from(self.token_lifetime_days))
    }
}

impl DriveConfig {
    /// Load configuration from an optional TOML file, then apply the environment
    pub fn load(path: Option<&Path>) -> crate::Result<Self> {
        let mut config = match path {
            Some(p) if p.exists() => {
                let content = std::fs::read_to_string(p)?;
                toml::from_str(&content)?
            }
            Some(p) => {
                tracing::debug!("No config file at {:?}, using defaults", p);
                DriveConfig::default()
            }
            None => DriveConfig::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML string
    pub fn from_str(content: &str) -> crate::Result<Self> {
        let config: DriveConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Overlay values from the environment
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = non_empty("MINIO_ENDPOINT") {
            self.storage.endpoint = v;
        }
        if let Some(v) = non_empty("MINIO_ACCESS_KEY") {
            self.storage.access_key = v;
        }
        if let Some(v) = non_empty("MINIO_SECRET_KEY") {
            self.storage.secret_key = v;
        }
        if let Some(v) = non_empty("MINIO_BUCKET") {
            self.storage.bucket = v;
        }
        if let Some(v) = non_empty("MINIO_SECURE") {
            self.storage.secure = matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes");
        }
        if let Some(v) = non_empty("EXTERNAL_URL") {
            self.storage.external_url = Some(v);
        } else if let Some(v) = non_empty("EXTERNAL_ENDPOINT") {
            self.storage.external_url = Some(external_url_from_endpoint(&v));
        }
        if let Some(v) = non_empty("SITE_PASSWORD") {
            self.auth.site_password = v;
        }
        if let Some(v) = non_empty("PRIVATE_PASSWORD") {
            self.auth.private_password = v;
        }
        if let Some(v) = non_empty("NINGDRIVE_DATA_DIR") {
            self.server.data_dir = PathBuf::from(v);
        }
        if let Some(v) = non_empty("NINGDRIVE_BIND") {
            self.server.bind_address = v;
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> crate::Result<()> {
        if self.server.bind_address.is_empty() {
            return Err(crate::Error::Config("server.bind_address cannot be empty".into()));
        }

        if self.storage.endpoint.is_empty() {
            return Err(crate::Error::Config("storage.endpoint cannot be empty".into()));
        }

        if self.storage.bucket.is_empty() {
            return Err(crate::Error::Config("storage.bucket cannot be empty".into()));
        }

        if self.storage.presign_ttl_secs == 0 {
            return Err(crate::Error::Config("storage.presign_ttl_secs must be positive".into()));
        }

        if self.auth.token_lifetime_days == 0 {
            return Err(crate::Error::Config("auth.token_lifetime_days must be positive".into()));
        }

        if self.auth.site_password == self.auth.private_password {
            tracing::warn!("Site and private passwords are identical; private login will never be distinguishable");
        }

        Ok(())
    }

    /// Path of the state database
    pub fn database_path(&self) -> PathBuf {
        self.server.data_dir.join("drive.db")
    }
}

/// Derive the proxied base URL from a legacy `host:port` external endpoint
fn external_url_from_endpoint(endpoint: &str) -> String {
    let authority = endpoint
        .trim_start_matches("http://")
        .trim_start_matches("https://");
    let authority = authority.split('/').next().unwrap_or(authority);
    // Only a trailing numeric `:port` is dropped; `[::1]` keeps its colons
    let host = match authority.rsplit_once(':') {
        Some((host, port)) if !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()) => host,
        _ => authority,
    };
    format!("http://{}:{}{}", host, LEGACY_PROXY_PORT, LEGACY_PROXY_PATH)
}
