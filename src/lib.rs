//! NingDrive - Personal File Drive Backend
//!
//! A small backend that lists, uploads and deletes files held in an
//! S3-compatible object store, split into a public tree and a
//! password-protected private tree.
//!
//! # Architecture
//!
//! Every protected request passes through the same chain: the access guard
//! resolves the bearer token to a trust tier, the namespace resolver maps the
//! client's logical path into that tier's key space, the object store is
//! called, and any URL it returns is rewritten to be reachable from outside
//! the storage network.
//!
//! # Features
//!
//! - Two-tier bearer tokens (`global`, `private`) with fixed 30-day expiry
//! - Lazy eviction of expired tokens, explicit logout
//! - Disjoint `public/` and `.private/` key roots
//! - Presigned URLs for private content, direct URLs for public content
//! - Recursive folder deletes issued as one batch

pub mod config;
pub mod error;
pub mod state;
pub mod auth;
pub mod namespace;
pub mod storage;
pub mod drive;
pub mod api;

pub use config::DriveConfig;
pub use error::{Error, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::DriveConfig;
    pub use crate::error::{CredentialRejection, Error, Result};
    pub use crate::state::{ConfigKey, CredentialStore, Database, Tier, Token, TokenLedger};
    pub use crate::auth::{AccessGuard, Authenticator};
    pub use crate::storage::{MemoryStore, ObjectStore, S3Store, UrlRewriter};
    pub use crate::drive::DriveService;
}
