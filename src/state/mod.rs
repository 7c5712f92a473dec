//! State Management Module
//!
//! Durable state shared by every request: the credential store holding
//! the login passwords and the ledger of issued bearer tokens.

mod db;
mod credentials;
mod tokens;

pub use db::Database;
pub use credentials::{ConfigKey, CredentialStore};
pub use tokens::{Tier, Token, TokenLedger};
