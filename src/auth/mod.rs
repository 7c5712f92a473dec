//! Authentication Module
//!
//! Password login and per-request tier checks.

mod authenticator;
mod guard;

pub use authenticator::Authenticator;
pub use guard::AccessGuard;
