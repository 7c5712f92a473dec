//! NingDrive Error Types

use axum::http::StatusCode;
use thiserror::Error;

/// Result type alias for NingDrive operations
pub type Result<T> = std::result::Result<T, Error>;

/// Why a password was refused at a login surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialRejection {
    /// Matches neither known password
    WrongPassword,
    /// The private-space password was offered at the public login
    UsePrivateLogin,
    /// Private login with anything but the private password
    WrongPrivatePassword,
}

impl std::fmt::Display for CredentialRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let msg = match self {
            CredentialRejection::WrongPassword => "wrong password",
            CredentialRejection::UsePrivateLogin => {
                "that is the private space password, please use the private login"
            }
            CredentialRejection::WrongPrivatePassword => "private password incorrect",
        };
        f.write_str(msg)
    }
}

/// NingDrive error types
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(#[from] toml::de::Error),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Durable state errors
    #[error("Database error: {0}")]
    Database(String),

    // Access errors
    #[error("please log in")]
    Unauthenticated,

    #[error("login expired, please log in again")]
    Expired,

    #[error("this token cannot access the private space")]
    Forbidden,

    #[error("{0}")]
    BadCredential(CredentialRejection),

    #[error("invalid path: {0}")]
    InvalidPath(String),

    // Object store errors
    #[error("storage unavailable: {0}")]
    Upstream(String),

    // Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Check if this error means the caller has to (re)authenticate
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, Error::Unauthenticated | Error::Expired)
    }

    /// HTTP status this error surfaces as
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Unauthenticated | Error::Expired => StatusCode::UNAUTHORIZED,
            Error::Forbidden => StatusCode::FORBIDDEN,
            Error::BadCredential(_) | Error::InvalidPath(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            Error::Config(_) | Error::ConfigParse(_) => "CONFIG_ERROR",
            Error::Io(_) | Error::Internal(_) => "INTERNAL_ERROR",
            Error::Database(_) => "STATE_ERROR",
            Error::Unauthenticated => "UNAUTHENTICATED",
            Error::Expired => "TOKEN_EXPIRED",
            Error::Forbidden => "FORBIDDEN",
            Error::BadCredential(CredentialRejection::UsePrivateLogin) => "USE_PRIVATE_LOGIN",
            Error::BadCredential(_) => "BAD_CREDENTIAL",
            Error::InvalidPath(_) => "INVALID_PATH",
            Error::Upstream(_) => "UPSTREAM_UNAVAILABLE",
        }
    }
}

impl From<rusqlite::Error> for Error {
    fn from(e: rusqlite::Error) -> Self {
        Error::Database(format!("SQLite error: {}", e))
    }
}
