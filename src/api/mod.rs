//! HTTP API Module
//!
//! Provides the REST API clients use to log in and manage files.

mod http;

pub use http::{AppState, BearerToken, HttpServer, TOKEN_HEADER};
pub use http::{
    DeleteRequest, ErrorResponse, FolderRequest, ListRequest, LoginRequest, LoginResponse,
    StatusResponse, UploadUrlRequest, UploadUrlResponse, WhoAmIResponse,
};
