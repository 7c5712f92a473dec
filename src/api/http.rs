//! HTTP API Server
//!
//! JSON-over-POST API for login, listing, uploads, folders and deletes.

use std::sync::Arc;
use axum::{
    async_trait,
    extract::{FromRequestParts, Json, State},
    http::{header, request::Parts, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::auth::{AccessGuard, Authenticator};
use crate::config::ServerConfig;
use crate::drive::{DriveService, Listing, UploadTarget};
use crate::error::{Error, Result};
use crate::state::Tier;

/// Header carrying the bearer token
pub const TOKEN_HEADER: &str = "x-token";

/// Shared application state
pub struct AppState {
    /// Password login
    pub authenticator: Authenticator,
    /// Token tier checks
    pub guard: AccessGuard,
    /// File operations
    pub drive: DriveService,
}

/// HTTP API server
pub struct HttpServer {
    config: ServerConfig,
    state: Arc<AppState>,
}

impl HttpServer {
    /// Create a new HTTP server
    pub fn new(config: ServerConfig, state: AppState) -> Self {
        Self {
            config,
            state: Arc::new(state),
        }
    }

    /// Get the state for sharing with other components
    pub fn state(&self) -> Arc<AppState> {
        Arc::clone(&self.state)
    }

    /// Create the router
    pub fn router(&self) -> Router {
        let router = Router::new()
            // Login
            .route("/login", post(handle_login))
            .route("/login_private", post(handle_login_private))
            .route("/logout", post(handle_logout))
            .route("/whoami", post(handle_whoami))
            // Files
            .route("/list", post(handle_list))
            .route("/get_upload_url", post(handle_upload_url))
            .route("/create_folder", post(handle_create_folder))
            .route("/delete", post(handle_delete))
            // Status
            .route("/health", get(handle_health))
            .with_state(Arc::clone(&self.state))
            .layer(TraceLayer::new_for_http());

        if self.config.cors_enabled {
            router.layer(CorsLayer::permissive())
        } else {
            router
        }
    }

    /// Start the HTTP server, returning on Ctrl+C
    pub async fn start(&self) -> Result<()> {
        let app = self.router();

        let listener = tokio::net::TcpListener::bind(&self.config.bind_address).await?;
        tracing::info!("HTTP API listening on {}", self.config.bind_address);

        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::error!("Failed to listen for shutdown signal: {}", e);
                }
                tracing::info!("Received shutdown signal");
            })
            .await
            .map_err(|e| Error::Internal(format!("HTTP server error: {}", e)))?;

        Ok(())
    }
}

// ============ Token Extraction ============

/// Token presented with a request, from `X-Token` or `Authorization: Bearer`
#[derive(Debug, Clone, Default)]
pub struct BearerToken(pub Option<String>);

impl BearerToken {
    pub fn as_deref(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for BearerToken {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> std::result::Result<Self, Self::Rejection> {
        // Blank values fall through to the next source
        let from_header = parts
            .headers
            .get(TOKEN_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string);

        let from_bearer = || {
            parts
                .headers
                .get(header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.strip_prefix("Bearer "))
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string)
        };

        Ok(BearerToken(from_header.or_else(from_bearer)))
    }
}

// ============ Request/Response Types ============

/// Login request
#[derive(Debug, Deserialize, Serialize)]
pub struct LoginRequest {
    pub password: String,
}

/// List request
#[derive(Debug, Deserialize, Serialize)]
pub struct ListRequest {
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub is_private: bool,
}

/// Upload URL request
#[derive(Debug, Deserialize, Serialize)]
pub struct UploadUrlRequest {
    pub filename: String,
    #[serde(default)]
    pub prefix: String,
    #[serde(default)]
    pub is_private: bool,
}

/// Create folder request
#[derive(Debug, Deserialize, Serialize)]
pub struct FolderRequest {
    pub path: String,
    #[serde(default)]
    pub is_private: bool,
}

/// Delete request
#[derive(Debug, Deserialize, Serialize)]
pub struct DeleteRequest {
    pub paths: Vec<String>,
    #[serde(default)]
    pub is_private: bool,
}

/// Login response
#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    #[serde(rename = "type")]
    pub tier: Tier,
    pub expires_at: DateTime<Utc>,
}

/// Token tier response
#[derive(Debug, Serialize, Deserialize)]
pub struct WhoAmIResponse {
    #[serde(rename = "type")]
    pub tier: Tier,
}

/// Upload URL response
#[derive(Debug, Serialize, Deserialize)]
pub struct UploadUrlResponse {
    pub url: String,
    pub full_path: String,
}

/// Plain acknowledgement
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted: Option<usize>,
}

impl StatusResponse {
    fn ok() -> Self {
        Self {
            status: "ok".to_string(),
            deleted: None,
        }
    }
}

/// Health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub healthy: bool,
}

/// Error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        }
        (
            status,
            Json(ErrorResponse {
                error: self.to_string(),
                code: self.code().to_string(),
            }),
        )
            .into_response()
    }
}

// ============ Handlers ============

async fn handle_login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>> {
    let token = state.authenticator.login_global(&req.password)?;
    Ok(Json(LoginResponse {
        token: token.token,
        tier: token.tier,
        expires_at: token.expires_at,
    }))
}

async fn handle_login_private(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>> {
    let token = state.authenticator.login_private(&req.password)?;
    Ok(Json(LoginResponse {
        token: token.token,
        tier: token.tier,
        expires_at: token.expires_at,
    }))
}

async fn handle_logout(
    State(state): State<Arc<AppState>>,
    token: BearerToken,
) -> Result<Json<StatusResponse>> {
    state.guard.logout(token.as_deref())?;
    Ok(Json(StatusResponse::ok()))
}

async fn handle_whoami(
    State(state): State<Arc<AppState>>,
    token: BearerToken,
) -> Result<Json<WhoAmIResponse>> {
    let tier = state.guard.authorize(token.as_deref(), Tier::Global)?;
    Ok(Json(WhoAmIResponse { tier }))
}

async fn handle_list(
    State(state): State<Arc<AppState>>,
    token: BearerToken,
    Json(req): Json<ListRequest>,
) -> Result<Json<Listing>> {
    state.guard.authorize(token.as_deref(), Tier::required_for(req.is_private))?;
    let listing = state.drive.list(&req.path, req.is_private).await?;
    Ok(Json(listing))
}

async fn handle_upload_url(
    State(state): State<Arc<AppState>>,
    token: BearerToken,
    Json(req): Json<UploadUrlRequest>,
) -> Result<Json<UploadUrlResponse>> {
    state.guard.authorize(token.as_deref(), Tier::required_for(req.is_private))?;
    let UploadTarget { url, full_path } = state
        .drive
        .upload_url(&req.prefix, &req.filename, req.is_private)
        .await?;
    Ok(Json(UploadUrlResponse { url, full_path }))
}

async fn handle_create_folder(
    State(state): State<Arc<AppState>>,
    token: BearerToken,
    Json(req): Json<FolderRequest>,
) -> Result<Json<StatusResponse>> {
    state.guard.authorize(token.as_deref(), Tier::required_for(req.is_private))?;
    state.drive.create_folder(&req.path, req.is_private).await?;
    Ok(Json(StatusResponse::ok()))
}

async fn handle_delete(
    State(state): State<Arc<AppState>>,
    token: BearerToken,
    Json(req): Json<DeleteRequest>,
) -> Result<Json<StatusResponse>> {
    state.guard.authorize(token.as_deref(), Tier::required_for(req.is_private))?;
    let deleted = state.drive.delete(&req.paths, req.is_private).await?;
    Ok(Json(StatusResponse {
        status: "ok".to_string(),
        deleted: Some(deleted),
    }))
}

async fn handle_health() -> impl IntoResponse {
    (StatusCode::OK, Json(HealthResponse { healthy: true }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::{json, Value};
    use tempfile::{tempdir, TempDir};
    use tower::ServiceExt;

    use crate::config::AuthConfig;
    use crate::state::{CredentialStore, Database, TokenLedger};
    use crate::storage::{MemoryStore, UrlRewriter};

    struct Harness {
        _dir: TempDir,
        store: Arc<MemoryStore>,
        ledger: TokenLedger,
        router: Router,
    }

    async fn harness() -> Harness {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path()).unwrap();
        let auth = AuthConfig {
            site_password: "admin".to_string(),
            private_password: "private".to_string(),
            ..AuthConfig::default()
        };
        let credentials = CredentialStore::new(db.clone(), &auth);
        credentials.ensure_seeded().unwrap();
        let ledger = TokenLedger::new(db, auth.token_lifetime());

        let store = Arc::new(MemoryStore::new("http://minio:9000", "files"));
        store.insert("public/welcome.txt", 100).await;
        store.insert(".private/secret.txt", 100).await;
        store.insert(".private/albums/", 0).await;

        let rewriter = UrlRewriter::new("http://minio:9000", Some("http://203.0.113.7:8080/minio-api"));
        let drive = DriveService::new(store.clone(), rewriter, std::time::Duration::from_secs(3600), true);

        let server = HttpServer::new(
            ServerConfig::default(),
            AppState {
                authenticator: Authenticator::new(credentials, ledger.clone()),
                guard: AccessGuard::new(ledger.clone()),
                drive,
            },
        );

        Harness {
            _dir: dir,
            store,
            ledger,
            router: server.router(),
        }
    }

    async fn post(router: &Router, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(t) = token {
            builder = builder.header(TOKEN_HEADER, t);
        }
        let request = builder.body(Body::from(body.to_string())).unwrap();

        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    async fn login(router: &Router, uri: &str, password: &str) -> String {
        let (status, body) = post(router, uri, None, json!({ "password": password })).await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        body["token"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_tiered_login_scenario() {
        let h = harness().await;

        let (status, body) = post(&h.router, "/login", None, json!({ "password": "admin" })).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["type"], "global");
        let global = body["token"].as_str().unwrap().to_string();

        let (status, body) = post(&h.router, "/login", None, json!({ "password": "private" })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "USE_PRIVATE_LOGIN");
        assert!(body["error"].as_str().unwrap().contains("private login"));

        let (status, _) = post(
            &h.router,
            "/list",
            Some(&global),
            json!({ "path": "", "is_private": true }),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = post(&h.router, "/login_private", None, json!({ "password": "private" })).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["type"], "private");
        let private = body["token"].as_str().unwrap().to_string();

        let (status, body) = post(
            &h.router,
            "/list",
            Some(&private),
            json!({ "path": "", "is_private": true }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["folders"][0]["name"], "albums");
        assert_eq!(body["files"].as_array().unwrap().len(), 1);
        assert_eq!(body["files"][0]["full_path"], "secret.txt");
    }

    #[tokio::test]
    async fn test_wrong_passwords() {
        let h = harness().await;
        let (status, body) = post(&h.router, "/login", None, json!({ "password": "nope" })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "wrong password");

        let (status, body) = post(&h.router, "/login_private", None, json!({ "password": "admin" })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "private password incorrect");
    }

    #[tokio::test]
    async fn test_missing_and_unknown_token() {
        let h = harness().await;
        let (status, body) = post(&h.router, "/list", None, json!({ "path": "" })).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "please log in");

        let (status, body) = post(&h.router, "/list", Some("forged"), json!({ "path": "" })).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "UNAUTHENTICATED");
    }

    #[tokio::test]
    async fn test_global_token_forbidden_on_every_private_operation() {
        let h = harness().await;
        let global = login(&h.router, "/login", "admin").await;

        let calls = [
            ("/list", json!({ "path": "", "is_private": true })),
            ("/get_upload_url", json!({ "filename": "a.txt", "is_private": true })),
            ("/create_folder", json!({ "path": "x", "is_private": true })),
            ("/delete", json!({ "paths": ["secret.txt"], "is_private": true })),
        ];
        for (uri, body) in calls {
            let (status, _) = post(&h.router, uri, Some(&global), body).await;
            assert_eq!(status, StatusCode::FORBIDDEN, "{}", uri);
        }
        assert!(h.store.keys().await.contains(&".private/secret.txt".to_string()));
    }

    #[tokio::test]
    async fn test_private_token_reaches_both_tiers() {
        let h = harness().await;
        let private = login(&h.router, "/login_private", "private").await;

        for is_private in [false, true] {
            let (status, _) = post(
                &h.router,
                "/list",
                Some(&private),
                json!({ "path": "", "is_private": is_private }),
            )
            .await;
            assert_eq!(status, StatusCode::OK);

            let (status, body) = post(
                &h.router,
                "/get_upload_url",
                Some(&private),
                json!({ "filename": "up.bin", "prefix": "", "is_private": is_private }),
            )
            .await;
            assert_eq!(status, StatusCode::OK);
            assert!(body["url"].as_str().unwrap().starts_with("http://203.0.113.7:8080/minio-api/"));
        }
    }

    #[tokio::test]
    async fn test_bearer_header_accepted() {
        let h = harness().await;
        let global = login(&h.router, "/login", "admin").await;

        let request = Request::builder()
            .method("POST")
            .uri("/whoami")
            .header(header::AUTHORIZATION, format!("Bearer {}", global))
            .body(Body::empty())
            .unwrap();
        let response = h.router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_blank_token_header_falls_back_to_bearer() {
        let h = harness().await;
        let global = login(&h.router, "/login", "admin").await;

        let request = Request::builder()
            .method("POST")
            .uri("/whoami")
            .header(TOKEN_HEADER, "")
            .header(header::AUTHORIZATION, format!("Bearer {}", global))
            .body(Body::empty())
            .unwrap();
        let response = h.router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_expired_token_rejected_then_forgotten() {
        let h = harness().await;
        let issued = Utc::now() - chrono::Duration::days(31);
        let token = h.ledger.issue_at(Tier::Private, issued).unwrap().token;

        let (status, body) = post(&h.router, "/list", Some(&token), json!({ "path": "" })).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "login expired, please log in again");
        assert_eq!(body["code"], "TOKEN_EXPIRED");

        let (status, body) = post(&h.router, "/list", Some(&token), json!({ "path": "" })).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "please log in");
        assert_eq!(h.ledger.count().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_folder_and_delete_flow() {
        let h = harness().await;
        let global = login(&h.router, "/login", "admin").await;

        let (status, body) = post(
            &h.router,
            "/create_folder",
            Some(&global),
            json!({ "path": "music" }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        h.store.insert("public/music/song.mp3", 10).await;

        let (status, body) = post(
            &h.router,
            "/delete",
            Some(&global),
            json!({ "paths": ["music/", "welcome.txt"] }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["deleted"], 3);
        assert_eq!(
            h.store.keys().await,
            vec![".private/albums/".to_string(), ".private/secret.txt".to_string()]
        );
    }

    #[tokio::test]
    async fn test_logout_then_token_rejected() {
        let h = harness().await;
        let global = login(&h.router, "/login", "admin").await;

        let (status, _) = post(&h.router, "/logout", Some(&global), json!({})).await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = post(&h.router, "/list", Some(&global), json!({ "path": "" })).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_invalid_path_is_bad_request() {
        let h = harness().await;
        let global = login(&h.router, "/login", "admin").await;
        let (status, body) = post(
            &h.router,
            "/list",
            Some(&global),
            json!({ "path": "../.private" }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "INVALID_PATH");
    }

    #[tokio::test]
    async fn test_storage_outage() {
        let h = harness().await;
        let global = login(&h.router, "/login", "admin").await;
        h.store.set_unavailable(true);

        let (status, body) = post(&h.router, "/list", Some(&global), json!({ "path": "" })).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "folders": [], "files": [] }));

        let (status, body) = post(
            &h.router,
            "/get_upload_url",
            Some(&global),
            json!({ "filename": "a.txt" }),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["code"], "UPSTREAM_UNAVAILABLE");
    }

    #[tokio::test]
    async fn test_health() {
        let h = harness().await;
        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let response = h.router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
