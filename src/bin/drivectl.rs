//! DriveCtl - Command line client for a NingDrive server
//!
//! Usage:
//!   drivectl login                 - Log in to the public tree
//!   drivectl login --private       - Log in to the private tree
//!   drivectl ls [path] [--private] - List a folder
//!   drivectl mkdir <path>          - Create a folder
//!   drivectl rm <path>...          - Delete files or folders (trailing /)
//!   drivectl upload-url <name>     - Get a presigned upload URL

use std::io::BufRead;
use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

/// NingDrive command line client
#[derive(Parser)]
#[command(name = "drivectl")]
#[command(about = "Browse and manage a NingDrive server", long_about = None)]
struct Cli {
    /// Server address
    #[arg(short, long, env = "NINGDRIVE_URL", default_value = "http://127.0.0.1:8000")]
    endpoint: String,

    /// File holding the current token
    #[arg(long, env = "NINGDRIVE_TOKEN_FILE")]
    token_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in and store the token
    Login {
        /// Use the private space login
        #[arg(long)]
        private: bool,
        /// Password (read from stdin if omitted)
        #[arg(long)]
        password: Option<String>,
    },
    /// Revoke the stored token
    Logout,
    /// Show the tier of the stored token
    Whoami,
    /// List a folder
    Ls {
        /// Folder path
        #[arg(default_value = "")]
        path: String,
        #[arg(long)]
        private: bool,
    },
    /// Create a folder
    Mkdir {
        path: String,
        #[arg(long)]
        private: bool,
    },
    /// Delete files, or folders when the path ends in /
    Rm {
        #[arg(required = true)]
        paths: Vec<String>,
        #[arg(long)]
        private: bool,
    },
    /// Get a presigned upload URL
    UploadUrl {
        filename: String,
        /// Destination folder, with trailing /
        #[arg(long, default_value = "")]
        prefix: String,
        #[arg(long)]
        private: bool,
    },
}

// ============ API Response Types ============

#[derive(Debug, Deserialize)]
struct LoginResponse {
    token: String,
    #[serde(rename = "type")]
    tier: String,
    #[serde(default)]
    expires_at: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WhoAmIResponse {
    #[serde(rename = "type")]
    tier: String,
}

#[derive(Debug, Deserialize)]
struct Listing {
    #[serde(default)]
    folders: Vec<FolderItem>,
    #[serde(default)]
    files: Vec<FileItem>,
}

#[derive(Debug, Deserialize)]
struct FolderItem {
    name: String,
}

#[derive(Debug, Deserialize)]
struct FileItem {
    name: String,
    #[serde(default)]
    size: f64,
    #[serde(default)]
    last_modified: String,
    #[serde(default, rename = "type")]
    kind: String,
}

#[derive(Debug, Deserialize)]
struct UploadUrlResponse {
    url: String,
    #[serde(default)]
    full_path: String,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    status: String,
    #[serde(default)]
    deleted: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: String,
}

// ============ Client ============

struct Client {
    http: reqwest::Client,
    endpoint: String,
    token_file: PathBuf,
}

impl Client {
    fn new(endpoint: &str, token_file: PathBuf) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
            token_file,
        }
    }

    fn token(&self) -> Option<String> {
        std::fs::read_to_string(&self.token_file)
            .ok()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
    }

    fn save_token(&self, token: &str) -> anyhow::Result<()> {
        if let Some(parent) = self.token_file.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.token_file, token)
            .with_context(|| format!("writing {}", self.token_file.display()))
    }

    async fn post<T: DeserializeOwned>(&self, path: &str, body: Value) -> anyhow::Result<T> {
        let url = format!("{}{}", self.endpoint, path);
        let mut request = self.http.post(&url).json(&body);
        if let Some(token) = self.token() {
            request = request.header("x-token", token);
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("contacting {}", url))?;
        let status = response.status();
        if !status.is_success() {
            let message = match response.json::<ErrorResponse>().await {
                Ok(e) => e.error,
                Err(_) => status.to_string(),
            };
            bail!("{} ({})", message, status.as_u16());
        }
        Ok(response.json().await?)
    }
}

fn default_token_file() -> PathBuf {
    let home = std::env::var_os("HOME").map(PathBuf::from).unwrap_or_default();
    home.join(".config").join("ningdrive").join("token")
}

fn read_password() -> anyhow::Result<String> {
    eprint!("Password: ");
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

// ============ Main ============

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let client = Client::new(&cli.endpoint, cli.token_file.clone().unwrap_or_else(default_token_file));

    let result = match cli.command {
        Commands::Login { private, password } => login(&client, private, password).await,
        Commands::Logout => logout(&client).await,
        Commands::Whoami => whoami(&client).await,
        Commands::Ls { path, private } => list(&client, &path, private).await,
        Commands::Mkdir { path, private } => mkdir(&client, &path, private).await,
        Commands::Rm { paths, private } => remove(&client, &paths, private).await,
        Commands::UploadUrl { filename, prefix, private } => {
            upload_url(&client, &prefix, &filename, private).await
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

// ============ Commands ============

async fn login(client: &Client, private: bool, password: Option<String>) -> anyhow::Result<()> {
    let password = match password {
        Some(p) => p,
        None => read_password()?,
    };
    let path = if private { "/login_private" } else { "/login" };
    let response: LoginResponse = client.post(path, json!({ "password": password })).await?;

    client.save_token(&response.token)?;
    println!(
        "Logged in ({} access), token valid until {}",
        response.tier,
        response.expires_at.as_deref().unwrap_or("unknown")
    );
    Ok(())
}

async fn logout(client: &Client) -> anyhow::Result<()> {
    let _: StatusResponse = client.post("/logout", json!({})).await?;
    std::fs::remove_file(&client.token_file).ok();
    println!("Logged out");
    Ok(())
}

async fn whoami(client: &Client) -> anyhow::Result<()> {
    let response: WhoAmIResponse = client.post("/whoami", json!({})).await?;
    println!("{}", response.tier);
    Ok(())
}

async fn list(client: &Client, path: &str, private: bool) -> anyhow::Result<()> {
    let listing: Listing = client
        .post("/list", json!({ "path": path, "is_private": private }))
        .await?;

    let tree = if private { "private" } else { "public" };
    println!();
    println!("{}:/{}", tree, path.trim_start_matches('/'));
    println!("{}", "-".repeat(70));
    println!("{:<40} {:>10} {:<6} {}", "NAME", "SIZE (MB)", "TYPE", "MODIFIED");

    for folder in &listing.folders {
        // Bold blue like a directory listing
        println!("\x1b[1;34m{:<40}\x1b[0m {:>10} {:<6}", format!("{}/", folder.name), "-", "dir");
    }
    for file in &listing.files {
        println!(
            "{:<40} {:>10.2} {:<6} {}",
            file.name, file.size, file.kind, file.last_modified
        );
    }

    if listing.folders.is_empty() && listing.files.is_empty() {
        println!("(empty)");
    }
    println!();
    Ok(())
}

async fn mkdir(client: &Client, path: &str, private: bool) -> anyhow::Result<()> {
    let response: StatusResponse = client
        .post("/create_folder", json!({ "path": path, "is_private": private }))
        .await?;
    println!("{}", response.status);
    Ok(())
}

async fn remove(client: &Client, paths: &[String], private: bool) -> anyhow::Result<()> {
    let response: StatusResponse = client
        .post("/delete", json!({ "paths": paths, "is_private": private }))
        .await?;
    println!("{} ({} objects deleted)", response.status, response.deleted.unwrap_or(0));
    Ok(())
}

async fn upload_url(client: &Client, prefix: &str, filename: &str, private: bool) -> anyhow::Result<()> {
    let response: UploadUrlResponse = client
        .post(
            "/get_upload_url",
            json!({ "filename": filename, "prefix": prefix, "is_private": private }),
        )
        .await?;
    eprintln!("Upload with: curl -X PUT --upload-file {} '<url>'", response.full_path);
    println!("{}", response.url);
    Ok(())
}
