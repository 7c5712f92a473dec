//! NingDrive - Personal File Drive Backend
//!
//! Serves the drive API and provides local administration of the
//! password and token store.

use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ningdrive::api::{AppState, HttpServer};
use ningdrive::auth::{AccessGuard, Authenticator};
use ningdrive::config::DriveConfig;
use ningdrive::drive::DriveService;
use ningdrive::error::Result;
use ningdrive::state::{ConfigKey, CredentialStore, Database, TokenLedger};
use ningdrive::storage::{MemoryStore, ObjectStore, S3Store};

/// NingDrive - Personal File Drive Backend
#[derive(Parser)]
#[command(name = "ningdrive")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to configuration file (optional, environment overrides it)
    #[arg(short, long, default_value = "ningdrive.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error); defaults to the config value
    #[arg(short, long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the API server
    Start {
        /// Keep objects in memory instead of talking to the object store
        #[arg(long)]
        memory: bool,
    },

    /// Initialize a new configuration file
    Init {
        /// Output path for configuration file
        #[arg(short, long, default_value = "ningdrive.toml")]
        output: PathBuf,
    },

    /// Validate configuration
    Validate,

    /// Change a stored password (reads the new value from stdin if omitted)
    Passwd {
        /// Which password: site or private
        key: ConfigKey,

        /// New password
        #[arg(long)]
        value: Option<String>,
    },

    /// Delete expired tokens from the token table
    PurgeTokens,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = DriveConfig::load(Some(&cli.config));
    let level = cli
        .log_level
        .clone()
        .or_else(|| config.as_ref().ok().map(|c| c.logging.level.clone()))
        .unwrap_or_else(|| "info".to_string());

    // Initialize logging
    init_logging(&level);

    match cli.command {
        Commands::Init { output } => run_init(output),
        Commands::Validate => run_validate(config),
        Commands::Start { memory } => run_start(config?, memory).await,
        Commands::Passwd { key, value } => run_passwd(config?, key, value),
        Commands::PurgeTokens => run_purge(config?),
    }
}

/// Initialize logging
fn init_logging(level: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| level.into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Open the state database and make sure both passwords exist
fn open_state(config: &DriveConfig) -> Result<(CredentialStore, TokenLedger)> {
    let db = match Database::open(&config.server.data_dir) {
        Ok(db) => db,
        Err(e) => {
            tracing::error!("Failed to open state database in {:?}: {}", config.server.data_dir, e);
            return Err(e);
        }
    };

    let credentials = CredentialStore::new(db.clone(), &config.auth);
    if let Err(e) = credentials.ensure_seeded() {
        tracing::error!("Failed to seed credentials: {}", e);
        return Err(e);
    }

    let ledger = TokenLedger::new(db, config.auth.token_lifetime());
    Ok((credentials, ledger))
}

/// Start the API server
async fn run_start(config: DriveConfig, memory: bool) -> Result<()> {
    tracing::info!("Starting NingDrive...");

    let (credentials, ledger) = open_state(&config)?;
    tracing::info!("State database ready at {:?}", config.database_path());

    let store: Arc<dyn ObjectStore> = if memory {
        tracing::warn!("Using in-memory object store; nothing will be persisted");
        Arc::new(MemoryStore::new(&config.storage.endpoint_url(), &config.storage.bucket))
    } else {
        Arc::new(S3Store::new(&config.storage)?)
    };

    let drive = DriveService::from_config(store, &config.storage);

    // Storage may come up after us; listing degrades until it does
    match drive.store().ensure_bucket().await {
        Ok(()) => tracing::info!("Bucket {} ready", config.storage.bucket),
        Err(e) => tracing::warn!("Could not ensure bucket {}: {}", config.storage.bucket, e),
    }

    if drive.rewrites_urls() {
        tracing::info!(
            "Rewriting storage URLs to {}",
            config.storage.external_url.as_deref().unwrap_or_default()
        );
    } else {
        tracing::info!("Storage URLs are passed through unchanged");
    }
    tracing::info!("Tokens are valid for {} days", ledger.lifetime().num_days());

    let server = HttpServer::new(
        config.server.clone(),
        AppState {
            authenticator: Authenticator::new(credentials, ledger.clone()),
            guard: AccessGuard::new(ledger),
            drive,
        },
    );

    server.start().await?;

    tracing::info!("NingDrive shutdown complete");
    Ok(())
}

/// Initialize configuration file
fn run_init(output: PathBuf) -> Result<()> {
    let config_content = r#"# NingDrive Configuration
# Environment variables (MINIO_*, EXTERNAL_URL, SITE_PASSWORD, ...) override these values.

[server]
bind_address = "0.0.0.0:8000"
data_dir = "/var/lib/ningdrive"
cors_enabled = true

[storage]
endpoint = "minio:9000"
secure = false
access_key = "ningguru"
secret_key = "12345678"
bucket = "ningguru-files"
region = "us-east-1"
# external_url = "http://203.0.113.7:8080/minio-api"
presign_ttl_secs = 3600
public_direct_urls = true

[auth]
# Seed values, only used the first time the state database is created
site_password = "admin"
private_password = "private"
token_lifetime_days = 30

[logging]
level = "info"
"#;

    std::fs::write(&output, config_content)?;
    println!("Configuration file created: {}", output.display());
    println!("\nEdit the file to configure storage and default passwords.");
    println!("Then start with: ningdrive --config {} start", output.display());

    Ok(())
}

/// Validate configuration
fn run_validate(config: Result<DriveConfig>) -> Result<()> {
    match config {
        Ok(config) => {
            println!("✓ Configuration is valid");
            println!("  Bind Address:  {}", config.server.bind_address);
            println!("  State DB:      {}", config.database_path().display());
            println!("  Storage:       {}/{}", config.storage.endpoint_url(), config.storage.bucket);
            println!(
                "  External URL:  {}",
                config.storage.external_url.as_deref().unwrap_or("(none)")
            );
            println!("  Token Expiry:  {} days", config.auth.token_lifetime_days);
            Ok(())
        }
        Err(e) => {
            eprintln!("✗ Configuration error: {}", e);
            Err(e)
        }
    }
}

/// Change a stored password
fn run_passwd(config: DriveConfig, key: ConfigKey, value: Option<String>) -> Result<()> {
    let value = match value {
        Some(v) => v,
        None => {
            eprintln!("New value for {}:", key);
            let mut line = String::new();
            std::io::stdin().lock().read_line(&mut line)?;
            line.trim_end_matches(['\r', '\n']).to_string()
        }
    };

    let (credentials, _) = open_state(&config)?;
    credentials.set(key, &value)?;

    let other = match key {
        ConfigKey::SitePassword => ConfigKey::PrivatePassword,
        ConfigKey::PrivatePassword => ConfigKey::SitePassword,
    };
    if credentials.get(other) == value {
        tracing::warn!("{} now equals {}; the private login hint will never trigger", key, other);
    }

    println!("Updated {}", key);
    Ok(())
}

/// Delete expired tokens
fn run_purge(config: DriveConfig) -> Result<()> {
    let (_, ledger) = open_state(&config)?;
    let purged = ledger.purge_expired(Utc::now())?;
    let remaining = ledger.count()?;
    tracing::info!("Purged {} expired tokens", purged);
    println!("Purged {} expired tokens, {} remaining", purged, remaining);
    Ok(())
}
