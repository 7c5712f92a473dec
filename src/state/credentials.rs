//! Credential Store
//!
//! Durable key/value rows holding the two login passwords. Rows are seeded
//! once from configured defaults and only ever overwritten afterwards.

use rusqlite::{params, OptionalExtension};

use super::db::Database;
use crate::config::AuthConfig;
use crate::error::{Error, Result};

/// Known configuration keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigKey {
    /// Password for the public site login
    SitePassword,
    /// Password for the private space login
    PrivatePassword,
}

impl ConfigKey {
    /// All known keys, in seeding order
    pub const ALL: [ConfigKey; 2] = [ConfigKey::SitePassword, ConfigKey::PrivatePassword];

    /// Column value used in the `config` table
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigKey::SitePassword => "site_password",
            ConfigKey::PrivatePassword => "private_password",
        }
    }
}

impl std::str::FromStr for ConfigKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "site_password" | "site" | "global" => Ok(ConfigKey::SitePassword),
            "private_password" | "private" => Ok(ConfigKey::PrivatePassword),
            other => Err(Error::Config(format!("unknown config key: {}", other))),
        }
    }
}

impl std::fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Durable password storage with default fallback
#[derive(Debug, Clone)]
pub struct CredentialStore {
    db: Database,
    site_default: String,
    private_default: String,
}

impl CredentialStore {
    /// Create a store whose defaults come from the auth configuration
    pub fn new(db: Database, auth: &AuthConfig) -> Self {
        Self {
            db,
            site_default: auth.site_password.clone(),
            private_default: auth.private_password.clone(),
        }
    }

    /// Default value for a key
    pub fn default_for(&self, key: ConfigKey) -> &str {
        match key {
            ConfigKey::SitePassword => &self.site_default,
            ConfigKey::PrivatePassword => &self.private_default,
        }
    }

    /// Insert defaults for every key that has no row yet
    pub fn ensure_seeded(&self) -> Result<()> {
        let conn = self.db.connect()?;
        for key in ConfigKey::ALL {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO config (key, value) VALUES (?1, ?2)",
                params![key.as_str(), self.default_for(key)],
            )?;
            if inserted > 0 {
                tracing::info!("Seeded {} from defaults", key);
            }
        }
        Ok(())
    }

    /// Read the stored value, `None` when the row is absent
    pub fn try_get(&self, key: ConfigKey) -> Result<Option<String>> {
        let conn = self.db.connect()?;
        let value = conn
            .query_row(
                "SELECT value FROM config WHERE key = ?1",
                params![key.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    /// Current value, falling back to the default when absent or unreadable
    pub fn get(&self, key: ConfigKey) -> String {
        match self.try_get(key) {
            Ok(Some(value)) => value,
            Ok(None) => self.default_for(key).to_string(),
            Err(e) => {
                tracing::warn!("Credential store unavailable, using default for {}: {}", key, e);
                self.default_for(key).to_string()
            }
        }
    }

    /// Overwrite a value
    pub fn set(&self, key: ConfigKey, value: &str) -> Result<()> {
        if value.is_empty() {
            return Err(Error::Config(format!("{} cannot be empty", key)));
        }
        let conn = self.db.connect()?;
        conn.execute(
            r#"
            INSERT INTO config (key, value) VALUES (?1, ?2)
            ON CONFLICT(key) DO UPDATE SET value = ?2
            "#,
            params![key.as_str(), value],
        )?;
        tracing::info!("Updated {}", key);
        Ok(())
    }
}
