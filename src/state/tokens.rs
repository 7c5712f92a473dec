//! Token Ledger
//!
//! Durable mapping from opaque bearer token to trust tier and expiry.
//! Expired rows are evicted lazily, by the first lookup that notices them.

use chrono::{DateTime, Duration, TimeZone, Utc};
use rusqlite::{params, OptionalExtension};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::db::Database;
use crate::error::{Error, Result};

/// Trust tier of a bearer token.
///
/// Ordered so that `Private > Global`: a private token can do everything a
/// global one can.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Global,
    Private,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Global => "global",
            Tier::Private => "private",
        }
    }

    /// Whether a token of this tier may perform an operation requiring `required`
    pub fn satisfies(&self, required: Tier) -> bool {
        *self >= required
    }

    /// Tier an operation needs given its `is_private` flag
    pub fn required_for(is_private: bool) -> Tier {
        if is_private {
            Tier::Private
        } else {
            Tier::Global
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Tier {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "global" => Ok(Tier::Global),
            "private" => Ok(Tier::Private),
            other => Err(Error::Database(format!("unknown token tier: {}", other))),
        }
    }
}

/// An issued token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Token {
    pub token: String,
    pub tier: Tier,
    pub expires_at: DateTime<Utc>,
}

/// Durable token storage
#[derive(Debug, Clone)]
pub struct TokenLedger {
    db: Database,
    lifetime: Duration,
}

impl TokenLedger {
    /// Create a ledger issuing tokens valid for `lifetime`
    pub fn new(db: Database, lifetime: Duration) -> Self {
        Self { db, lifetime }
    }

    /// Lifetime given to newly issued tokens
    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    /// Issue a fresh token of the given tier
    pub fn issue(&self, tier: Tier) -> Result<Token> {
        self.issue_at(tier, Utc::now())
    }

    /// Issue a token as if the current time were `now`
    pub fn issue_at(&self, tier: Tier, now: DateTime<Utc>) -> Result<Token> {
        let token = Token {
            token: Uuid::new_v4().to_string(),
            tier,
            expires_at: now + self.lifetime,
        };

        let conn = self.db.connect()?;
        conn.execute(
            "INSERT INTO tokens (token, tier, expires_at, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                token.token,
                tier.as_str(),
                token.expires_at.timestamp_millis(),
                now.timestamp_millis()
            ],
        )?;

        tracing::info!("Issued {} token, expires {}", tier, token.expires_at);
        Ok(token)
    }

    /// Resolve a token to its tier
    pub fn resolve(&self, token: &str) -> Result<Tier> {
        self.resolve_at(token, Utc::now())
    }

    /// Resolve a token as if the current time were `now`.
    ///
    /// An expired token is deleted before `Expired` is returned, so later
    /// lookups of the same string report `Unauthenticated`.
    pub fn resolve_at(&self, token: &str, now: DateTime<Utc>) -> Result<Tier> {
        let conn = self.db.connect()?;
        let row: Option<(String, i64)> = conn
            .query_row(
                "SELECT tier, expires_at FROM tokens WHERE token = ?1",
                params![token],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let (tier, expires_at) = match row {
            Some(r) => r,
            None => return Err(Error::Unauthenticated),
        };

        if expires_at < now.timestamp_millis() {
            conn.execute("DELETE FROM tokens WHERE token = ?1", params![token])?;
            tracing::info!("Evicted expired token (expired {})", millis_to_utc(expires_at));
            return Err(Error::Expired);
        }

        tier.parse()
    }

    /// Delete a token if it exists. Returns whether a row was removed.
    pub fn revoke(&self, token: &str) -> Result<bool> {
        let conn = self.db.connect()?;
        let deleted = conn.execute("DELETE FROM tokens WHERE token = ?1", params![token])?;
        Ok(deleted > 0)
    }

    /// Delete every token that expired before `now`
    pub fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let conn = self.db.connect()?;
        let deleted = conn.execute(
            "DELETE FROM tokens WHERE expires_at < ?1",
            params![now.timestamp_millis()],
        )?;
        Ok(deleted as u64)
    }

    /// Number of stored tokens, live or not
    pub fn count(&self) -> Result<u64> {
        let conn = self.db.connect()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM tokens", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

fn millis_to_utc(millis: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(millis)
        .single()
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use tempfile::{tempdir, TempDir};

    fn ledger() -> (TempDir, TokenLedger) {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path()).unwrap();
        (dir, TokenLedger::new(db, Duration::days(30)))
    }

    #[test]
    fn test_tier_ordering() {
        assert!(Tier::Private.satisfies(Tier::Private));
        assert!(Tier::Private.satisfies(Tier::Global));
        assert!(Tier::Global.satisfies(Tier::Global));
        assert!(!Tier::Global.satisfies(Tier::Private));
        assert_eq!(Tier::required_for(true), Tier::Private);
        assert_eq!(Tier::required_for(false), Tier::Global);
    }

    #[test]
    fn test_issue_then_resolve_keeps_tier() {
        let (_dir, ledger) = ledger();
        for tier in [Tier::Global, Tier::Private] {
            let token = ledger.issue(tier).unwrap();
            assert_eq!(token.tier, tier);
            assert_eq!(ledger.resolve(&token.token).unwrap(), tier);
        }
    }

    #[test]
    fn test_expiry_set_from_lifetime() {
        let (_dir, ledger) = ledger();
        let now = Utc::now();
        let token = ledger.issue_at(Tier::Global, now).unwrap();
        assert_eq!(token.expires_at, now + Duration::days(30));
    }

    #[test]
    fn test_unknown_token_is_unauthenticated() {
        let (_dir, ledger) = ledger();
        assert!(matches!(ledger.resolve("nope"), Err(Error::Unauthenticated)));
    }

    #[test]
    fn test_expired_reported_once_then_unknown() {
        let (_dir, ledger) = ledger();
        let issued_at = Utc::now() - Duration::days(31);
        let token = ledger.issue_at(Tier::Private, issued_at).unwrap();

        assert!(matches!(ledger.resolve(&token.token), Err(Error::Expired)));
        assert_eq!(ledger.count().unwrap(), 0);
        for _ in 0..3 {
            assert!(matches!(ledger.resolve(&token.token), Err(Error::Unauthenticated)));
        }
    }

    #[test]
    fn test_resolve_does_not_extend_expiry() {
        let (_dir, ledger) = ledger();
        let issued_at = Utc::now();
        let token = ledger.issue_at(Tier::Global, issued_at).unwrap();

        let almost = issued_at + Duration::days(29);
        assert_eq!(ledger.resolve_at(&token.token, almost).unwrap(), Tier::Global);

        let after = issued_at + Duration::days(30) + Duration::seconds(1);
        assert!(matches!(ledger.resolve_at(&token.token, after), Err(Error::Expired)));
    }

    #[test]
    fn test_tokens_are_independent() {
        let (_dir, ledger) = ledger();
        let a = ledger.issue(Tier::Global).unwrap();
        let b = ledger.issue(Tier::Global).unwrap();
        assert_ne!(a.token, b.token);

        assert!(ledger.revoke(&a.token).unwrap());
        assert!(matches!(ledger.resolve(&a.token), Err(Error::Unauthenticated)));
        assert_eq!(ledger.resolve(&b.token).unwrap(), Tier::Global);
    }

    #[test]
    fn test_revoke_twice_is_noop() {
        let (_dir, ledger) = ledger();
        let token = ledger.issue(Tier::Private).unwrap();
        assert!(ledger.revoke(&token.token).unwrap());
        assert!(!ledger.revoke(&token.token).unwrap());
    }

    #[test]
    fn test_purge_expired() {
        let (_dir, ledger) = ledger();
        let now = Utc::now();
        ledger.issue_at(Tier::Global, now - Duration::days(40)).unwrap();
        ledger.issue_at(Tier::Private, now - Duration::days(35)).unwrap();
        let live = ledger.issue_at(Tier::Global, now).unwrap();

        assert_eq!(ledger.purge_expired(now).unwrap(), 2);
        assert_eq!(ledger.count().unwrap(), 1);
        assert_eq!(ledger.resolve(&live.token).unwrap(), Tier::Global);
    }

    #[test]
    fn test_concurrent_issuance_is_unique() {
        let (_dir, ledger) = ledger();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let ledger = ledger.clone();
                std::thread::spawn(move || {
                    (0..25)
                        .map(|_| ledger.issue(Tier::Global).unwrap().token)
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for token in handle.join().unwrap() {
                assert!(seen.insert(token));
            }
        }
        assert_eq!(ledger.count().unwrap(), 200);
    }

    #[test]
    fn test_racing_eviction_never_succeeds() {
        let (_dir, ledger) = ledger();
        let token = ledger
            .issue_at(Tier::Global, Utc::now() - Duration::days(31))
            .unwrap()
            .token;

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let ledger = ledger.clone();
                let token = token.clone();
                std::thread::spawn(move || ledger.resolve(&token))
            })
            .collect();

        for handle in handles {
            let result = handle.join().unwrap();
            assert!(matches!(result, Err(Error::Expired) | Err(Error::Unauthenticated)));
        }
        assert_eq!(ledger.count().unwrap(), 0);
    }
}
