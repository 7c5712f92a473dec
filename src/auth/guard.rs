//! Access Guard
//!
//! Resolves an inbound token to a tier and checks it against the tier the
//! operation requires. Lookups may evict an expired token as a side effect.

use crate::error::{Error, Result};
use crate::state::{Tier, TokenLedger};

/// Tier check in front of every protected operation
#[derive(Debug, Clone)]
pub struct AccessGuard {
    ledger: TokenLedger,
}

impl AccessGuard {
    pub fn new(ledger: TokenLedger) -> Self {
        Self { ledger }
    }

    /// Authorize `token` for an operation needing `required`.
    ///
    /// Returns the token's own tier on success.
    pub fn authorize(&self, token: Option<&str>, required: Tier) -> Result<Tier> {
        let token = match token.map(str::trim) {
            Some(t) if !t.is_empty() => t,
            _ => return Err(Error::Unauthenticated),
        };

        let tier = self.ledger.resolve(token)?;
        if !tier.satisfies(required) {
            tracing::warn!("Rejected {} token for {} operation", tier, required);
            return Err(Error::Forbidden);
        }
        Ok(tier)
    }

    /// Revoke the presented token after checking it is still valid
    pub fn logout(&self, token: Option<&str>) -> Result<()> {
        self.authorize(token, Tier::Global)?;
        if let Some(t) = token {
            self.ledger.revoke(t.trim())?;
        }
        Ok(())
    }
}
