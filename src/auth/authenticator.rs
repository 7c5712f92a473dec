//! Authenticator
//!
//! Exchanges passwords for tokens. Each login surface is bound to exactly
//! one password and only ever issues that password's tier.

use subtle::ConstantTimeEq;

use crate::error::{CredentialRejection, Error, Result};
use crate::state::{ConfigKey, CredentialStore, Tier, Token, TokenLedger};

/// Password-for-token exchange
#[derive(Debug, Clone)]
pub struct Authenticator {
    credentials: CredentialStore,
    ledger: TokenLedger,
}

impl Authenticator {
    pub fn new(credentials: CredentialStore, ledger: TokenLedger) -> Self {
        Self { credentials, ledger }
    }

    /// Public site login. Issues a `global` token for the site password.
    ///
    /// The private password is refused here with its own rejection so the
    /// caller can be pointed at the private login instead.
    pub fn login_global(&self, password: &str) -> Result<Token> {
        if matches(password, &self.credentials.get(ConfigKey::SitePassword)) {
            return self.ledger.issue(Tier::Global);
        }

        let rejection = if matches(password, &self.credentials.get(ConfigKey::PrivatePassword)) {
            CredentialRejection::UsePrivateLogin
        } else {
            CredentialRejection::WrongPassword
        };
        tracing::info!("Global login rejected: {:?}", rejection);
        Err(Error::BadCredential(rejection))
    }

    /// Private space login. Only the private password is considered.
    pub fn login_private(&self, password: &str) -> Result<Token> {
        if matches(password, &self.credentials.get(ConfigKey::PrivatePassword)) {
            return self.ledger.issue(Tier::Private);
        }

        tracing::info!("Private login rejected");
        Err(Error::BadCredential(CredentialRejection::WrongPrivatePassword))
    }
}

fn matches(offered: &str, expected: &str) -> bool {
    offered.as_bytes().ct_eq(expected.as_bytes()).into()
}
