//! Token verification port for real-time sessions.
//!
//! Verification is CPU-bound and synchronous, so the trait is dyn-safe and
//! shared as `Arc<dyn TokenVerifier>` by the transport layer.

use std::collections::HashMap;

use govhub_domain::error::{AuthenticationError, GovError};
use govhub_domain::id::UserId;

/// Verifies a client-supplied token and resolves the identity behind it.
pub trait TokenVerifier: Send + Sync {
    /// Resolve a token to a user.
    ///
    /// # Errors
    ///
    /// Returns [`GovError::Authentication`] when the token is unknown,
    /// expired, or malformed. The connection stays open for retry.
    fn verify(&self, token: &str) -> Result<UserId, GovError>;
}

/// Static token table, loaded from configuration at startup.
#[derive(Debug, Default)]
pub struct StaticTokenVerifier {
    tokens: HashMap<String, UserId>,
}

impl StaticTokenVerifier {
    #[must_use]
    pub fn new(tokens: HashMap<String, UserId>) -> Self {
        Self { tokens }
    }

    /// Add one token → user mapping.
    pub fn insert(&mut self, token: impl Into<String>, user: UserId) {
        self.tokens.insert(token.into(), user);
    }
}

impl TokenVerifier for StaticTokenVerifier {
    fn verify(&self, token: &str) -> Result<UserId, GovError> {
        self.tokens.get(token).copied().ok_or_else(|| {
            AuthenticationError {
                reason: "unknown token".to_string(),
            }
            .into()
        })
    }
}
