//! Authentication for Wayrest.
//!
//! Two mutually incompatible backends behind one session contract:
//!
//! - [`ManagedAuthBackend`]: delegates credential verification to an external
//!   identity provider over REST
//! - [`DirectAuthBackend`]: verifies credentials against relational tables it
//!   queries directly
//!
//! The backend is selected once at configuration time. Both write the same
//! [`crate::session::Session`] shape to the session store on success, so
//! everything downstream is backend-agnostic.

pub mod direct;
pub mod error;
pub mod managed;
pub mod password;

pub use direct::{DirectAuthBackend, DirectProfile};
pub use error::AuthError;
pub use managed::ManagedAuthBackend;
pub use password::{hash_password, verify_password};

use async_trait::async_trait;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::session::Session;
use crate::types::Result;

/// Which auth backend produced a session. Used only for sign-out routing and
/// configuration selection; nothing else may branch on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Managed identity provider (Backend A)
    Managed,
    /// Direct-credential relational backend (Backend B)
    Direct,
}

/// Outcome of a sign-in or sign-up attempt.
///
/// Expected failures (wrong password, duplicate email, ...) are values, not
/// errors: UI layers branch on the variant instead of catching exceptions.
/// Backends convert unexpected internal failures into [`AuthOutcome::Rejected`]
/// with a generic message before returning.
#[derive(Debug, Clone)]
pub enum AuthOutcome {
    Authenticated(Session),
    Rejected { error: String },
}

impl AuthOutcome {
    pub fn rejected(error: impl Into<String>) -> Self {
        Self::Rejected { error: error.into() }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated(_))
    }

    /// The user-facing failure message, if this is a rejection.
    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Rejected { error } => Some(error),
            Self::Authenticated(_) => None,
        }
    }
}

/// Common capability set of both auth backends.
#[async_trait]
pub trait AuthBackend: Send + Sync {
    /// Create an account and sign the new user in.
    async fn sign_up(&self, email: &str, password: &str, name: &str) -> AuthOutcome;

    /// Verify credentials and sign the user in.
    async fn sign_in(&self, email: &str, password: &str) -> AuthOutcome;

    /// Clear the current session and any backend-local cached handles.
    async fn sign_out(&self) -> Result<()>;

    /// Restore a persisted session at process start.
    ///
    /// Returns whether a session produced by this backend was restored. A
    /// persisted session from the other backend is discarded: sessions are
    /// never merged across backends.
    async fn restore_session(&self) -> Result<bool>;

    /// The session currently held by the session store.
    fn current_session(&self) -> Option<Session>;

    fn kind(&self) -> BackendKind;
}

/// Client-side credential validation shared by both backends.
///
/// Runs before any network or database call; a `Some` return is the
/// user-facing rejection message.
pub(crate) fn validate_credentials(email: &str, password: &str) -> Option<String> {
    if email.trim().is_empty() || password.is_empty() {
        return Some("Email and password are required".to_string());
    }
    if !email.contains('@') {
        return Some(AuthError::InvalidEmail.message().to_string());
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_credentials() {
        assert!(validate_credentials("driver@example.com", "secret1").is_none());
        assert!(validate_credentials("", "secret1").is_some());
        assert!(validate_credentials("driver@example.com", "").is_some());
        assert_eq!(
            validate_credentials("not-an-email", "secret1").as_deref(),
            Some("Invalid email address")
        );
    }

    #[test]
    fn test_outcome_accessors() {
        let rejected = AuthOutcome::rejected("nope");
        assert!(!rejected.is_authenticated());
        assert_eq!(rejected.error(), Some("nope"));
    }
}
