//! Shared error and result types for Wayrest.
//!
//! Every public operation in the crate returns [`Result`]. Gateways never let
//! a raw transport error reach the UI layer: errors are categorized here at
//! the boundary where they occur, and anything uncategorizable becomes
//! [`WayrestError::Unknown`].

use thiserror::Error;

/// Crate-wide error type, one variant per failure category.
#[derive(Debug, Error)]
pub enum WayrestError {
    /// Input rejected client-side, before any network call
    #[error("Validation error: {0}")]
    Validation(String),

    /// A document or profile that was asked for does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Document store operation failed
    #[error("Document store error: {0}")]
    Database(String),

    /// Direct-credential backend (Postgres) operation failed
    #[error("SQL backend error: {0}")]
    Sql(String),

    /// REST gateway received a non-success response
    #[error("HTTP error: {0}")]
    Http(String),

    /// Network or connection failure before a response arrived
    #[error("Remote unavailable: {0}")]
    RemoteUnavailable(String),

    /// A required key or connection string has not been configured
    #[error("Not configured: {0}")]
    Unconfigured(String),

    /// Secure store read/write/decrypt failure
    #[error("Secure storage error: {0}")]
    Storage(String),

    /// Authentication subsystem failure
    #[error("Auth error: {0}")]
    Auth(String),

    /// Anything uncategorized
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, WayrestError>;
