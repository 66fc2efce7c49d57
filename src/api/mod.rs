//! Secondary REST backend access.
//!
//! Authenticated JSON-over-HTTP client for the profile, fatigue-check,
//! wellness, and parking endpoints, the surface where the document store is
//! not authoritative.

pub mod client;
pub mod types;

pub use client::ApiClient;
pub use types::QueryOptions;
