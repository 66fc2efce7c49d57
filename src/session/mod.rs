//! Session state for Wayrest.
//!
//! Holds the current authenticated identity and the auth-modal presentation
//! state, with subscribe/notify semantics for UI consumers.

pub mod store;

pub use store::{AuthMode, AuthModal, AuthUser, Session, SessionStore, SubscriberId};
