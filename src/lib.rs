//! Wayrest - data synchronization and session layer
//!
//! Wayrest reconciles a locally optimistic UI state against remote stores for
//! a driver-wellness and community application, under two mutually
//! incompatible authentication backends unified behind one session contract.
//!
//! ## Services
//!
//! - **Session**: process-wide identity cell with subscribe/notify and
//!   durable persistence
//! - **Auth**: managed identity-provider backend and direct-credential
//!   Postgres backend behind one trait
//! - **Store**: document CRUD, derived counters, and live subscriptions
//! - **Likes**: optimistic like toggling with explicit rollback
//! - **Api**: authenticated REST client for profiles, fatigue checks,
//!   wellness, and parking
//! - **Community / Advocacy**: typed services over the document store

pub mod advocacy;
pub mod api;
pub mod app;
pub mod auth;
pub mod community;
pub mod config;
pub mod likes;
pub mod logging;
pub mod secure;
pub mod session;
pub mod store;
pub mod types;

pub use app::AppContext;
pub use config::Config;
pub use types::{Result, WayrestError};
