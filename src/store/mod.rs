//! Document store access for Wayrest.
//!
//! Typed CRUD and live-subscription access to the community collections
//! (posts, likes, comments, advocacy messages, user profiles), plus derived
//! counter maintenance.

pub mod filter;
pub mod gateway;
pub mod schemas;
pub mod subscription;

pub use filter::ListFilter;
pub use gateway::DocumentGateway;
pub use subscription::Subscription;
