//! Logging initialization.
//!
//! Structured tracing with an environment-driven filter. The embedding
//! application calls this once before constructing the app context.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over the configured level. Safe to call only
/// once per process.
pub fn init_tracing(log_level: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("wayrest={log_level},info").into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
