//! Application context.
//!
//! One instance of every service, constructed at startup and handed out as
//! `Arc`s. No module-level singletons; tests can stand up isolated contexts
//! and doubles.

use std::sync::Arc;

use tracing::{info, warn};

use crate::advocacy::AdvocacyService;
use crate::api::ApiClient;
use crate::auth::{AuthBackend, BackendKind, DirectAuthBackend, ManagedAuthBackend};
use crate::community::CommunityService;
use crate::config::Config;
use crate::likes::{LikeController, LikeStore};
use crate::secure::SecureStore;
use crate::session::SessionStore;
use crate::store::DocumentGateway;

/// Everything the UI layer consumes, wired once per process.
pub struct AppContext {
    pub config: Config,
    pub secure: Arc<SecureStore>,
    pub sessions: Arc<SessionStore>,
    pub documents: Arc<DocumentGateway>,
    pub api: Arc<ApiClient>,
    pub auth: Arc<dyn AuthBackend>,
    pub community: Arc<CommunityService>,
    pub advocacy: Arc<AdvocacyService>,
}

impl AppContext {
    /// Construct the full context: secure store, session store, document
    /// gateway, REST client, and the configured auth backend.
    pub async fn init(config: Config) -> anyhow::Result<Self> {
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("Configuration error: {e}"))?;
        let master_key = config
            .secure_store_key()
            .map_err(|e| anyhow::anyhow!("Configuration error: {e}"))?;

        let secure = Arc::new(SecureStore::open(&config.secure_store_dir, master_key)?);
        let sessions = Arc::new(SessionStore::new(Arc::clone(&secure)));

        let documents = Arc::new(
            DocumentGateway::connect(&config.mongodb_uri, &config.mongodb_db).await?,
        );
        if let Err(e) = documents.ensure_indexes().await {
            warn!(error = %e, "Failed to apply document store indexes");
        }

        let api = Arc::new(ApiClient::new(
            config.api_base_url.clone(),
            config.request_timeout_ms,
            Arc::clone(&secure),
        ));

        let auth: Arc<dyn AuthBackend> = match config.auth_backend {
            BackendKind::Managed => Arc::new(ManagedAuthBackend::new(
                config.identity_url.clone(),
                config.identity_api_key.clone().unwrap_or_default(),
                config.request_timeout_ms,
                Arc::clone(&sessions),
                Arc::clone(&documents),
            )),
            BackendKind::Direct => Arc::new(DirectAuthBackend::new(
                config.database_url.clone(),
                Arc::clone(&secure),
                Arc::clone(&sessions),
            )),
        };

        // Pick up whatever identity survived the last run
        match auth.restore_session().await {
            Ok(true) => info!("Persisted session restored"),
            Ok(false) => {}
            Err(e) => warn!(error = %e, "Failed to restore persisted session"),
        }

        let community = Arc::new(CommunityService::new(Arc::clone(&documents)));
        let advocacy = Arc::new(AdvocacyService::new(Arc::clone(&documents)));

        info!(backend = ?config.auth_backend, "App context initialized");

        Ok(Self {
            config,
            secure,
            sessions,
            documents,
            api,
            auth,
            community,
            advocacy,
        })
    }

    /// Like controller for the signed-in user, or `None` when signed out.
    pub fn like_controller(&self) -> Option<LikeController> {
        let session = self.sessions.session()?;
        let store: Arc<dyn LikeStore> = Arc::clone(&self.documents) as Arc<dyn LikeStore>;
        Some(LikeController::new(store, session.user.id))
    }
}
