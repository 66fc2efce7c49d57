//! Managed identity provider backend (Backend A).
//!
//! Delegates credential verification to an external identity toolkit over
//! REST. On success the backend additionally upserts a profile document into
//! the document store keyed by the provider user id, so community and
//! advocacy features can attribute content by display name.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bson::doc;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::auth::{validate_credentials, AuthBackend, AuthError, AuthOutcome, BackendKind};
use crate::session::{AuthUser, Session, SessionStore};
use crate::store::schemas::{UserProfileDoc, USER_COLLECTION};
use crate::store::DocumentGateway;
use crate::types::{Result, WayrestError};

/// Auth backend delegating to a managed identity provider.
pub struct ManagedAuthBackend {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    sessions: Arc<SessionStore>,
    documents: Arc<DocumentGateway>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CredentialRequest<'a> {
    email: &'a str,
    password: &'a str,
    return_secure_token: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UpdateProfileRequest<'a> {
    id_token: &'a str,
    display_name: &'a str,
    return_secure_token: bool,
}

/// Successful provider response for signUp / signInWithPassword.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ProviderUser {
    id_token: String,
    local_id: String,
    email: String,
    display_name: String,
    email_verified: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ProviderErrorBody {
    error: ProviderErrorDetail,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ProviderErrorDetail {
    message: String,
}

impl ManagedAuthBackend {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout_ms: u64,
        sessions: Arc<SessionStore>,
        documents: Arc<DocumentGateway>,
    ) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()
            .unwrap_or_default();

        Self {
            http,
            base_url: base_url.into(),
            api_key: api_key.into(),
            sessions,
            documents,
        }
    }

    /// Issue one provider call. A transport failure is a provider rejection
    /// (`NetworkError`), not an internal error: the caller always gets a
    /// branchable result.
    async fn provider_call<T, B>(
        &self,
        operation: &str,
        body: &B,
    ) -> Result<std::result::Result<T, AuthError>>
    where
        T: DeserializeOwned,
        B: Serialize,
    {
        let url = format!(
            "{}/accounts:{}?key={}",
            self.base_url.trim_end_matches('/'),
            operation,
            self.api_key
        );

        let response = match self.http.post(&url).json(body).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(operation = %operation, error = %e, "Identity provider unreachable");
                return Ok(Err(AuthError::NetworkError));
            }
        };

        if response.status().is_success() {
            let parsed = response
                .json::<T>()
                .await
                .map_err(|e| WayrestError::Http(format!("Malformed provider response: {e}")))?;
            return Ok(Ok(parsed));
        }

        let body = response
            .json::<ProviderErrorBody>()
            .await
            .unwrap_or_default();
        Ok(Err(AuthError::from_provider_code(&body.error.message)))
    }

    async fn try_sign_up(&self, email: &str, password: &str, name: &str) -> Result<AuthOutcome> {
        let request = CredentialRequest { email, password, return_secure_token: true };
        let user = match self
            .provider_call::<ProviderUser, _>("signUp", &request)
            .await?
        {
            Ok(user) => user,
            Err(err) => return Ok(AuthOutcome::rejected(err.message())),
        };

        let display_name = effective_name(name, email);

        // Set the display name on the provider account; the session is valid
        // without it, so failures only log.
        let update = UpdateProfileRequest {
            id_token: &user.id_token,
            display_name: &display_name,
            return_secure_token: false,
        };
        match self
            .provider_call::<serde_json::Value, _>("update", &update)
            .await
        {
            Ok(Ok(_)) => {}
            Ok(Err(err)) => warn!(error = %err.message(), "Failed to set provider display name"),
            Err(e) => warn!(error = %e, "Failed to set provider display name"),
        }

        // Attribute content downstream; store failures degrade with a log.
        let profile = doc! {
            "uid": &user.local_id,
            "email": &user.email,
            "name": &display_name,
            "emailVerified": user.email_verified,
        };
        if let Err(e) = self
            .documents
            .upsert(USER_COLLECTION, doc! { "uid": &user.local_id }, profile)
            .await
        {
            warn!(uid = %user.local_id, error = %e, "Failed to upsert profile document");
        }

        let session = self.build_session(user, display_name, email);
        info!(user_id = %session.user.id, "Sign up succeeded");
        self.sessions.set_session(Some(session.clone()));
        Ok(AuthOutcome::Authenticated(session))
    }

    async fn try_sign_in(&self, email: &str, password: &str) -> Result<AuthOutcome> {
        let request = CredentialRequest { email, password, return_secure_token: true };
        let user = match self
            .provider_call::<ProviderUser, _>("signInWithPassword", &request)
            .await?
        {
            Ok(user) => user,
            Err(err) => return Ok(AuthOutcome::rejected(err.message())),
        };

        // Merge the stored display name; a store failure degrades to the
        // provider-supplied name.
        let mut name = user.display_name.clone();
        match self
            .documents
            .find_one::<UserProfileDoc>(USER_COLLECTION, doc! { "uid": &user.local_id })
            .await
        {
            Ok(Some(profile)) if !profile.name.is_empty() => name = profile.name,
            Ok(_) => {}
            Err(e) => {
                warn!(uid = %user.local_id, error = %e, "Failed to load profile document");
            }
        }
        let name = effective_name(&name, email);

        let session = self.build_session(user, name, email);
        info!(user_id = %session.user.id, "Sign in succeeded");
        self.sessions.set_session(Some(session.clone()));
        Ok(AuthOutcome::Authenticated(session))
    }

    fn build_session(&self, user: ProviderUser, name: String, fallback_email: &str) -> Session {
        let email = if user.email.is_empty() {
            fallback_email.to_string()
        } else {
            user.email
        };

        Session {
            identity_token: user.id_token,
            user: AuthUser {
                id: user.local_id,
                email,
                name,
                email_verified: user.email_verified,
            },
            backend: BackendKind::Managed,
        }
    }
}

/// The display name to attribute content by: the given name, or the local
/// part of the email when none was provided.
fn effective_name(name: &str, email: &str) -> String {
    let name = name.trim();
    if !name.is_empty() {
        return name.to_string();
    }
    let local = email.split('@').next().unwrap_or("");
    if local.is_empty() {
        "Driver".to_string()
    } else {
        local.to_string()
    }
}

#[async_trait]
impl AuthBackend for ManagedAuthBackend {
    async fn sign_up(&self, email: &str, password: &str, name: &str) -> AuthOutcome {
        if let Some(message) = validate_credentials(email, password) {
            return AuthOutcome::rejected(message);
        }
        match self.try_sign_up(email, password, name).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(error = %e, "Sign up failed unexpectedly");
                AuthOutcome::rejected(AuthError::Unknown.message())
            }
        }
    }

    async fn sign_in(&self, email: &str, password: &str) -> AuthOutcome {
        if let Some(message) = validate_credentials(email, password) {
            return AuthOutcome::rejected(message);
        }
        match self.try_sign_in(email, password).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(error = %e, "Sign in failed unexpectedly");
                AuthOutcome::rejected(AuthError::Unknown.message())
            }
        }
    }

    async fn sign_out(&self) -> Result<()> {
        self.sessions.set_session(None);
        info!("Signed out");
        Ok(())
    }

    async fn restore_session(&self) -> Result<bool> {
        match self.sessions.restore()? {
            Some(session) if session.backend == BackendKind::Managed => Ok(true),
            Some(_) => {
                // A session produced by the other backend is never honored
                self.sessions.set_session(None);
                Ok(false)
            }
            None => Ok(false),
        }
    }

    fn current_session(&self) -> Option<Session> {
        self.sessions.session()
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Managed
    }
}
