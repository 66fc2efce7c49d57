//! Direct-credential backend (Backend B).
//!
//! Performs its own credential checks against relational tables it queries
//! directly (`auth_users`, `auth_accounts`, `user_profiles`). All statements
//! are parameterized; passwords are stored as salted argon2 hashes and
//! verified with [`crate::auth::verify_password`].
//!
//! Failure messages are deliberately generic: a failed lookup and a failed
//! credential check are indistinguishable to the caller, and the missing-user
//! path burns one hash so the two paths cost about the same.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, PgPool, Row};
use tokio::sync::{Mutex, RwLock};
use tracing::{error, info, warn};

use crate::auth::{
    hash_password, validate_credentials, verify_password, AuthBackend, AuthOutcome, BackendKind,
};
use crate::secure::{SecureStore, DIRECT_DATABASE_URL_KEY, DIRECT_EMAIL_KEY, DIRECT_USER_ID_KEY};
use crate::session::{AuthUser, Session, SessionStore};
use crate::types::{Result, WayrestError};

/// Marker token for direct-backend sessions. The direct backend has no token
/// service; the session invariant only needs the token to exist.
const DIRECT_SESSION_TOKEN: &str = "direct-session";

/// Auth backend that checks credentials straight against Postgres.
pub struct DirectAuthBackend {
    database_url: Option<String>,
    /// Lazily established pool; cleared on sign-out
    pool: RwLock<Option<PgPool>>,
    /// Prevents concurrent connection attempts
    connecting: Mutex<()>,
    secure: Arc<SecureStore>,
    sessions: Arc<SessionStore>,
}

impl DirectAuthBackend {
    pub fn new(
        database_url: Option<String>,
        secure: Arc<SecureStore>,
        sessions: Arc<SessionStore>,
    ) -> Self {
        Self {
            database_url,
            pool: RwLock::new(None),
            connecting: Mutex::new(()),
            secure,
            sessions,
        }
    }

    /// Establish the connection (if configured) and restore any persisted
    /// session. Returns whether the database is reachable.
    pub async fn initialize(&self) -> Result<bool> {
        match self.get_pool().await {
            Ok(_) => {
                let _ = self.restore_session().await?;
                Ok(true)
            }
            Err(WayrestError::Unconfigured(msg)) => {
                info!(reason = %msg, "Direct backend disabled");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Get or create the connection pool.
    async fn get_pool(&self) -> Result<PgPool> {
        // Fast path
        {
            let pool = self.pool.read().await;
            if let Some(ref p) = *pool {
                return Ok(p.clone());
            }
        }

        let _lock = self.connecting.lock().await;

        // Double-check after acquiring the lock
        {
            let pool = self.pool.read().await;
            if let Some(ref p) = *pool {
                return Ok(p.clone());
            }
        }

        let url = match &self.database_url {
            Some(url) => url.clone(),
            None => self
                .secure
                .get(DIRECT_DATABASE_URL_KEY)?
                .ok_or_else(|| {
                    WayrestError::Unconfigured("Direct backend connection string is absent".into())
                })?,
        };

        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await
            .map_err(|e| WayrestError::Sql(format!("Failed to connect: {e}")))?;

        sqlx::query("SELECT 1")
            .execute(&pool)
            .await
            .map_err(|e| WayrestError::Sql(format!("Connection test failed: {e}")))?;

        info!("Direct backend connected");

        let mut slot = self.pool.write().await;
        *slot = Some(pool.clone());
        Ok(pool)
    }

    async fn try_sign_in(&self, email: &str, password: &str) -> Result<AuthOutcome> {
        let pool = self.get_pool().await?;

        let user = sqlx::query(
            r#"SELECT id::text AS id, name, email FROM auth_users WHERE email = $1"#,
        )
        .bind(email)
        .fetch_optional(&pool)
        .await
        .map_err(|e| WayrestError::Sql(format!("User lookup failed: {e}")))?;

        let Some(user) = user else {
            // Burn one hash so this path costs the same as a failed verify
            let _ = hash_password(password);
            return Ok(AuthOutcome::rejected("User not found"));
        };

        let user_id: String = user
            .try_get("id")
            .map_err(|e| WayrestError::Sql(format!("Malformed user row: {e}")))?;
        let name: Option<String> = user
            .try_get("name")
            .map_err(|e| WayrestError::Sql(format!("Malformed user row: {e}")))?;

        let account = sqlx::query(
            r#"SELECT password FROM auth_accounts WHERE "userId"::text = $1 AND provider = $2"#,
        )
        .bind(&user_id)
        .bind("credentials")
        .fetch_optional(&pool)
        .await
        .map_err(|e| WayrestError::Sql(format!("Account lookup failed: {e}")))?;

        let Some(account) = account else {
            return Ok(AuthOutcome::rejected("Invalid credentials"));
        };

        let stored_hash: String = account
            .try_get("password")
            .map_err(|e| WayrestError::Sql(format!("Malformed account row: {e}")))?;

        if !verify_password(password, &stored_hash)? {
            return Ok(AuthOutcome::rejected("Invalid credentials"));
        }

        self.persist_identity(&user_id, email);
        let session = self.establish_session(user_id, email, name);
        Ok(AuthOutcome::Authenticated(session))
    }

    async fn try_sign_up(&self, email: &str, password: &str, name: &str) -> Result<AuthOutcome> {
        let pool = self.get_pool().await?;

        // Reject duplicates before any insert so a failure here leaves no
        // partial rows
        let existing = sqlx::query(r#"SELECT id FROM auth_users WHERE email = $1"#)
            .bind(email)
            .fetch_optional(&pool)
            .await
            .map_err(|e| WayrestError::Sql(format!("User lookup failed: {e}")))?;

        if existing.is_some() {
            return Ok(AuthOutcome::rejected("User already exists"));
        }

        let password_hash = hash_password(password)?;

        // user row -> account row -> profile row, all-or-nothing
        let mut tx = pool
            .begin()
            .await
            .map_err(|e| WayrestError::Sql(format!("Failed to begin transaction: {e}")))?;

        let user = sqlx::query(
            r#"INSERT INTO auth_users (name, email) VALUES ($1, $2)
               RETURNING id::text AS id, name, email"#,
        )
        .bind(name)
        .bind(email)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| WayrestError::Sql(format!("User insert failed: {e}")))?;

        let user_id: String = user
            .try_get("id")
            .map_err(|e| WayrestError::Sql(format!("Malformed user row: {e}")))?;

        sqlx::query(
            r#"INSERT INTO auth_accounts ("userId", provider, type, "providerAccountId", password)
               VALUES ($1, $2, $3, $4, $5)"#,
        )
        .bind(&user_id)
        .bind("credentials")
        .bind("credentials")
        .bind(&user_id)
        .bind(&password_hash)
        .execute(&mut *tx)
        .await
        .map_err(|e| WayrestError::Sql(format!("Account insert failed: {e}")))?;

        sqlx::query(r#"INSERT INTO user_profiles (user_id, name) VALUES ($1, $2)"#)
            .bind(&user_id)
            .bind(name)
            .execute(&mut *tx)
            .await
            .map_err(|e| WayrestError::Sql(format!("Profile insert failed: {e}")))?;

        tx.commit()
            .await
            .map_err(|e| WayrestError::Sql(format!("Commit failed: {e}")))?;

        info!(user_id = %user_id, "Direct sign up succeeded");

        self.persist_identity(&user_id, email);
        let session = self.establish_session(user_id, email, Some(name.to_string()));
        Ok(AuthOutcome::Authenticated(session))
    }

    /// Fetch the relational profile for the signed-in user.
    pub async fn get_profile(&self) -> Result<DirectProfile> {
        let session = self
            .sessions
            .session()
            .ok_or_else(|| WayrestError::Auth("Not authenticated".into()))?;

        let pool = self.get_pool().await?;

        let row = sqlx::query(
            r#"SELECT up.user_id::text AS user_id, up.name, up.quick_dial_number,
                      up.preferences::text AS preferences, up.streak_count, up.total_points,
                      up.created_at, up.updated_at, au.email
               FROM user_profiles up
               JOIN auth_users au ON up.user_id = au.id
               WHERE up.user_id::text = $1"#,
        )
        .bind(&session.user.id)
        .fetch_optional(&pool)
        .await
        .map_err(|e| WayrestError::Sql(format!("Profile lookup failed: {e}")))?;

        let row = row.ok_or_else(|| WayrestError::NotFound("Profile not found".into()))?;

        DirectProfile::from_row(&row)
    }

    /// Write the direct-backend identity keys; failures only log since the
    /// in-memory session stays correct.
    fn persist_identity(&self, user_id: &str, email: &str) {
        if let Err(e) = self.secure.set(DIRECT_USER_ID_KEY, user_id) {
            warn!(error = %e, "Failed to persist direct user id");
        }
        if let Err(e) = self.secure.set(DIRECT_EMAIL_KEY, email) {
            warn!(error = %e, "Failed to persist direct user email");
        }
    }

    fn establish_session(&self, user_id: String, email: &str, name: Option<String>) -> Session {
        let session = Session {
            identity_token: DIRECT_SESSION_TOKEN.to_string(),
            user: AuthUser {
                id: user_id,
                email: email.to_string(),
                name: name.unwrap_or_default(),
                email_verified: false,
            },
            backend: BackendKind::Direct,
        };
        self.sessions.set_session(Some(session.clone()));
        session
    }
}

/// Profile row from the relational store, joined with the user's email.
#[derive(Debug, Clone)]
pub struct DirectProfile {
    pub user_id: String,
    pub name: Option<String>,
    pub email: String,
    pub quick_dial_number: Option<String>,
    /// JSON preference blob, passed through verbatim
    pub preferences: Option<String>,
    pub streak_count: Option<i32>,
    pub total_points: Option<i32>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl DirectProfile {
    fn from_row(row: &sqlx::postgres::PgRow) -> Result<Self> {
        let field = |e| WayrestError::Sql(format!("Malformed profile row: {e}"));
        Ok(Self {
            user_id: row.try_get("user_id").map_err(field)?,
            name: row.try_get("name").map_err(field)?,
            email: row.try_get("email").map_err(field)?,
            quick_dial_number: row.try_get("quick_dial_number").map_err(field)?,
            preferences: row.try_get("preferences").map_err(field)?,
            streak_count: row.try_get("streak_count").map_err(field)?,
            total_points: row.try_get("total_points").map_err(field)?,
            created_at: row.try_get("created_at").map_err(field)?,
            updated_at: row.try_get("updated_at").map_err(field)?,
        })
    }
}

#[async_trait]
impl AuthBackend for DirectAuthBackend {
    async fn sign_up(&self, email: &str, password: &str, name: &str) -> AuthOutcome {
        if let Some(message) = validate_credentials(email, password) {
            return AuthOutcome::rejected(message);
        }
        match self.try_sign_up(email, password, name).await {
            Ok(outcome) => outcome,
            Err(WayrestError::Unconfigured(_)) => {
                AuthOutcome::rejected("Direct database access is not configured")
            }
            Err(e) => {
                error!(error = %e, "Direct sign up failed unexpectedly");
                AuthOutcome::rejected("Registration failed")
            }
        }
    }

    async fn sign_in(&self, email: &str, password: &str) -> AuthOutcome {
        if let Some(message) = validate_credentials(email, password) {
            return AuthOutcome::rejected(message);
        }
        match self.try_sign_in(email, password).await {
            Ok(outcome) => outcome,
            Err(WayrestError::Unconfigured(_)) => {
                AuthOutcome::rejected("Direct database access is not configured")
            }
            Err(e) => {
                error!(error = %e, "Direct sign in failed unexpectedly");
                AuthOutcome::rejected("Authentication failed")
            }
        }
    }

    async fn sign_out(&self) -> Result<()> {
        for key in [DIRECT_USER_ID_KEY, DIRECT_EMAIL_KEY] {
            if let Err(e) = self.secure.delete(key) {
                warn!(key = %key, error = %e, "Failed to clear identity key");
            }
        }

        self.sessions.set_session(None);

        // Drop the cached connection handle; the next sign-in reconnects
        let mut pool = self.pool.write().await;
        *pool = None;

        info!("Signed out");
        Ok(())
    }

    async fn restore_session(&self) -> Result<bool> {
        match self.sessions.restore()? {
            Some(session) if session.backend == BackendKind::Direct => Ok(true),
            Some(_) => {
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
        BackendKind::Direct
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_backend(dir: &std::path::Path, url: Option<String>) -> (DirectAuthBackend, Arc<SessionStore>, Arc<SecureStore>) {
        let secure = Arc::new(SecureStore::open(dir, [5u8; 32]).unwrap());
        let sessions = Arc::new(SessionStore::new(Arc::clone(&secure)));
        let backend = DirectAuthBackend::new(url, Arc::clone(&secure), Arc::clone(&sessions));
        (backend, sessions, secure)
    }

    #[tokio::test]
    async fn test_validation_runs_before_any_database_call() {
        let dir = std::env::temp_dir().join(format!("wayrest-direct-{}", uuid::Uuid::new_v4()));
        let (backend, _, _) = test_backend(&dir, None);

        let outcome = backend.sign_in("driver@example.com", "").await;
        assert_eq!(outcome.error(), Some("Email and password are required"));

        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn test_unconfigured_backend_rejects_cleanly() {
        let dir = std::env::temp_dir().join(format!("wayrest-direct-{}", uuid::Uuid::new_v4()));
        let (backend, _, _) = test_backend(&dir, None);

        let outcome = backend.sign_in("driver@example.com", "secret1").await;
        assert_eq!(outcome.error(), Some("Direct database access is not configured"));
        assert!(backend.initialize().await.is_ok());

        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn test_sign_out_clears_identity_and_session() {
        let dir = std::env::temp_dir().join(format!("wayrest-direct-{}", uuid::Uuid::new_v4()));
        let (backend, sessions, secure) = test_backend(&dir, None);

        secure.set(DIRECT_USER_ID_KEY, "user-9").unwrap();
        secure.set(DIRECT_EMAIL_KEY, "driver@example.com").unwrap();
        let session = backend.establish_session("user-9".into(), "driver@example.com", None);
        assert_eq!(sessions.session(), Some(session));

        backend.sign_out().await.unwrap();

        assert_eq!(sessions.session(), None);
        assert!(secure.get(DIRECT_USER_ID_KEY).unwrap().is_none());
        assert!(secure.get(DIRECT_EMAIL_KEY).unwrap().is_none());

        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn test_restore_discards_managed_session() {
        let dir = std::env::temp_dir().join(format!("wayrest-direct-{}", uuid::Uuid::new_v4()));
        let (backend, sessions, _) = test_backend(&dir, None);

        sessions.set_session(Some(Session {
            identity_token: "provider-token".into(),
            user: AuthUser {
                id: "u1".into(),
                email: "d@example.com".into(),
                name: "D".into(),
                email_verified: true,
            },
            backend: BackendKind::Managed,
        }));

        assert!(!backend.restore_session().await.unwrap());
        assert_eq!(sessions.session(), None);

        let _ = std::fs::remove_dir_all(dir);
    }
}
