//! Process-wide session store.
//!
//! A single mutable cell holding the current [`Session`], with synchronous
//! subscriber notification and durable persistence through the secure store.
//! Exactly one session is authoritative at a time; signing in through either
//! auth backend replaces whatever was there before.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::auth::BackendKind;
use crate::secure::{SecureStore, AUTH_SESSION_KEY};
use crate::types::{Result, WayrestError};

/// The authenticated user as seen by every gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthUser {
    pub id: String,
    pub email: String,
    pub name: String,
    #[serde(default)]
    pub email_verified: bool,
}

/// The active identity plus its opaque credential token.
///
/// A session always carries both a token and a user; "no session" is
/// `None` at the store level, so the token/user pairing invariant holds by
/// construction. The `backend` tag exists only so sign-out can be routed to
/// the backend that produced the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub identity_token: String,
    pub user: AuthUser,
    pub backend: BackendKind,
}

/// Which form the auth modal is showing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    SignIn,
    SignUp,
}

/// Presentation state for the auth modal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthModal {
    pub is_open: bool,
    pub mode: AuthMode,
}

impl Default for AuthModal {
    fn default() -> Self {
        Self { is_open: false, mode: AuthMode::SignIn }
    }
}

/// Handle returned by [`SessionStore::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriberId(u64);

type SessionCallback = Arc<dyn Fn(Option<&Session>) + Send + Sync>;

/// Process-wide holder of the current session.
///
/// All writes go through [`SessionStore::set_session`]. Notification runs
/// synchronously on the calling task; a reentrant `set_session` from inside a
/// subscriber callback is rejected with a logged warning to break
/// notification cycles.
pub struct SessionStore {
    current: RwLock<Option<Session>>,
    modal: Mutex<AuthModal>,
    subscribers: Mutex<Vec<(u64, SessionCallback)>>,
    next_subscriber: AtomicU64,
    notifying: AtomicBool,
    secure: Arc<SecureStore>,
}

impl SessionStore {
    pub fn new(secure: Arc<SecureStore>) -> Self {
        Self {
            current: RwLock::new(None),
            modal: Mutex::new(AuthModal::default()),
            subscribers: Mutex::new(Vec::new()),
            next_subscriber: AtomicU64::new(1),
            notifying: AtomicBool::new(false),
            secure,
        }
    }

    /// Replace the current session and notify subscribers.
    ///
    /// The new value is persisted to the secure store (or the stored value is
    /// cleared on `None`). Persistence failures are swallowed and logged:
    /// session state stays correct in memory even when the disk write fails.
    pub fn set_session(&self, session: Option<Session>) {
        if self.notifying.load(Ordering::SeqCst) {
            warn!("Reentrant set_session from a subscriber callback rejected");
            return;
        }

        {
            let mut current = self.current.write().unwrap_or_else(|e| e.into_inner());
            *current = session.clone();
        }

        let persist_result = match &session {
            Some(s) => serde_json::to_string(s)
                .map_err(|e| WayrestError::Storage(format!("Failed to serialize session: {e}")))
                .and_then(|json| self.secure.set(AUTH_SESSION_KEY, &json)),
            None => self.secure.delete(AUTH_SESSION_KEY),
        };
        if let Err(e) = persist_result {
            warn!(error = %e, "Failed to persist session; in-memory state unaffected");
        }

        let callbacks: Vec<SessionCallback> = {
            let subscribers = self.subscribers.lock().unwrap_or_else(|e| e.into_inner());
            subscribers.iter().map(|(_, cb)| Arc::clone(cb)).collect()
        };

        self.notifying.store(true, Ordering::SeqCst);
        for callback in callbacks {
            (*callback)(session.as_ref());
        }
        self.notifying.store(false, Ordering::SeqCst);
    }

    /// Current session value, no side effects.
    pub fn session(&self) -> Option<Session> {
        self.current
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Read the persisted session back from the secure store.
    ///
    /// Called once at process start, before any subscriber exists; it loads
    /// state rather than performing a transition, so nobody is notified.
    pub fn restore(&self) -> Result<Option<Session>> {
        let Some(json) = self.secure.get(AUTH_SESSION_KEY)? else {
            return Ok(None);
        };

        let session: Session = serde_json::from_str(&json)
            .map_err(|e| WayrestError::Storage(format!("Corrupt persisted session: {e}")))?;

        let mut current = self.current.write().unwrap_or_else(|e| e.into_inner());
        *current = Some(session.clone());
        Ok(Some(session))
    }

    /// Register a callback invoked on every `set_session`.
    pub fn subscribe(
        &self,
        callback: impl Fn(Option<&Session>) + Send + Sync + 'static,
    ) -> SubscriberId {
        let id = self.next_subscriber.fetch_add(1, Ordering::SeqCst);
        let mut subscribers = self.subscribers.lock().unwrap_or_else(|e| e.into_inner());
        subscribers.push((id, Arc::new(callback)));
        SubscriberId(id)
    }

    /// Remove a previously registered callback.
    pub fn unsubscribe(&self, id: SubscriberId) {
        let mut subscribers = self.subscribers.lock().unwrap_or_else(|e| e.into_inner());
        subscribers.retain(|(sub_id, _)| *sub_id != id.0);
    }

    /// Open the auth modal in the given mode.
    pub fn open_modal(&self, mode: AuthMode) {
        let mut modal = self.modal.lock().unwrap_or_else(|e| e.into_inner());
        *modal = AuthModal { is_open: true, mode };
    }

    /// Close the auth modal, keeping its last mode.
    pub fn close_modal(&self) {
        let mut modal = self.modal.lock().unwrap_or_else(|e| e.into_inner());
        modal.is_open = false;
    }

    /// Current modal presentation state.
    pub fn modal(&self) -> AuthModal {
        *self.modal.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::atomic::AtomicUsize;

    fn test_store() -> (Arc<SessionStore>, PathBuf) {
        let dir = std::env::temp_dir().join(format!("wayrest-session-{}", uuid::Uuid::new_v4()));
        let secure = Arc::new(SecureStore::open(&dir, [9u8; 32]).expect("open store"));
        (Arc::new(SessionStore::new(secure)), dir)
    }

    fn sample_session() -> Session {
        Session {
            identity_token: "token-abc".into(),
            user: AuthUser {
                id: "user-1".into(),
                email: "driver@example.com".into(),
                name: "Driver One".into(),
                email_verified: true,
            },
            backend: BackendKind::Managed,
        }
    }

    #[test]
    fn test_set_then_get_deep_equal() {
        let (store, dir) = test_store();
        let session = sample_session();

        store.set_session(Some(session.clone()));
        assert_eq!(store.session(), Some(session));

        store.set_session(None);
        assert_eq!(store.session(), None);

        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn test_subscribers_invoked_exactly_once() {
        let (store, dir) = test_store();
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&calls);
        store.subscribe(move |session| {
            assert!(session.is_some());
            counter.fetch_add(1, Ordering::SeqCst);
        });

        store.set_session(Some(sample_session()));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn test_unsubscribe_stops_notifications() {
        let (store, dir) = test_store();
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&calls);
        let id = store.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        store.set_session(Some(sample_session()));
        store.unsubscribe(id);
        store.set_session(None);

        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn test_reentrant_set_session_rejected() {
        let (store, dir) = test_store();

        let inner = Arc::clone(&store);
        store.subscribe(move |_| {
            // Attempt to start a notification cycle; must be a no-op.
            inner.set_session(None);
        });

        let session = sample_session();
        store.set_session(Some(session.clone()));
        assert_eq!(store.session(), Some(session));

        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn test_restore_reads_persisted_session() {
        let dir = std::env::temp_dir().join(format!("wayrest-session-{}", uuid::Uuid::new_v4()));
        let session = sample_session();

        {
            let secure = Arc::new(SecureStore::open(&dir, [9u8; 32]).unwrap());
            let store = SessionStore::new(secure);
            store.set_session(Some(session.clone()));
        }

        let secure = Arc::new(SecureStore::open(&dir, [9u8; 32]).unwrap());
        let store = SessionStore::new(secure);
        assert_eq!(store.session(), None);
        assert_eq!(store.restore().unwrap(), Some(session.clone()));
        assert_eq!(store.session(), Some(session));

        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn test_persistence_failure_keeps_memory_state() {
        let (store, dir) = test_store();
        // Remove the backing directory so the disk write fails.
        std::fs::remove_dir_all(&dir).unwrap();

        let session = sample_session();
        store.set_session(Some(session.clone()));
        assert_eq!(store.session(), Some(session));
    }

    #[test]
    fn test_modal_independent_of_session() {
        let (store, dir) = test_store();

        assert!(!store.modal().is_open);
        store.open_modal(AuthMode::SignUp);
        assert_eq!(store.modal(), AuthModal { is_open: true, mode: AuthMode::SignUp });

        store.set_session(Some(sample_session()));
        assert!(store.modal().is_open);

        store.close_modal();
        assert_eq!(store.modal(), AuthModal { is_open: false, mode: AuthMode::SignUp });

        let _ = std::fs::remove_dir_all(dir);
    }
}
