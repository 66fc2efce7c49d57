//! Optimistic like toggling.
//!
//! The one place in the system where UI-visible state mutates before remote
//! confirmation. The local liked set flips first; the remote mutation (like
//! record plus derived counter) follows, and a failure reverts the flip and
//! surfaces the error for a generic retry prompt.
//!
//! Concurrent toggles on the same post from the same client are not debounced
//! here; the caller serializes them.

use std::sync::Arc;

use async_trait::async_trait;
use bson::doc;
use dashmap::DashSet;
use tracing::warn;

use crate::store::schemas::{LIKE_COLLECTION, POST_COLLECTION};
use crate::store::DocumentGateway;
use crate::types::Result;

/// Remote side of a like toggle. The gateway implements this; tests inject
/// doubles.
#[async_trait]
pub trait LikeStore: Send + Sync {
    /// Create the like record for `(post_id, user_id)`.
    async fn create_like(&self, post_id: &str, user_id: &str) -> Result<()>;

    /// Remove the like record for `(post_id, user_id)`.
    async fn remove_like(&self, post_id: &str, user_id: &str) -> Result<()>;

    /// Adjust the post's derived like counter.
    async fn adjust_like_count(&self, post_id: &str, delta: i64) -> Result<()>;
}

#[async_trait]
impl LikeStore for DocumentGateway {
    async fn create_like(&self, post_id: &str, user_id: &str) -> Result<()> {
        self.create(LIKE_COLLECTION, doc! { "postId": post_id, "userId": user_id })
            .await
            .map(|_| ())
    }

    async fn remove_like(&self, post_id: &str, user_id: &str) -> Result<()> {
        self.delete_matching(LIKE_COLLECTION, doc! { "postId": post_id, "userId": user_id })
            .await
            .map(|_| ())
    }

    async fn adjust_like_count(&self, post_id: &str, delta: i64) -> Result<()> {
        self.increment(POST_COLLECTION, post_id, "likes", delta).await
    }
}

/// Like toggling for one signed-in user.
pub struct LikeController {
    store: Arc<dyn LikeStore>,
    user_id: String,
    liked: DashSet<String>,
}

impl LikeController {
    pub fn new(store: Arc<dyn LikeStore>, user_id: impl Into<String>) -> Self {
        Self {
            store,
            user_id: user_id.into(),
            liked: DashSet::new(),
        }
    }

    /// Seed the local set, typically from a query of existing like records.
    pub fn seed(&self, post_ids: impl IntoIterator<Item = String>) {
        for id in post_ids {
            self.liked.insert(id);
        }
    }

    /// Current local state for a post.
    pub fn is_liked(&self, post_id: &str) -> bool {
        self.liked.contains(post_id)
    }

    /// Toggle the like state for a post.
    ///
    /// The local set flips before the first suspension point, so the UI sees
    /// the new state immediately. On remote failure the flip is reverted and
    /// the error returned; on success the local state is already correct and
    /// the new value is returned.
    pub async fn toggle(&self, post_id: &str) -> Result<bool> {
        let was_liked = self.liked.contains(post_id);

        // Optimistic transition
        if was_liked {
            self.liked.remove(post_id);
        } else {
            self.liked.insert(post_id.to_string());
        }

        let result = if was_liked {
            match self.store.remove_like(post_id, &self.user_id).await {
                Ok(()) => self.store.adjust_like_count(post_id, -1).await,
                Err(e) => Err(e),
            }
        } else {
            match self.store.create_like(post_id, &self.user_id).await {
                Ok(()) => self.store.adjust_like_count(post_id, 1).await,
                Err(e) => Err(e),
            }
        };

        match result {
            Ok(()) => Ok(!was_liked),
            Err(e) => {
                // Roll back to the pre-toggle state
                if was_liked {
                    self.liked.insert(post_id.to_string());
                } else {
                    self.liked.remove(post_id);
                }
                warn!(post_id = %post_id, error = %e, "Like toggle failed; reverted");
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::WayrestError;
    use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
    use std::sync::Mutex;

    /// Recording double: tracks record existence, net counter, and call log.
    #[derive(Default)]
    struct RecordingStore {
        fail: AtomicBool,
        net_count: AtomicI64,
        records: Mutex<Vec<(String, String)>>,
    }

    impl RecordingStore {
        fn set_offline(&self, offline: bool) {
            self.fail.store(offline, Ordering::SeqCst);
        }

        fn check_offline(&self) -> Result<()> {
            if self.fail.load(Ordering::SeqCst) {
                Err(WayrestError::RemoteUnavailable("offline".into()))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl LikeStore for RecordingStore {
        async fn create_like(&self, post_id: &str, user_id: &str) -> Result<()> {
            self.check_offline()?;
            self.records
                .lock()
                .unwrap()
                .push((post_id.to_string(), user_id.to_string()));
            Ok(())
        }

        async fn remove_like(&self, post_id: &str, user_id: &str) -> Result<()> {
            self.check_offline()?;
            self.records
                .lock()
                .unwrap()
                .retain(|(p, u)| p != post_id || u != user_id);
            Ok(())
        }

        async fn adjust_like_count(&self, _post_id: &str, delta: i64) -> Result<()> {
            self.check_offline()?;
            self.net_count.fetch_add(delta, Ordering::SeqCst);
            Ok(())
        }
    }

    fn controller() -> (LikeController, Arc<RecordingStore>) {
        let store = Arc::new(RecordingStore::default());
        let controller = LikeController::new(Arc::clone(&store) as Arc<dyn LikeStore>, "user-1");
        (controller, store)
    }

    #[tokio::test]
    async fn test_toggle_flips_and_persists() {
        let (controller, store) = controller();

        assert!(!controller.is_liked("P1"));
        assert!(controller.toggle("P1").await.unwrap());
        assert!(controller.is_liked("P1"));
        assert_eq!(store.net_count.load(Ordering::SeqCst), 1);
        assert_eq!(store.records.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_double_toggle_is_idempotent() {
        let (controller, store) = controller();

        assert!(controller.toggle("P1").await.unwrap());
        assert!(!controller.toggle("P1").await.unwrap());

        // Back where it started, remote counter nets to zero
        assert!(!controller.is_liked("P1"));
        assert_eq!(store.net_count.load(Ordering::SeqCst), 0);
        assert!(store.records.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_offline_toggle_reverts_local_state() {
        let (controller, store) = controller();
        store.set_offline(true);

        let result = controller.toggle("P1").await;
        assert!(matches!(result, Err(WayrestError::RemoteUnavailable(_))));

        // The optimistic flip was rolled back
        assert!(!controller.is_liked("P1"));
        assert_eq!(store.net_count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failed_unlike_restores_liked_state() {
        let (controller, store) = controller();

        assert!(controller.toggle("P1").await.unwrap());
        store.set_offline(true);

        assert!(controller.toggle("P1").await.is_err());
        assert!(controller.is_liked("P1"));
        assert_eq!(store.net_count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_seed_hydrates_local_set() {
        let (controller, _) = controller();
        controller.seed(vec!["P1".to_string(), "P2".to_string()]);
        assert!(controller.is_liked("P1"));
        assert!(controller.is_liked("P2"));
        assert!(!controller.is_liked("P3"));
    }
}
