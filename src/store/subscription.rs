//! Live subscription handle.
//!
//! A subscription owns the background task that watches a collection and
//! re-delivers snapshots. The consuming context must tear it down explicitly
//! when it goes away; dropping the handle also stops the task so an abandoned
//! subscription cannot leak its channel.

use tokio::task::JoinHandle;

/// Handle to an active collection subscription.
pub struct Subscription {
    handle: JoinHandle<()>,
}

impl Subscription {
    pub(crate) fn new(handle: JoinHandle<()>) -> Self {
        Self { handle }
    }

    /// Stop watching. No further snapshots are delivered after this returns.
    pub fn unsubscribe(self) {
        self.handle.abort();
    }

    /// Whether the watch task is still running.
    pub fn is_active(&self) -> bool {
        !self.handle.is_finished()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
