//! Counter of spawned tasks that have not finished yet
//!
//! Each task holds an [`InFlightGuard`]; the count drops when the task
//! completes or is aborted. Waiting on the count never takes ownership of the
//! tasks, so a cancelled wait leaves them running.

use std::sync::Arc;

use tokio::sync::watch;

#[derive(Clone)]
pub(crate) struct InFlight(Arc<watch::Sender<usize>>);

pub(crate) struct InFlightGuard(Arc<watch::Sender<usize>>);

impl InFlight {
    pub(crate) fn new() -> Self {
        Self(Arc::new(watch::channel(0).0))
    }

    /// Count one more task; the returned guard must move into that task.
    pub(crate) fn enter(&self) -> InFlightGuard {
        self.0.send_modify(|count| *count += 1);
        InFlightGuard(self.0.clone())
    }

    #[cfg(test)]
    pub(crate) fn count(&self) -> usize {
        *self.0.borrow()
    }

    /// Resolves once at most `n` tasks are still running.
    pub(crate) async fn wait_at_most(&self, n: usize) {
        let mut rx = self.0.subscribe();
        // The sender lives in `self`, so the channel cannot close here.
        let _ = rx.wait_for(|count| *count <= n).await;
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.send_modify(|count| *count = count.saturating_sub(1));
    }
}
