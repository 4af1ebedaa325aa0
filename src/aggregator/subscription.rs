use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Handle over the polling tasks of one `subscribe` call
///
/// Dropping it aborts the tasks. `unsubscribe` additionally waits for them
/// to finish, so no callback can run once it returns.
pub struct Subscription {
    active: Arc<AtomicBool>,
    handles: Vec<JoinHandle<()>>,
}

impl Subscription {
    pub(crate) fn new(active: Arc<AtomicBool>, handles: Vec<JoinHandle<()>>) -> Self {
        Subscription { active, handles }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    pub fn task_count(&self) -> usize {
        self.handles.len()
    }

    pub async fn unsubscribe(mut self) {
        self.active.store(false, Ordering::SeqCst);

        for handle in self.handles.drain(..) {
            handle.abort();
            // Cancelled is the expected outcome
            if let Err(e) = handle.await {
                if e.is_panic() {
                    tracing::error!(error = %e, "Polling task panicked");
                }
            }
        }
        tracing::debug!("Subscription cancelled");
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.active.store(false, Ordering::SeqCst);
        for handle in &self.handles {
            handle.abort();
        }
    }
}
