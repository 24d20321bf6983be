//! Hooks for counting what the engine does.
//!
//! The node implements this on its Prometheus metrics; tests and tools use
//! [`NoopObserver`].

pub trait BroadcastObserver: Send + Sync {
    fn claim_completed(&self) {}

    fn claim_failed(&self) {}

    /// A status write failed and is about to be retried.
    fn status_write_retried(&self) {}

    /// A poll cycle finished after selecting `pending` claims.
    fn cycle_finished(&self, _pending: usize) {}
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NoopObserver;

impl BroadcastObserver for NoopObserver {}
