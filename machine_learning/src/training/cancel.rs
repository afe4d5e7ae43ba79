use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

/// A flag shared between a training run and whoever wants to stop it.
///
/// The trainer checks it between batches, so a run never stops in the middle of a step.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}
