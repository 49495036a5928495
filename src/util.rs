// src/util.rs
use std::sync::atomic::{AtomicBool, Ordering};

/// A cheap one-shot stop signal shared across threads (publisher actor,
/// recovery server, supervisor watchdog).
pub struct BarrierFlag(AtomicBool);

impl Default for BarrierFlag {
    fn default() -> Self {
        Self(AtomicBool::new(false))
    }
}

impl BarrierFlag {
    #[inline]
    pub fn raise(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
    #[inline]
    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}
