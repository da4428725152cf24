//! The operational-state latch (§9: "Global `is_operational` flag ... a
//! monotonic latch that can only be set back to true by explicit
//! reinitialization, preventing silent recovery after a safety freeze").

use std::sync::atomic::{AtomicBool, Ordering};

pub struct OperationalLatch {
    operational: AtomicBool,
}

impl Default for OperationalLatch {
    fn default() -> Self {
        Self { operational: AtomicBool::new(false) }
    }
}

impl OperationalLatch {
    pub fn is_operational(&self) -> bool {
        self.operational.load(Ordering::SeqCst)
    }

    /// Trips the latch. Returns `true` if this call is the one that flipped
    /// it (so the caller emits `operational_state_changed(false)` exactly once).
    pub fn trip(&self) -> bool {
        self.operational.swap(false, Ordering::SeqCst)
    }

    /// Explicit manual reinitialization: the only path back to operational.
    pub fn reinitialize(&self) {
        self.operational.store(true, Ordering::SeqCst);
    }
}
