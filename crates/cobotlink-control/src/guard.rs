//! Single-flight execution guard for the physical actuator.
//!
//! The guard carries two bits in one atomic word: whether new motion may be
//! admitted (`OPEN`) and whether a motion run currently owns the actuator
//! (`HELD`). Acquisition is a single compare-and-swap from "open and idle" to
//! "open and held", so concurrent callers can never both succeed. Closing the
//! guard never touches `HELD`; a run that was admitted before the close keeps
//! ownership until it releases.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;
use tracing::{debug, warn};

const OPEN: u8 = 0b01;
const HELD: u8 = 0b10;

/// Single-flight exclusion primitive.
#[derive(Debug, Default)]
pub struct ExecutionGuard {
    state: AtomicU8,
    idle: Notify,
}

impl ExecutionGuard {
    /// Create a closed, idle guard.
    pub fn new() -> Self {
        Self::default()
    }

    /// Try to take ownership of the actuator.
    ///
    /// Succeeds only when the guard is open and nobody holds it. A failed
    /// attempt leaves the guard unchanged and must not be followed by
    /// [`release`](Self::release).
    pub fn try_acquire(&self) -> bool {
        self.state
            .compare_exchange(OPEN, OPEN | HELD, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Like [`try_acquire`](Self::try_acquire), returning a permit that
    /// releases the guard when dropped.
    pub fn try_permit(self: &Arc<Self>) -> Option<GuardPermit> {
        self.try_acquire().then(|| GuardPermit {
            guard: Arc::clone(self),
        })
    }

    /// Give up ownership and wake anyone waiting for the guard to go idle.
    pub fn release(&self) {
        let previous = self.state.fetch_and(!HELD, Ordering::AcqRel);
        if previous & HELD == 0 {
            warn!("Execution guard released while not held");
        }
        self.idle.notify_waiters();
    }

    /// Admit new motion.
    pub fn open(&self) {
        let previous = self.state.fetch_or(OPEN, Ordering::AcqRel);
        debug!(held = previous & HELD != 0, "Execution guard opened");
    }

    /// Stop admitting new motion. A run already holding the guard is not
    /// affected.
    pub fn close(&self) {
        let previous = self.state.fetch_and(!OPEN, Ordering::AcqRel);
        debug!(held = previous & HELD != 0, "Execution guard closed");
    }

    /// Check if new motion would currently be admitted.
    pub fn is_open(&self) -> bool {
        self.state.load(Ordering::Acquire) & OPEN != 0
    }

    /// Check if a motion run currently holds the guard.
    pub fn is_held(&self) -> bool {
        self.state.load(Ordering::Acquire) & HELD != 0
    }

    /// Check if a [`try_acquire`](Self::try_acquire) would succeed right now.
    pub fn is_available(&self) -> bool {
        self.state.load(Ordering::Acquire) == OPEN
    }

    /// Wait until no motion run holds the guard.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            tokio::pin!(notified);
            // Register before checking so a release between the check and the
            // await is not missed.
            notified.as_mut().enable();
            if !self.is_held() {
                return;
            }
            notified.await;
        }
    }
}

/// Ownership of the actuator for one motion run.
#[derive(Debug)]
#[must_use = "dropping the permit releases the guard"]
pub struct GuardPermit {
    guard: Arc<ExecutionGuard>,
}

impl Drop for GuardPermit {
    fn drop(&mut self) {
        self.guard.release();
    }
}
