//! Single-session guard.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Allows at most one install session at a time.
#[derive(Debug, Clone, Default)]
pub struct SessionGuard {
    active: Arc<AtomicBool>,
}

impl SessionGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the guard, or `None` if a session is already running.
    pub fn try_acquire(&self) -> Option<ActiveSession> {
        self.active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| ActiveSession {
                active: Arc::clone(&self.active),
                released: false,
            })
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}

/// Proof that the guard is held. Released explicitly or on drop.
#[derive(Debug)]
pub struct ActiveSession {
    active: Arc<AtomicBool>,
    released: bool,
}

impl ActiveSession {
    pub fn release(&mut self) {
        if !self.released {
            self.active.store(false, Ordering::Release);
            self.released = true;
        }
    }
}

impl Drop for ActiveSession {
    fn drop(&mut self) {
        self.release();
    }
}
