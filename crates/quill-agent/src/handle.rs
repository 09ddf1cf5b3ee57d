//! A cloneable handle for interrupting the session from other tasks.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

/// A cloneable handle for interrupting the session.
///
/// All fields are `Arc`-wrapped, so cloning is cheap. The token is replaced
/// at the start of every round, so an interrupt only affects the work in
/// progress.
#[derive(Clone)]
pub struct SessionHandle {
    cancel: Arc<Mutex<CancellationToken>>,
    busy: Arc<AtomicBool>,
}

impl SessionHandle {
    pub(crate) fn new() -> Self {
        Self {
            cancel: Arc::new(Mutex::new(CancellationToken::new())),
            busy: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Interrupt the current stream or command.
    ///
    /// Returns `false` when the session was idle and nothing was interrupted.
    pub fn interrupt(&self) -> bool {
        if !self.is_busy() {
            return false;
        }
        self.cancel.lock().cancel();
        true
    }

    /// Whether a turn is being processed.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    pub(crate) fn set_busy(&self, busy: bool) {
        self.busy.store(busy, Ordering::Release);
    }

    /// Install and return a fresh token.
    pub(crate) fn renew(&self) -> CancellationToken {
        let token = CancellationToken::new();
        *self.cancel.lock() = token.clone();
        token
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interrupt_only_when_busy() {
        let handle = SessionHandle::new();
        let token = handle.renew();
        assert!(!handle.interrupt());
        assert!(!token.is_cancelled());

        handle.set_busy(true);
        assert!(handle.clone().interrupt());
        assert!(token.is_cancelled());

        let fresh = handle.renew();
        assert!(!fresh.is_cancelled());
    }
}
