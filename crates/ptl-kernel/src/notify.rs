//! Single-slot wake notification.

use std::sync::{Condvar, Mutex};

/// Binary wake flag connecting a releasing task to exactly one waiter.
///
/// `give` latches the flag and `take` blocks until it is latched, then
/// consumes it. A `give` while the flag is already pending coalesces, so
/// a waiter can never observe more than one outstanding wakeup.
pub struct Notification {
    pending: Mutex<bool>,
    cond: Condvar,
}

impl Notification {
    pub fn new() -> Self {
        Self {
            pending: Mutex::new(false),
            cond: Condvar::new(),
        }
    }

    /// Latches the wake flag and wakes the waiter if it is blocked.
    pub fn give(&self) {
        let mut pending = self.pending.lock().expect("notification mutex poisoned");
        *pending = true;
        self.cond.notify_one();
    }

    /// Blocks until the flag is latched, then consumes it.
    pub fn take(&self) {
        let mut pending = self.pending.lock().expect("notification mutex poisoned");
        while !*pending {
            pending = self
                .cond
                .wait(pending)
                .expect("notification mutex poisoned");
        }
        *pending = false;
    }

    /// Consumes the flag if it is latched, without blocking.
    pub fn try_take(&self) -> bool {
        let mut pending = self.pending.lock().expect("notification mutex poisoned");
        let was_pending = *pending;
        *pending = false;
        was_pending
    }
}

impl Default for Notification {
    fn default() -> Self {
        Self::new()
    }
}
