//! Synchronization wrapper shared by the workspace crates.

pub use std::sync::Arc;

pub type MutexGuard<'a, T> = std::sync::MutexGuard<'a, T>;

/// Mutex that treats poisoning as fatal.
///
/// A poisoned lock means a task panicked while holding scheduler state,
/// which is not a recoverable situation in a real-time system.
pub struct Mutex<T> {
    inner: std::sync::Mutex<T>,
}

impl<T> Mutex<T> {
    /// Creates a new mutex protecting the given value.
    pub fn new(value: T) -> Self {
        Self {
            inner: std::sync::Mutex::new(value),
        }
    }

    /// Acquires the mutex, blocking until it becomes available.
    ///
    /// # Panics
    ///
    /// Panics if the mutex has been poisoned by a panicking thread.
    pub fn lock(&self) -> MutexGuard<'_, T> {
        self.inner.lock().expect("mutex poisoned")
    }
}

impl<T: Default> Default for Mutex<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}
