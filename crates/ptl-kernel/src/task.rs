//! Task creation and deletion on top of `std::thread`.
//!
//! A kernel task is a named OS thread with a recorded priority and a
//! cancellation token. Deletion is rendered as cancellation: `delete`
//! trips the token and detaches the thread, and the task unwinds off its
//! stack at its next cancellation point. The unwind payload is a private
//! sentinel that the thread root swallows, so a deleted task simply
//! disappears without running any of its remaining job code.

use std::cell::RefCell;
use std::fmt;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

/// Sentinel unwind payload carrying a deleted task off its stack.
struct Killed;

thread_local! {
    static CURRENT: RefCell<Option<CancelToken>> = const { RefCell::new(None) };
}

/// Cancellation flag shared between a task and its owner.
#[derive(Clone)]
pub struct CancelToken {
    canceled: Arc<AtomicBool>,
}

impl CancelToken {
    fn new() -> Self {
        Self {
            canceled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn cancel(&self) {
        self.canceled.store(true, Ordering::Release);
    }

    pub fn is_canceled(&self) -> bool {
        self.canceled.load(Ordering::Acquire)
    }

    /// Unwinds the calling thread if the token has been tripped.
    ///
    /// `resume_unwind` is used instead of a panic so the panic hook stays
    /// quiet; deletion is a normal kernel operation, not a fault.
    pub fn check(&self) {
        if self.is_canceled() {
            panic::resume_unwind(Box::new(Killed));
        }
    }
}

/// Cancellation point for the calling task.
///
/// Long-running job code reaches this through [`crate::burn::burn`]; a
/// thread that is not a kernel task passes through untouched.
pub fn cancel_point() {
    CURRENT.with(|current| {
        if let Some(token) = &*current.borrow() {
            token.check();
        }
    });
}

/// Errors surfaced by task creation.
#[derive(Debug)]
pub enum TaskError {
    Spawn(io::Error),
}

impl fmt::Display for TaskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Spawn(err) => write!(f, "task spawn failed: {err}"),
        }
    }
}

impl std::error::Error for TaskError {}

impl From<io::Error> for TaskError {
    fn from(value: io::Error) -> Self {
        Self::Spawn(value)
    }
}

/// Handle to a spawned kernel task.
pub struct TaskHandle {
    priority: u8,
    token: CancelToken,
}

impl TaskHandle {
    /// Spawns a detached task thread.
    ///
    /// The body receives the task's own cancellation token. Stack sizes
    /// below the platform minimum are rounded up by the host.
    pub fn spawn<F>(
        name: &str,
        stack_size: usize,
        priority: u8,
        body: F,
    ) -> Result<TaskHandle, TaskError>
    where
        F: FnOnce(CancelToken) + Send + 'static,
    {
        let token = CancelToken::new();
        let task_token = token.clone();

        thread::Builder::new()
            .name(name.to_owned())
            .stack_size(stack_size)
            .spawn(move || {
                CURRENT.with(|current| *current.borrow_mut() = Some(task_token.clone()));
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| body(task_token)));
                if let Err(payload) = outcome {
                    if !payload.is::<Killed>() {
                        panic::resume_unwind(payload);
                    }
                }
            })?;

        Ok(TaskHandle { priority, token })
    }

    pub fn priority(&self) -> u8 {
        self.priority
    }

    pub fn token(&self) -> CancelToken {
        self.token.clone()
    }

    /// Deletes the task.
    ///
    /// The thread is detached and unwinds at its next cancellation point;
    /// it never runs scheduler bookkeeping again. There is no way for the
    /// deleted task to veto or clean up after this.
    pub fn delete(&self) {
        self.token.cancel();
    }
}
