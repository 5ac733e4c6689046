//! Configuration surface.

use std::any::Any;
use std::sync::Arc;

use ptl_kernel::clock::Tick;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Compile-time cap on registered tasks.
pub const MAX_TASKS: usize = 8;

/// Supervisor wake cadence in ticks.
pub const SUPERVISOR_PERIOD: Tick = 1;

/// Priority reserved for the supervisor. Every wrapper must sit strictly
/// below it; without that dominance the one-tick release bound does not
/// hold.
pub const SUPERVISOR_PRIORITY: u8 = u8::MAX;

/// Supervisor task name. The `PTL` prefix is reserved: trace dumps filter
/// switch noise by it.
pub const SUPERVISOR_NAME: &str = "PTL_Sup";

/// Default wrapper stack reservation in bytes.
pub const DEFAULT_STACK_SIZE: usize = 64 * 1024;

pub(crate) const SUPERVISOR_STACK_SIZE: usize = 128 * 1024;

/// Response to a job still running when its successor comes due.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverrunPolicy {
    /// Drop the new release and let the late job finish.
    Skip,
    /// Destroy the running job and start the new one.
    Kill,
    /// Release immediately; the late job is treated as displaced.
    CatchUp,
}

/// Opaque argument handed to a job body.
pub type JobArg = Arc<dyn Any + Send + Sync>;

/// User job body. Invoked once per release with the configured argument.
pub type JobFn = Arc<dyn Fn(Option<&JobArg>) + Send + Sync>;

/// Layer-wide settings.
#[derive(Clone)]
pub struct GlobalConfig {
    /// Default policy for tasks that do not pin their own.
    pub overrun_policy: OverrunPolicy,
    pub tracing_enabled: bool,
    /// Application-declared task ceiling; may be lower than [`MAX_TASKS`].
    pub max_tasks: usize,
}

impl GlobalConfig {
    pub fn new(overrun_policy: OverrunPolicy) -> Self {
        Self {
            overrun_policy,
            tracing_enabled: true,
            max_tasks: MAX_TASKS,
        }
    }

    pub fn with_tracing(mut self, enabled: bool) -> Self {
        self.tracing_enabled = enabled;
        self
    }

    pub fn with_max_tasks(mut self, max_tasks: usize) -> Self {
        self.max_tasks = max_tasks;
        self
    }
}

/// Per-task configuration provided by the application.
#[derive(Clone)]
pub struct TaskConfig {
    pub name: String,
    /// Period between successive releases, in ticks. Must be positive.
    pub period: Tick,
    /// Relative deadline from each release. Zero means "use the period";
    /// otherwise it must not exceed the period.
    pub deadline: Tick,
    pub priority: u8,
    pub stack_size: usize,
    /// Job body; registration rejects a task without one.
    pub entry: Option<JobFn>,
    pub argument: Option<JobArg>,
    /// Per-task overrun policy; `None` defers to the global one.
    pub policy: Option<OverrunPolicy>,
}

impl TaskConfig {
    pub fn new(name: impl Into<String>, period: Tick, entry: JobFn) -> Self {
        Self {
            name: name.into(),
            period,
            deadline: 0,
            priority: 1,
            stack_size: DEFAULT_STACK_SIZE,
            entry: Some(entry),
            argument: None,
            policy: None,
        }
    }

    pub fn with_deadline(mut self, deadline: Tick) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_stack_size(mut self, size: usize) -> Self {
        self.stack_size = size;
        self
    }

    pub fn with_argument(mut self, argument: JobArg) -> Self {
        self.argument = Some(argument);
        self
    }

    pub fn with_policy(mut self, policy: OverrunPolicy) -> Self {
        self.policy = Some(policy);
        self
    }
}
