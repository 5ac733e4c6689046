//! Task registry: a fixed pool of descriptors plus per-task runtime state.
//!
//! Slots are created once at initialization and live until the process
//! terminates. A KILL recreates the wrapper task behind a slot, but the
//! slot itself and its counters persist.

use ptl_kernel::clock::Tick;
use ptl_kernel::notify::Notification;
use ptl_kernel::sync::{Arc, Mutex};
use ptl_kernel::task::TaskHandle;

use ptl_trace::NameRef;

use crate::config::{GlobalConfig, JobArg, JobFn, OverrunPolicy, TaskConfig, MAX_TASKS};
use crate::engine::PtlError;

/// Mutable runtime state of one task.
///
/// The wrapper flips the activity flag and completion counters around its
/// job body; the supervisor owns the release bookkeeping and the policy
/// resets. Every access goes through the slot lock so the supervisor's
/// tick-aligned decisions observe a coherent snapshot.
#[derive(Debug, Clone, Default)]
pub struct RunState {
    /// Absolute tick of the next release.
    pub next_release: Tick,
    /// Absolute tick the currently accounted job was released at; the
    /// reference point for its deadline.
    pub current_release: Tick,
    /// True while a job body is executing between release and completion.
    pub is_active: bool,
    /// Latched on the first deadline violation of the current job and
    /// cleared only when a new job is released.
    pub deadline_missed: bool,
    pub jobs_completed: u32,
    pub deadline_misses: u32,
    pub overrun_skips: u32,
    pub overrun_kills: u32,
    pub overrun_catchups: u32,
}

impl RunState {
    /// Total overruns across all three policies.
    pub fn overruns(&self) -> u32 {
        self.overrun_skips + self.overrun_kills + self.overrun_catchups
    }
}

/// One registered periodic task.
pub struct TaskSlot {
    name: NameRef,
    period: Tick,
    deadline: Tick,
    priority: u8,
    stack_size: usize,
    policy: Option<OverrunPolicy>,
    entry: JobFn,
    argument: Option<JobArg>,
    state: Mutex<RunState>,
    notifier: Mutex<Arc<Notification>>,
    handle: Mutex<Option<TaskHandle>>,
}

impl TaskSlot {
    fn new(config: &TaskConfig, entry: JobFn) -> Self {
        // A zero deadline is shorthand for "deadline equals period".
        let deadline = if config.deadline > 0 {
            config.deadline
        } else {
            config.period
        };

        Self {
            name: Arc::from(config.name.as_str()),
            period: config.period,
            deadline,
            priority: config.priority,
            stack_size: config.stack_size,
            policy: config.policy,
            entry,
            argument: config.argument.clone(),
            state: Mutex::new(RunState::default()),
            notifier: Mutex::new(Arc::new(Notification::new())),
            handle: Mutex::new(None),
        }
    }

    pub fn name(&self) -> &NameRef {
        &self.name
    }

    pub fn period(&self) -> Tick {
        self.period
    }

    /// Effective relative deadline, already normalized to be positive.
    pub fn deadline(&self) -> Tick {
        self.deadline
    }

    pub fn priority(&self) -> u8 {
        self.priority
    }

    pub fn stack_size(&self) -> usize {
        self.stack_size
    }

    /// Per-task policy override, if the application pinned one.
    pub fn policy(&self) -> Option<OverrunPolicy> {
        self.policy
    }

    /// Runs `f` with the slot lock held.
    pub fn with_state<R>(&self, f: impl FnOnce(&mut RunState) -> R) -> R {
        f(&mut self.state.lock())
    }

    /// Copy of the runtime state for inspection.
    pub fn state(&self) -> RunState {
        self.state.lock().clone()
    }

    /// Completed jobs, deadline misses, and total overruns.
    pub fn stats(&self) -> (u32, u32, u32) {
        let state = self.state.lock();
        (
            state.jobs_completed,
            state.deadline_misses,
            state.overruns(),
        )
    }

    pub(crate) fn entry(&self) -> &JobFn {
        &self.entry
    }

    pub(crate) fn argument(&self) -> Option<&JobArg> {
        self.argument.as_ref()
    }

    /// Current release-notification channel.
    pub(crate) fn notifier(&self) -> Arc<Notification> {
        Arc::clone(&self.notifier.lock())
    }

    /// Installs a fresh notification channel; a recreated wrapper must
    /// not consume a wakeup addressed to its predecessor.
    pub(crate) fn replace_notifier(&self) {
        *self.notifier.lock() = Arc::new(Notification::new());
    }

    pub(crate) fn set_handle(&self, handle: TaskHandle) {
        *self.handle.lock() = Some(handle);
    }

    pub(crate) fn take_handle(&self) -> Option<TaskHandle> {
        self.handle.lock().take()
    }
}

/// Fixed pool of task slots, populated once by `init`.
pub struct Registry {
    slots: heapless::Vec<Arc<TaskSlot>, MAX_TASKS>,
}

impl core::fmt::Debug for Registry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Registry")
            .field("slots", &self.slots.len())
            .finish()
    }
}

impl Registry {
    /// Validates the whole configuration and builds the pool.
    ///
    /// Validation completes before any slot is constructed, so a rejected
    /// configuration leaves nothing behind.
    pub(crate) fn build(
        global: &GlobalConfig,
        configs: &[TaskConfig],
    ) -> Result<Self, PtlError> {
        let count = configs.len();
        if count == 0 || count > MAX_TASKS || count > global.max_tasks {
            return Err(PtlError::InvalidTaskCount(count));
        }

        for config in configs {
            if config.entry.is_none() {
                return Err(PtlError::MissingEntry(config.name.clone()));
            }
            if config.period == 0 {
                return Err(PtlError::InvalidPeriod(config.name.clone()));
            }
            if config.deadline > config.period {
                return Err(PtlError::InvalidDeadline(config.name.clone()));
            }
        }

        let mut slots = heapless::Vec::new();
        for config in configs {
            let entry = config.entry.clone().expect("entry checked above");
            slots
                .push(Arc::new(TaskSlot::new(config, entry)))
                .ok()
                .expect("registry capacity checked above");
        }

        Ok(Self { slots })
    }

    pub fn tasks(&self) -> &[Arc<TaskSlot>] {
        &self.slots
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Arc<TaskSlot>> {
        self.slots.get(index)
    }
}
