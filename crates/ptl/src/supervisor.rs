//! Supervisor: tick-aligned deadline surveillance and release dispatch.
//!
//! A single task at the highest priority wakes every tick on an
//! absolute-deadline sleep, surveys every registered task for deadline
//! violations, then emits releases and applies overrun policies. Both
//! passes finish for the whole registry before the next sleep, and the
//! surveillance pass completes before the first release mutation, so a
//! wrapper completing mid-iteration cannot race past the supervisor
//! within one tick.

use ptl_kernel::burn;
use ptl_kernel::clock::Tick;
use ptl_kernel::sync::Arc;
use ptl_kernel::task::{TaskError, TaskHandle};

use ptl_trace::TraceEvent;

use crate::config::{
    SUPERVISOR_NAME, SUPERVISOR_PERIOD, SUPERVISOR_PRIORITY, SUPERVISOR_STACK_SIZE,
};
use crate::engine::Engine;
use crate::registry::TaskSlot;

pub(crate) struct Supervisor {
    engine: Arc<Engine>,
}

impl Supervisor {
    pub(crate) fn new(engine: Arc<Engine>) -> Self {
        Self { engine }
    }

    /// Creates the supervisor task.
    ///
    /// Priority dominance over every wrapper is a hard precondition of
    /// the one-tick release bound, so it is asserted here rather than
    /// reported as a recoverable error.
    pub(crate) fn spawn(engine: Arc<Engine>) -> Result<TaskHandle, TaskError> {
        for slot in engine.registry().tasks() {
            assert!(
                slot.priority() < SUPERVISOR_PRIORITY,
                "task `{}` priority {} would not be dominated by the supervisor",
                slot.name(),
                slot.priority()
            );
        }

        TaskHandle::spawn(
            SUPERVISOR_NAME,
            SUPERVISOR_STACK_SIZE,
            SUPERVISOR_PRIORITY,
            move |_token| Supervisor::new(engine).run(),
        )
    }

    fn run(self) {
        let engine = &self.engine;

        engine.serial_line("[SCHEDULER] Calibrating System Timer...");
        let loops = burn::calibrate(engine.clock());
        engine.serial_line(&format!("[SCHEDULER] System Calibrated ({loops} loops/ms)"));

        // Deferred common epoch: every task becomes releasable at the
        // same instant, after calibration has settled.
        let t0 = engine.clock().now();
        engine.latch_epoch(t0);

        engine.serial_line(&format!(
            "[SCHEDULER] Supervisor Running at Priority {SUPERVISOR_PRIORITY}"
        ));

        let mut wake = t0;
        loop {
            wake += SUPERVISOR_PERIOD;
            engine.clock().sleep_until(wake);
            let now = engine.clock().now();
            self.scan(now);
        }
    }

    /// One full pass over the registry at tick `now`.
    pub(crate) fn scan(&self, now: Tick) {
        let supervisor = self.engine.supervisor_name();
        self.engine.log(supervisor, TraceEvent::SwitchIn, now);

        for slot in self.engine.registry().tasks() {
            self.check_deadline(slot, now);
        }

        for slot in self.engine.registry().tasks() {
            self.dispatch(slot, now);
        }

        self.engine.log(supervisor, TraceEvent::SwitchOut, now);
    }

    /// Deadline surveillance. The latch makes the count per job, not per
    /// tick: a late job is reported once, further checks stay quiet
    /// until a new release resets the latch.
    fn check_deadline(&self, slot: &Arc<TaskSlot>, now: Tick) {
        let missed = slot.with_state(|state| {
            let absolute_deadline = state.current_release + slot.deadline();
            if now >= absolute_deadline && state.is_active && !state.deadline_missed {
                state.deadline_missed = true;
                state.deadline_misses += 1;
                true
            } else {
                false
            }
        });
        if missed {
            self.engine.log(slot.name(), TraceEvent::DeadlineMiss, now);
        }
    }

    /// Release decision for one task.
    fn dispatch(&self, slot: &Arc<TaskSlot>, now: Tick) {
        let due = slot.with_state(|state| now >= state.next_release);
        if !due {
            return;
        }

        let running = slot.with_state(|state| state.is_active);
        if !running {
            self.release(slot, now);
            return;
        }

        match self.engine.effective_policy(slot) {
            crate::config::OverrunPolicy::Skip => self.apply_skip(slot, now),
            crate::config::OverrunPolicy::CatchUp => self.apply_catch_up(slot, now),
            crate::config::OverrunPolicy::Kill => self.apply_kill(slot, now),
        }
    }

    /// Nominal release: the previous job has completed.
    fn release(&self, slot: &Arc<TaskSlot>, now: Tick) {
        self.engine.log(slot.name(), TraceEvent::Release, now);
        slot.with_state(|state| {
            // The new release is the boundary for the miss latch.
            state.deadline_missed = false;
            state.current_release = state.next_release;
            state.next_release += slot.period();
        });
        slot.notifier().give();
    }

    /// SKIP: drop the new release and let the late job run on. The miss
    /// latch stays set, so the job is not re-counted period after period.
    fn apply_skip(&self, slot: &Arc<TaskSlot>, now: Tick) {
        slot.with_state(|state| {
            state.overrun_skips += 1;
            state.next_release += slot.period();
        });
        self.engine.log(slot.name(), TraceEvent::OverrunSkip, now);
    }

    /// CATCH_UP: release immediately over the late job. The previous job
    /// is displaced from the accounting but its CPU execution continues;
    /// applications selecting this policy must keep job side effects
    /// idempotent.
    fn apply_catch_up(&self, slot: &Arc<TaskSlot>, now: Tick) {
        slot.with_state(|state| {
            state.overrun_catchups += 1;
            state.deadline_missed = false;
            state.is_active = false;
            state.current_release = state.next_release;
            state.next_release += slot.period();
        });
        self.engine
            .log_pair(slot.name(), TraceEvent::OverrunCatchup, TraceEvent::Release, now);
        slot.notifier().give();
    }

    /// KILL: destroy the wrapper task and recreate it fresh. The only
    /// policy that loses the previous job's CPU work; any resources the
    /// killed job held are the application's concern.
    fn apply_kill(&self, slot: &Arc<TaskSlot>, now: Tick) {
        if let Some(handle) = slot.take_handle() {
            handle.delete();
        }
        slot.replace_notifier();

        slot.with_state(|state| {
            state.overrun_kills += 1;
            state.is_active = false;
            state.deadline_missed = false;
            state.current_release = state.next_release;
            state.next_release += slot.period();
        });
        self.engine
            .log_pair(slot.name(), TraceEvent::OverrunKill, TraceEvent::Release, now);

        if self.engine.spawn_wrapper(slot).is_err() {
            self.halt_resurrect_failure(slot.name());
        }
        slot.notifier().give();
    }

    /// Fatal path: the recreate failed, so timing guarantees are gone.
    /// One explanatory line, then the supervisor halts forever.
    fn halt_resurrect_failure(&self, name: &str) -> ! {
        self.engine
            .serial_line(&format!("[SCHEDULER] FATAL: Failed to resurrect task: {name}"));
        loop {
            std::thread::park();
        }
    }
}
