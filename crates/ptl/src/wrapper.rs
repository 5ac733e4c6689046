//! Generic task wrapper.
//!
//! One instance runs per registered task, at the task's configured
//! priority. It owns the release-notification wait and the job-scoped
//! bookkeeping; the next job arrives only when the supervisor delivers a
//! notification, so the wrapper never self-schedules.

use ptl_kernel::sync::Arc;
use ptl_kernel::task::CancelToken;

use ptl_trace::TraceEvent;

use crate::engine::Engine;
use crate::registry::TaskSlot;

/// Keeps the engine's running-job count honest even when a KILL unwinds
/// the thread out of the job body.
struct JobGuard<'a> {
    engine: &'a Engine,
}

impl Drop for JobGuard<'_> {
    fn drop(&mut self) {
        let now = self.engine.clock().now();
        self.engine.job_finished(now);
    }
}

pub(crate) fn run(engine: Arc<Engine>, slot: Arc<TaskSlot>, token: CancelToken) {
    loop {
        // One-shot take; consumes the wakeup.
        let notifier = slot.notifier();
        notifier.take();
        if token.is_canceled() {
            break;
        }

        let t_start = engine.clock().now();
        slot.with_state(|state| state.is_active = true);
        engine.job_started(t_start);
        let guard = JobGuard { engine: &*engine };

        engine.log(slot.name(), TraceEvent::SwitchIn, t_start);
        engine.log(slot.name(), TraceEvent::Start, t_start);

        (slot.entry())(slot.argument());

        // A job deleted in the window between its last cancellation
        // point and returning must not log or account anything; the
        // supervisor has already handed the slot to a successor.
        if token.is_canceled() {
            break;
        }

        let t_end = engine.clock().now();
        engine.log(slot.name(), TraceEvent::Complete, t_end);

        // Completion-side deadline check. The latch keeps a miss the
        // supervisor already observed from being counted twice.
        let missed_now = slot.with_state(|state| {
            let absolute_deadline = state.current_release + slot.deadline();
            if t_end > absolute_deadline && !state.deadline_missed {
                state.deadline_missed = true;
                state.deadline_misses += 1;
                true
            } else {
                false
            }
        });
        if missed_now {
            engine.log(slot.name(), TraceEvent::DeadlineMiss, t_end);
        }

        engine.log(slot.name(), TraceEvent::SwitchOut, t_end);
        drop(guard);

        let stale = slot.with_state(|state| {
            if token.is_canceled() {
                return true;
            }
            state.is_active = false;
            state.jobs_completed += 1;
            false
        });
        if stale {
            break;
        }
    }
}
