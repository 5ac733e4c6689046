//! Engine: the one owned value behind the layer.
//!
//! Gathers the registry, trace ring, clock, and serial sink so every
//! mutation goes through a single place. The process-wide entry points in
//! the crate root hold an engine reference created by `init`; tests build
//! private engines directly and drive them with a manual clock.

use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;

use ptl_kernel::clock::{Clock, Tick};
use ptl_kernel::sync::{Arc, Mutex};
use ptl_kernel::task::TaskError;

use ptl_trace::{
    write_statistics, write_trace, NameRef, TraceEvent, TraceRing, TraceSnapshot, TraceStats,
};

use crate::config::{GlobalConfig, OverrunPolicy, TaskConfig, SUPERVISOR_NAME};
use crate::registry::{Registry, TaskSlot};
use crate::wrapper;

/// Errors surfaced by the layer's entry points.
#[derive(Error, Debug)]
pub enum PtlError {
    #[error("invalid task count: {0}")]
    InvalidTaskCount(usize),
    #[error("task `{0}` has no entry function")]
    MissingEntry(String),
    #[error("task `{0}` has a zero period")]
    InvalidPeriod(String),
    #[error("task `{0}` deadline exceeds its period")]
    InvalidDeadline(String),
    #[error("no task at index {0}")]
    UnknownTask(usize),
    #[error("layer already initialized")]
    AlreadyInitialized,
    #[error("layer not initialized")]
    NotInitialized,
    #[error("supervisor already started")]
    AlreadyStarted,
    #[error("task creation failed: {0}")]
    TaskCreate(#[from] io::Error),
}

impl From<TaskError> for PtlError {
    fn from(value: TaskError) -> Self {
        match value {
            TaskError::Spawn(err) => Self::TaskCreate(err),
        }
    }
}

pub struct Engine {
    global: GlobalConfig,
    registry: Registry,
    ring: TraceRing,
    clock: Arc<dyn Clock>,
    serial: Mutex<Box<dyn Write + Send>>,
    /// Jobs currently executing; the 0/1 transitions stand in for the
    /// idle task's context-switch hook.
    running_jobs: Mutex<u32>,
    started: AtomicBool,
    supervisor_name: NameRef,
}

impl Engine {
    /// Validates the configuration, populates the registry, and creates
    /// every wrapper task blocked on its notification channel.
    ///
    /// Any rejection happens before the first wrapper exists; a spawn
    /// failure part-way tears the earlier wrappers down again, so a
    /// failed call leaves no task behind.
    pub(crate) fn new(
        global: GlobalConfig,
        configs: &[TaskConfig],
        clock: Arc<dyn Clock>,
        serial: Box<dyn Write + Send>,
    ) -> Result<Arc<Self>, PtlError> {
        let registry = Registry::build(&global, configs)?;

        let engine = Arc::new(Self {
            global,
            registry,
            ring: TraceRing::new(),
            clock,
            serial: Mutex::new(serial),
            running_jobs: Mutex::new(0),
            started: AtomicBool::new(false),
            supervisor_name: Arc::from(SUPERVISOR_NAME),
        });

        if engine.global.tracing_enabled {
            engine.ring.reset();
        }

        engine.serial_line(&format!(
            "[PTL] Initializing {} tasks...",
            engine.registry.len()
        ));

        for index in 0..engine.registry.len() {
            let slot = Arc::clone(&engine.registry.tasks()[index]);
            if let Err(err) = engine.spawn_wrapper(&slot) {
                // Unwind the wrappers created so far; the failed call
                // must leave the pre-call state.
                engine.shutdown();
                engine.serial_line("[PTL] Error: Task creation failed");
                return Err(err.into());
            }
            engine.serial_line(&format!("[PTL] Created: {}", slot.name()));
        }

        engine.serial_line("[PTL] Init complete");
        Ok(engine)
    }

    /// Spawns the wrapper task for `slot` and records its handle.
    pub(crate) fn spawn_wrapper(self: &Arc<Self>, slot: &Arc<TaskSlot>) -> Result<(), TaskError> {
        let engine = Arc::clone(self);
        let task_slot = Arc::clone(slot);
        let handle = ptl_kernel::task::TaskHandle::spawn(
            slot.name(),
            slot.stack_size(),
            slot.priority(),
            move |token| wrapper::run(engine, task_slot, token),
        )?;
        slot.set_handle(handle);
        Ok(())
    }

    /// Cancels every wrapper the engine still holds a handle for.
    pub(crate) fn shutdown(&self) {
        for slot in self.registry.tasks() {
            if let Some(handle) = slot.take_handle() {
                handle.delete();
                // Wake the wrapper out of its notification wait so it can
                // observe the cancellation and exit.
                slot.notifier().give();
            }
        }
    }

    pub(crate) fn mark_started(&self) -> Result<(), PtlError> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(PtlError::AlreadyStarted);
        }
        Ok(())
    }

    pub fn clock(&self) -> &dyn Clock {
        &*self.clock
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub(crate) fn supervisor_name(&self) -> &NameRef {
        &self.supervisor_name
    }

    pub fn is_tracing_enabled(&self) -> bool {
        self.global.tracing_enabled
    }

    pub fn global_policy(&self) -> OverrunPolicy {
        self.global.overrun_policy
    }

    /// Per-task policy if pinned, else the global default.
    pub fn effective_policy(&self, slot: &TaskSlot) -> OverrunPolicy {
        slot.policy().unwrap_or(self.global.overrun_policy)
    }

    /// Completed jobs, deadline misses, and total overruns for one task.
    pub fn task_stats(&self, index: usize) -> Option<(u32, u32, u32)> {
        self.registry.get(index).map(|slot| slot.stats())
    }

    /// Common-epoch latch: every task becomes releasable at `t0`, and the
    /// idle span that precedes the first job is opened.
    pub(crate) fn latch_epoch(&self, t0: Tick) {
        for slot in self.registry.tasks() {
            slot.with_state(|state| state.next_release = t0);
        }
        if self.global.tracing_enabled {
            self.ring.track_idle_entry(t0);
        }
    }

    pub(crate) fn log(&self, name: &NameRef, event: TraceEvent, timestamp: Tick) {
        if self.global.tracing_enabled {
            self.ring.log(name, event, timestamp);
        }
    }

    /// Emits an overrun record and the release that follows it with no
    /// other record between them.
    pub(crate) fn log_pair(
        &self,
        name: &NameRef,
        first: TraceEvent,
        second: TraceEvent,
        timestamp: Tick,
    ) {
        if self.global.tracing_enabled {
            self.ring.log_pair(name, first, second, timestamp);
        }
    }

    pub(crate) fn job_started(&self, now: Tick) {
        let mut running = self.running_jobs.lock();
        *running += 1;
        if *running == 1 && self.global.tracing_enabled {
            self.ring.track_idle_exit(now);
        }
    }

    pub(crate) fn job_finished(&self, now: Tick) {
        let mut running = self.running_jobs.lock();
        debug_assert!(*running > 0, "running-job count underflow");
        *running = running.saturating_sub(1);
        if *running == 0 && self.global.tracing_enabled {
            self.ring.track_idle_entry(now);
        }
    }

    /// Appends a record on behalf of an external kernel hook.
    pub fn log_event(&self, name: &str, event: TraceEvent, timestamp: Tick) {
        let name: NameRef = Arc::from(name);
        self.log(&name, event, timestamp);
    }

    pub fn track_idle_entry(&self, time: Tick) {
        if self.global.tracing_enabled {
            self.ring.track_idle_entry(time);
        }
    }

    pub fn track_idle_exit(&self, time: Tick) {
        if self.global.tracing_enabled {
            self.ring.track_idle_exit(time);
        }
    }

    /// Clears the trace ring and idle accounting.
    pub fn trace_reset(&self) {
        self.ring.reset();
    }

    pub fn trace_snapshot(&self) -> TraceSnapshot {
        self.ring.snapshot()
    }

    pub fn trace_stats(&self) -> TraceStats {
        self.ring.snapshot().stats()
    }

    /// Dumps the trace through the serial sink.
    pub fn print_trace(&self) {
        let snapshot = self.ring.snapshot();
        let mut serial = self.serial.lock();
        let _ = write_trace(&snapshot, &mut **serial);
    }

    /// Dumps the statistics block through the serial sink.
    pub fn print_statistics(&self) {
        let snapshot = self.ring.snapshot();
        let mut serial = self.serial.lock();
        let _ = write_statistics(&snapshot, &mut **serial);
    }

    /// One human-readable line on the serial sink; not a real-time path.
    pub(crate) fn serial_line(&self, line: &str) {
        let mut serial = self.serial.lock();
        let _ = writeln!(serial, "{line}");
        let _ = serial.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GlobalConfig, OverrunPolicy, TaskConfig};
    use ptl_kernel::clock::ManualClock;

    fn noop_job() -> crate::config::JobFn {
        Arc::new(|_arg| {})
    }

    fn build(
        global: GlobalConfig,
        configs: &[TaskConfig],
    ) -> Result<Arc<Engine>, PtlError> {
        Engine::new(global, configs, Arc::new(ManualClock::new()), Box::new(io::sink()))
    }

    #[test]
    fn effective_policy_falls_back_to_global() {
        let configs = vec![
            TaskConfig::new("Pinned", 10, noop_job()).with_policy(OverrunPolicy::Kill),
            TaskConfig::new("Deferring", 10, noop_job()),
        ];
        let engine = build(GlobalConfig::new(OverrunPolicy::CatchUp), &configs)
            .expect("engine should build");

        let tasks = engine.registry().tasks();
        assert_eq!(engine.effective_policy(&tasks[0]), OverrunPolicy::Kill);
        assert_eq!(engine.effective_policy(&tasks[1]), OverrunPolicy::CatchUp);
        engine.shutdown();
    }

    #[test]
    fn task_stats_by_index() {
        let configs = vec![TaskConfig::new("T1", 10, noop_job())];
        let engine =
            build(GlobalConfig::new(OverrunPolicy::Skip), &configs).expect("engine should build");

        assert_eq!(engine.task_stats(0), Some((0, 0, 0)));
        assert_eq!(engine.task_stats(1), None);
        engine.shutdown();
    }

    #[test]
    fn tracing_gate_suppresses_records() {
        let configs = vec![TaskConfig::new("T1", 10, noop_job())];
        let global = GlobalConfig::new(OverrunPolicy::Skip).with_tracing(false);
        let engine = build(global, &configs).expect("engine should build");

        engine.log_event("T1", TraceEvent::Release, 5);
        engine.track_idle_entry(6);
        assert!(engine.trace_snapshot().records.is_empty());
        engine.shutdown();
    }

    #[test]
    fn mark_started_is_one_shot() {
        let configs = vec![TaskConfig::new("T1", 10, noop_job())];
        let engine =
            build(GlobalConfig::new(OverrunPolicy::Skip), &configs).expect("engine should build");

        assert!(engine.mark_started().is_ok());
        assert!(matches!(
            engine.mark_started(),
            Err(PtlError::AlreadyStarted)
        ));
        engine.shutdown();
    }
}
