#![doc = r#"# ptl

Periodic task layer: first-class periodic tasks over a priority-based
preemptive kernel surface.

Applications describe their tasks once — period, relative deadline,
priority, job body, overrun policy — and the layer takes over release
timing: a maximum-priority supervisor wakes every tick, releases jobs at
their scheduled instants, detects deadline misses, and applies one of
three overrun-recovery policies (SKIP, KILL, CATCH_UP) when a job is
still running as its successor comes due. Every scheduling event lands in
a trace ring with an offline statistics reducer.

## Module Overview
- [`config`]     – task and global configuration, policies, constants.
- [`registry`]   – fixed pool of task descriptors and runtime state.
- [`engine`]     – the owned engine value behind the global entry points.
- `wrapper`      – per-task loop owning the job body and its wakeup.
- `supervisor`   – tick-aligned surveillance and release dispatch.

## Entry points

`init` validates the configuration and creates the wrapper tasks, blocked
on their notification channels; `start` creates the supervisor and does
not return under normal operation. Both are process-wide one-shots: the
registry, trace ring, and global settings live behind a single
process-lifetime engine reference.

```no_run
use std::sync::Arc;
use ptl::{GlobalConfig, OverrunPolicy, TaskConfig};

let job: ptl::JobFn = Arc::new(|_arg| {
    ptl_kernel::burn::burn(10);
});

let tasks = vec![TaskConfig::new("Sensor", 100, job).with_priority(2)];
ptl::init(GlobalConfig::new(OverrunPolicy::CatchUp), &tasks).unwrap();
ptl::start().unwrap();
```
"#]

use std::convert::Infallible;
use std::io;
use std::sync::OnceLock;

use ptl_kernel::clock::{SystemClock, Tick};
use ptl_kernel::sync::Arc;

use ptl_trace::{TraceEvent, TraceSnapshot, TraceStats};

pub mod config;
pub mod engine;
pub mod registry;
mod supervisor;
mod wrapper;

pub use config::{
    GlobalConfig, JobArg, JobFn, OverrunPolicy, TaskConfig, DEFAULT_STACK_SIZE, MAX_TASKS,
    SUPERVISOR_NAME, SUPERVISOR_PERIOD, SUPERVISOR_PRIORITY,
};
pub use engine::PtlError;
pub use registry::{RunState, TaskSlot};

use engine::Engine;
use supervisor::Supervisor;

static ENGINE: OnceLock<Arc<Engine>> = OnceLock::new();

fn installed() -> Result<&'static Arc<Engine>, PtlError> {
    ENGINE.get().ok_or(PtlError::NotInitialized)
}

/// Initializes the layer.
///
/// Validates the whole configuration, stores the global settings, and
/// creates one wrapper task per entry, each blocked on its notification
/// channel. On any rejection the process is left exactly as before the
/// call. Calling `init` a second time fails without side effects.
pub fn init(global: GlobalConfig, tasks: &[TaskConfig]) -> Result<(), PtlError> {
    if ENGINE.get().is_some() {
        return Err(PtlError::AlreadyInitialized);
    }

    let engine = Engine::new(
        global,
        tasks,
        Arc::new(SystemClock::new()),
        Box::new(io::stdout()),
    )?;

    if ENGINE.set(Arc::clone(&engine)).is_err() {
        // Lost an initialization race; withdraw the wrappers we created.
        engine.shutdown();
        return Err(PtlError::AlreadyInitialized);
    }
    Ok(())
}

/// Starts the supervisor and hands the process over to the layer.
///
/// Legal only after a successful [`init`]. Does not return under normal
/// operation; the error paths are calling before `init`, calling twice,
/// and supervisor creation failure.
pub fn start() -> Result<Infallible, PtlError> {
    let engine = installed()?;
    engine.mark_started()?;

    engine.serial_line("[PTL] Starting dispatcher...");
    engine.serial_line("[SCHEDULER] Creating Supervisor Task...");
    Supervisor::spawn(Arc::clone(engine))?;

    loop {
        std::thread::park();
    }
}

/// Completed jobs, deadline misses, and total overruns for the task at
/// `index`, in registration order.
pub fn get_task_stats(index: usize) -> Result<(u32, u32, u32), PtlError> {
    installed()?
        .task_stats(index)
        .ok_or(PtlError::UnknownTask(index))
}

/// The registered task slots, in registration order.
pub fn get_task_list() -> Result<Vec<Arc<TaskSlot>>, PtlError> {
    Ok(installed()?.registry().tasks().to_vec())
}

/// Whether event tracing was enabled at initialization.
pub fn is_tracing_enabled() -> bool {
    ENGINE
        .get()
        .map(|engine| engine.is_tracing_enabled())
        .unwrap_or(false)
}

/// The global default overrun policy.
pub fn get_global_policy() -> Result<OverrunPolicy, PtlError> {
    Ok(installed()?.global_policy())
}

/// The policy that would be applied to `slot` on overrun: its own if
/// pinned, otherwise the global default.
pub fn get_effective_policy(slot: &TaskSlot) -> Result<OverrunPolicy, PtlError> {
    Ok(installed()?.effective_policy(slot))
}

/// Clears the trace ring and idle accounting.
pub fn trace_init() -> Result<(), PtlError> {
    installed()?.trace_reset();
    Ok(())
}

/// Appends a trace record on behalf of an external kernel hook.
pub fn log_event(name: &str, event: TraceEvent, time: Tick) -> Result<(), PtlError> {
    installed()?.log_event(name, event, time);
    Ok(())
}

/// Reduces the current trace ring contents to aggregate statistics.
pub fn get_trace_statistics() -> Result<TraceStats, PtlError> {
    Ok(installed()?.trace_stats())
}

/// Consistent copy of the trace ring, oldest record first.
pub fn trace_snapshot() -> Result<TraceSnapshot, PtlError> {
    Ok(installed()?.trace_snapshot())
}

/// Dumps the trace through the serial sink.
pub fn print_trace() -> Result<(), PtlError> {
    installed()?.print_trace();
    Ok(())
}

/// Dumps the statistics block through the serial sink.
pub fn print_statistics() -> Result<(), PtlError> {
    installed()?.print_statistics();
    Ok(())
}

/// Idle-task switch-in hook; wire to the kernel's context-switch hook.
pub fn track_idle_entry(time: Tick) -> Result<(), PtlError> {
    installed()?.track_idle_entry(time);
    Ok(())
}

/// Idle-task switch-out hook; wire to the kernel's context-switch hook.
pub fn track_idle_exit(time: Tick) -> Result<(), PtlError> {
    installed()?.track_idle_exit(time);
    Ok(())
}
