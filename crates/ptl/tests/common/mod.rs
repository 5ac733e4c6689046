//! Shared plumbing for the end-to-end scenarios.
//!
//! Each scenario lives in its own test binary because the layer is a
//! process-wide one-shot: `init` latches an engine for the lifetime of
//! the process and `start` never returns.

#![allow(dead_code)]

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use ptl::JobFn;
use ptl_kernel::burn;
use ptl_kernel::clock::Tick;
use ptl_trace::{TraceEvent, TraceRecord};

/// Wall-clock budget for supervisor startup and burner calibration
/// before the common epoch is latched.
pub const STARTUP_MS: u64 = 250;

/// Job body that burns roughly `ms` milliseconds of CPU.
pub fn burn_job(ms: u32) -> JobFn {
    Arc::new(move |_arg| burn::burn(ms))
}

/// Hands the process over to the layer on a background thread and
/// returns once the caller should begin its observation window.
pub fn launch() {
    thread::spawn(|| {
        let _ = ptl::start();
    });
}

/// Blocks the observing thread for a startup allowance plus `window_ms`
/// of scheduled time.
pub fn run_for(window_ms: u64) {
    thread::sleep(Duration::from_millis(STARTUP_MS + window_ms));
}

/// Current trace contents, oldest record first.
pub fn records() -> Vec<TraceRecord> {
    ptl::trace_snapshot().expect("layer not initialized").records
}

/// Timestamps of `event` records belonging to `name`, in trace order.
pub fn timestamps_for(records: &[TraceRecord], name: &str, event: TraceEvent) -> Vec<Tick> {
    records
        .iter()
        .filter(|r| r.event == event && &*r.name == name)
        .map(|r| r.timestamp)
        .collect()
}

/// Number of `event` records belonging to `name`.
pub fn count_for(records: &[TraceRecord], name: &str, event: TraceEvent) -> usize {
    timestamps_for(records, name, event).len()
}

/// Indices of `event` records belonging to `name`, in trace order.
pub fn indices_for(records: &[TraceRecord], name: &str, event: TraceEvent) -> Vec<usize> {
    records
        .iter()
        .enumerate()
        .filter(|(_, r)| r.event == event && &*r.name == name)
        .map(|(i, _)| i)
        .collect()
}

/// Asserts that `name`'s START and COMPLETE records strictly alternate
/// and that no completion precedes its start, i.e. at most one job of
/// the task was ever in flight.
///
/// A wrapped ring may have evicted the start that matches the oldest
/// surviving completion, so one orphan completion at the front is
/// tolerated.
pub fn assert_single_activity(records: &[TraceRecord], name: &str) {
    let mut active: Option<Tick> = None;
    let mut seen_start = false;
    for record in records.iter().filter(|r| &*r.name == name) {
        match record.event {
            TraceEvent::Start => {
                assert!(
                    active.is_none(),
                    "task `{name}` started while already active"
                );
                active = Some(record.timestamp);
                seen_start = true;
            }
            TraceEvent::Complete => {
                if let Some(t_start) = active.take() {
                    assert!(
                        record.timestamp >= t_start,
                        "task `{name}` completed at {} before starting at {}",
                        record.timestamp,
                        t_start
                    );
                } else {
                    assert!(
                        !seen_start,
                        "task `{name}` completed without a start"
                    );
                }
            }
            _ => {}
        }
    }
}
