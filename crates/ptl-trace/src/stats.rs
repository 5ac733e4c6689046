//! Statistics reduction over a trace snapshot.

use ptl_kernel::clock::Tick;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::event::TraceEvent;
use crate::ring::TraceSnapshot;

/// Aggregate counters extracted from the trace ring.
///
/// Reduction is a pure function of the snapshot, so reducing the same
/// snapshot twice yields identical values.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TraceStats {
    pub total_releases: u32,
    pub total_completions: u32,
    pub deadline_misses: u32,
    pub overruns: u32,
    pub total_time_ms: Tick,
    pub idle_time_ms: Tick,
    /// Fraction of total time with a task on the CPU, in `[0, 1]`.
    pub cpu_utilization: f32,
}

impl TraceSnapshot {
    /// Walks the readable range once and reduces it.
    pub fn stats(&self) -> TraceStats {
        let mut stats = TraceStats::default();

        for record in &self.records {
            match record.event {
                TraceEvent::Release => stats.total_releases += 1,
                TraceEvent::Complete => stats.total_completions += 1,
                TraceEvent::DeadlineMiss => stats.deadline_misses += 1,
                event if event.is_overrun() => stats.overruns += 1,
                _ => {}
            }
        }

        // The most recent record carries the most recent timestamp.
        if let Some(last) = self.records.last() {
            stats.total_time_ms = last.timestamp;
        }
        stats.idle_time_ms = self.idle_time;

        if stats.total_time_ms > 0 {
            let active = stats.total_time_ms.saturating_sub(stats.idle_time_ms);
            stats.cpu_utilization = active as f32 / stats.total_time_ms as f32;
        }

        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ring::{NameRef, TraceRing};
    use std::sync::Arc;

    fn name(s: &str) -> NameRef {
        Arc::from(s)
    }

    #[test]
    fn counts_each_event_class() {
        let ring = TraceRing::new();
        let task = name("T1");
        ring.log(&task, TraceEvent::Release, 0);
        ring.log(&task, TraceEvent::Start, 0);
        ring.log(&task, TraceEvent::Complete, 8);
        ring.log(&task, TraceEvent::Release, 10);
        ring.log(&task, TraceEvent::DeadlineMiss, 25);
        ring.log(&task, TraceEvent::OverrunSkip, 30);
        ring.log(&task, TraceEvent::OverrunKill, 40);
        ring.log(&task, TraceEvent::OverrunCatchup, 50);

        let stats = ring.snapshot().stats();
        assert_eq!(stats.total_releases, 2);
        assert_eq!(stats.total_completions, 1);
        assert_eq!(stats.deadline_misses, 1);
        assert_eq!(stats.overruns, 3);
        assert_eq!(stats.total_time_ms, 50);
    }

    #[test]
    fn utilization_accounts_for_idle_time() {
        let ring = TraceRing::new();
        let task = name("T1");
        ring.track_idle_entry(0);
        ring.track_idle_exit(25);
        ring.log(&task, TraceEvent::Complete, 100);

        let stats = ring.snapshot().stats();
        assert_eq!(stats.idle_time_ms, 25);
        assert_eq!(stats.total_time_ms, 100);
        assert!((stats.cpu_utilization - 0.75).abs() < 1e-6);
    }

    #[test]
    fn empty_snapshot_reduces_to_zeroes() {
        let ring = TraceRing::new();
        let stats = ring.snapshot().stats();
        assert_eq!(stats, TraceStats::default());
        assert_eq!(stats.cpu_utilization, 0.0);
    }

    #[test]
    fn reduction_is_idempotent() {
        let ring = TraceRing::new();
        let task = name("T1");
        for i in 0..40 {
            ring.log(&task, TraceEvent::Release, i);
            ring.log(&task, TraceEvent::Complete, i + 1);
        }
        let snap = ring.snapshot();
        assert_eq!(snap.stats(), snap.stats());
    }
}
