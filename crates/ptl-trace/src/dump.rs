//! Human-readable trace and statistics output.
//!
//! Dumps go through any byte-oriented `Write` sink; none of this is on a
//! real-time path.

use std::io::{self, Write};

use thiserror::Error;

use crate::event::TraceEvent;
use crate::ring::TraceSnapshot;

/// Reserved name prefix for the supervisor task. Its SWITCH_IN and
/// SWITCH_OUT records fire every tick and are filtered from dumps.
pub const SUPERVISOR_PREFIX: &str = "PTL";

/// Errors that can occur while emitting trace output.
#[derive(Error, Debug)]
pub enum TraceError {
    #[error("backend error: {0}")]
    Backend(#[from] io::Error),
}

/// Writes one line per record, chronological order.
pub fn write_trace(snapshot: &TraceSnapshot, out: &mut dyn Write) -> Result<(), TraceError> {
    writeln!(out, "\n===== PTL TRACE =====")?;

    for record in &snapshot.records {
        let switch = matches!(record.event, TraceEvent::SwitchIn | TraceEvent::SwitchOut);
        if switch && record.name.starts_with(SUPERVISOR_PREFIX) {
            continue;
        }
        writeln!(
            out,
            "[{:5} ms] {:<10} {}",
            record.timestamp,
            record.name,
            record.event.name()
        )?;
    }

    writeln!(out, "======================================")?;
    Ok(())
}

/// Writes the fixed-order statistics block.
///
/// The overhead line is annotated `[OK]` at or below ten percent and
/// `[FAIL]` above it, and is suppressed as not meaningful when the CPU
/// spent most of its time idle.
pub fn write_statistics(snapshot: &TraceSnapshot, out: &mut dyn Write) -> Result<(), TraceError> {
    let stats = snapshot.stats();

    writeln!(out, "\n====== PTL STATISTICS ======")?;
    writeln!(out, "Total Releases:     {}", stats.total_releases)?;
    writeln!(out, "Total Completions:  {}", stats.total_completions)?;
    writeln!(out, "Deadline Misses:    {}", stats.deadline_misses)?;
    writeln!(out, "Overruns:           {}", stats.overruns)?;
    writeln!(out, "Total Time:         {} ms", stats.total_time_ms)?;
    writeln!(out, "Idle Time:          {} ms", stats.idle_time_ms)?;

    // Hundredths of a percent, so XX.YY renders without float formatting
    // surprises.
    let util_pct = (stats.cpu_utilization * 10_000.0) as u32;
    writeln!(
        out,
        "CPU Utilization:    {}.{:02}%",
        util_pct / 100,
        util_pct % 100
    )?;

    let active = stats.total_time_ms.saturating_sub(stats.idle_time_ms);
    if active > 0 && util_pct >= 5_000 {
        let overhead_pct = 10_000 - util_pct;
        if overhead_pct <= 1_000 {
            writeln!(
                out,
                "System Overhead:    {}.{:02}% [OK]",
                overhead_pct / 100,
                overhead_pct % 100
            )?;
        } else {
            writeln!(
                out,
                "System Overhead:    {}.{:02}% [FAIL - Required <=10%]",
                overhead_pct / 100,
                overhead_pct % 100
            )?;
        }
    } else {
        writeln!(out, "System Overhead:    N/A (low CPU load)")?;
    }

    writeln!(out, "============================\n")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ring::{NameRef, TraceRing};
    use std::sync::Arc;

    fn name(s: &str) -> NameRef {
        Arc::from(s)
    }

    fn dump_trace(ring: &TraceRing) -> String {
        let mut out = Vec::new();
        write_trace(&ring.snapshot(), &mut out).expect("dump failed");
        String::from_utf8(out).expect("dump not utf-8")
    }

    fn dump_stats(ring: &TraceRing) -> String {
        let mut out = Vec::new();
        write_statistics(&ring.snapshot(), &mut out).expect("dump failed");
        String::from_utf8(out).expect("dump not utf-8")
    }

    #[test]
    fn trace_lines_use_fixed_layout() {
        let ring = TraceRing::new();
        ring.log(&name("Sensor"), TraceEvent::Release, 42);
        let text = dump_trace(&ring);
        assert!(text.contains("[   42 ms] Sensor     RELEASE\n"), "{text}");
    }

    #[test]
    fn supervisor_switch_noise_is_filtered() {
        let ring = TraceRing::new();
        let sup = name("PTL_Sup");
        ring.log(&sup, TraceEvent::SwitchIn, 1);
        ring.log(&sup, TraceEvent::SwitchOut, 1);
        ring.log(&sup, TraceEvent::Release, 2);
        ring.log(&name("Worker"), TraceEvent::SwitchIn, 3);

        let text = dump_trace(&ring);
        assert!(!text.contains("PTL_Sup    SWITCH_IN"), "{text}");
        assert!(!text.contains("PTL_Sup    SWITCH_OUT"), "{text}");
        // Non-switch supervisor records and other tasks' switches stay.
        assert!(text.contains("PTL_Sup    RELEASE"), "{text}");
        assert!(text.contains("Worker     SWITCH_IN"), "{text}");
    }

    #[test]
    fn overhead_annotated_ok_when_within_budget() {
        let ring = TraceRing::new();
        let task = name("T1");
        // 1000 ms run, 50 ms idle: 95% utilization, 5% overhead.
        ring.track_idle_entry(0);
        ring.track_idle_exit(50);
        ring.log(&task, TraceEvent::Complete, 1000);

        let text = dump_stats(&ring);
        assert!(text.contains("CPU Utilization:    95.00%"), "{text}");
        assert!(text.contains("System Overhead:    5.00% [OK]"), "{text}");
    }

    #[test]
    fn overhead_annotated_fail_above_budget() {
        let ring = TraceRing::new();
        let task = name("T1");
        // 1000 ms run, 200 ms idle: 80% utilization, 20% overhead.
        ring.track_idle_entry(0);
        ring.track_idle_exit(200);
        ring.log(&task, TraceEvent::Complete, 1000);

        let text = dump_stats(&ring);
        assert!(
            text.contains("System Overhead:    20.00% [FAIL - Required <=10%]"),
            "{text}"
        );
    }

    #[test]
    fn overhead_not_meaningful_under_low_load() {
        let ring = TraceRing::new();
        let task = name("T1");
        // 1000 ms run, 700 ms idle: 30% utilization.
        ring.track_idle_entry(0);
        ring.track_idle_exit(700);
        ring.log(&task, TraceEvent::Complete, 1000);

        let text = dump_stats(&ring);
        assert!(text.contains("System Overhead:    N/A (low CPU load)"), "{text}");
    }
}
