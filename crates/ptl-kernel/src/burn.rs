//! Calibrated busy-loop CPU burner.
//!
//! Jobs simulate real workloads by consuming CPU instead of sleeping, so
//! the supervisor has genuine overruns and preemption to manage. The
//! burner is calibrated once against the tick clock before any job runs;
//! afterwards `burn` reads the shared loops-per-millisecond cell without
//! synchronization, which is benign because calibration strictly precedes
//! the first burner call.

use std::hint::black_box;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::clock::{Clock, Tick};
use crate::task;

/// Conservative default until calibration has run.
const DEFAULT_LOOPS_PER_MS: u32 = 250_000;

/// Ticks sampled during calibration.
const CALIBRATION_TICKS: Tick = 100;

/// Loop count between clock reads while calibrating.
const BLOCK_SIZE: u32 = 1_000;

static LOOPS_PER_MS: AtomicU32 = AtomicU32::new(DEFAULT_LOOPS_PER_MS);

/// Measures busy-loop throughput against the tick clock and stores the
/// result for [`burn`]. Returns the measured loops per millisecond.
pub fn calibrate(clock: &dyn Clock) -> u32 {
    // Sync to a tick edge so the sample window starts clean.
    let edge = clock.now();
    while clock.now() == edge {
        std::hint::spin_loop();
    }

    let start = clock.now();
    let mut total: u64 = 0;
    loop {
        for i in 0..BLOCK_SIZE {
            black_box(i);
        }
        total += u64::from(BLOCK_SIZE);
        if clock.now().wrapping_sub(start) >= CALIBRATION_TICKS {
            break;
        }
    }

    let loops = (total / u64::from(CALIBRATION_TICKS)) as u32;
    if loops > 0 {
        LOOPS_PER_MS.store(loops, Ordering::Relaxed);
    }
    loops
}

/// Burns roughly `ms` milliseconds of CPU.
///
/// Checks for task deletion once per simulated millisecond, so a deleted
/// job leaves its stack within one millisecond of the delete.
pub fn burn(ms: u32) {
    for _ in 0..ms {
        task::cancel_point();
        let loops = LOOPS_PER_MS.load(Ordering::Relaxed);
        for i in 0..loops {
            black_box(i);
        }
    }
}

/// Currently calibrated loops per millisecond.
pub fn loops_per_ms() -> u32 {
    LOOPS_PER_MS.load(Ordering::Relaxed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;

    #[test]
    fn calibration_produces_a_positive_rate() {
        let clock = SystemClock::new();
        let loops = calibrate(&clock);
        assert!(loops > 0);
        assert_eq!(loops_per_ms(), loops);
    }

    #[test]
    fn burn_consumes_roughly_the_requested_time() {
        let clock = SystemClock::new();
        calibrate(&clock);

        let before = clock.now();
        burn(20);
        let elapsed = clock.now() - before;

        // Generous bounds; hosts vary and the point is the order of
        // magnitude, not precision.
        assert!(elapsed >= 5, "burned only {elapsed} ms");
        assert!(elapsed < 500, "burned {elapsed} ms");
    }
}
