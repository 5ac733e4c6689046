//! Circular trace buffer and idle-time accounting.
//!
//! Producers run in every context the system has: wrapper tasks, the
//! supervisor, and the hooks an external kernel may drive from interrupt
//! level. Writes therefore take the `critical-section` bracket rather
//! than a blocking mutex; readers copy a consistent snapshot out under
//! the same bracket and reduce it at leisure.

use core::cell::RefCell;
use std::sync::Arc;

use critical_section::Mutex as CsMutex;

use ptl_kernel::clock::Tick;

use crate::event::TraceEvent;

/// Number of records the ring holds. Must be a power of two.
pub const TRACE_CAPACITY: usize = 1024;

/// Name tag on a trace record.
///
/// Shared so records can be copied out of the ring without allocating
/// inside the critical section.
pub type NameRef = Arc<str>;

/// One recorded scheduling event.
#[derive(Debug, Clone)]
pub struct TraceRecord {
    pub name: NameRef,
    pub event: TraceEvent,
    pub timestamp: Tick,
}

struct RingState {
    records: Box<[Option<TraceRecord>]>,
    write_index: usize,
    wrapped: bool,
    idle_total: Tick,
    last_idle_entry: Tick,
}

impl RingState {
    fn new() -> Self {
        Self {
            records: vec![None; TRACE_CAPACITY].into_boxed_slice(),
            write_index: 0,
            wrapped: false,
            idle_total: 0,
            last_idle_entry: 0,
        }
    }

    fn push(&mut self, name: &NameRef, event: TraceEvent, timestamp: Tick) {
        self.records[self.write_index] = Some(TraceRecord {
            name: Arc::clone(name),
            event,
            timestamp,
        });
        self.write_index += 1;
        if self.write_index >= TRACE_CAPACITY {
            self.write_index = 0;
            self.wrapped = true;
        }
    }

    fn readable_range(&self) -> (usize, usize) {
        if self.wrapped {
            (self.write_index, TRACE_CAPACITY)
        } else {
            (0, self.write_index)
        }
    }
}

/// Consistent copy of the readable range plus idle accounting.
///
/// Records are ordered oldest to newest; after the ring has wrapped,
/// exactly [`TRACE_CAPACITY`] of the most recent records remain.
#[derive(Debug, Clone)]
pub struct TraceSnapshot {
    pub records: Vec<TraceRecord>,
    pub idle_time: Tick,
}

/// Fixed-capacity circular event log.
pub struct TraceRing {
    state: CsMutex<RefCell<RingState>>,
    idle_name: NameRef,
}

impl TraceRing {
    pub fn new() -> Self {
        Self {
            state: CsMutex::new(RefCell::new(RingState::new())),
            idle_name: Arc::from("IDLE"),
        }
    }

    /// Clears all records and idle accounting.
    pub fn reset(&self) {
        critical_section::with(|cs| {
            let mut state = self.state.borrow_ref_mut(cs);
            state.records.iter_mut().for_each(|slot| *slot = None);
            state.write_index = 0;
            state.wrapped = false;
            state.idle_total = 0;
            state.last_idle_entry = 0;
        });
    }

    /// Appends one record.
    pub fn log(&self, name: &NameRef, event: TraceEvent, timestamp: Tick) {
        critical_section::with(|cs| {
            self.state.borrow_ref_mut(cs).push(name, event, timestamp);
        });
    }

    /// Appends two records back to back, with no other producer between
    /// them. Policy decisions use this so an overrun record and the
    /// release it triggers stay adjacent in trace order.
    pub fn log_pair(
        &self,
        name: &NameRef,
        first: TraceEvent,
        second: TraceEvent,
        timestamp: Tick,
    ) {
        critical_section::with(|cs| {
            let mut state = self.state.borrow_ref_mut(cs);
            state.push(name, first, timestamp);
            state.push(name, second, timestamp);
        });
    }

    /// Records the idle task being scheduled in.
    pub fn track_idle_entry(&self, time: Tick) {
        critical_section::with(|cs| {
            let mut state = self.state.borrow_ref_mut(cs);
            state.last_idle_entry = time;
            let name = Arc::clone(&self.idle_name);
            state.push(&name, TraceEvent::IdleStart, time);
        });
    }

    /// Records the idle task being scheduled out and accumulates the
    /// elapsed idle span.
    pub fn track_idle_exit(&self, time: Tick) {
        critical_section::with(|cs| {
            let mut state = self.state.borrow_ref_mut(cs);
            if time >= state.last_idle_entry {
                state.idle_total += time - state.last_idle_entry;
            }
            let name = Arc::clone(&self.idle_name);
            state.push(&name, TraceEvent::IdleEnd, time);
        });
    }

    /// Copies the readable range out, oldest record first.
    pub fn snapshot(&self) -> TraceSnapshot {
        critical_section::with(|cs| {
            let state = self.state.borrow_ref(cs);
            let (start, count) = state.readable_range();
            let mut records = Vec::with_capacity(count);
            for i in 0..count {
                let idx = (start + i) % TRACE_CAPACITY;
                if let Some(record) = &state.records[idx] {
                    records.push(record.clone());
                }
            }
            TraceSnapshot {
                records,
                idle_time: state.idle_total,
            }
        })
    }
}

impl Default for TraceRing {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> NameRef {
        Arc::from(s)
    }

    #[test]
    fn records_come_back_in_write_order() {
        let ring = TraceRing::new();
        let task = name("T1");
        ring.log(&task, TraceEvent::Release, 10);
        ring.log(&task, TraceEvent::Start, 10);
        ring.log(&task, TraceEvent::Complete, 14);

        let snap = ring.snapshot();
        assert_eq!(snap.records.len(), 3);
        assert_eq!(snap.records[0].event, TraceEvent::Release);
        assert_eq!(snap.records[2].event, TraceEvent::Complete);
        assert_eq!(snap.records[2].timestamp, 14);
    }

    #[test]
    fn wrap_keeps_exactly_the_most_recent_capacity_records() {
        let ring = TraceRing::new();
        let task = name("spin");
        let extra = 10;
        for i in 0..(TRACE_CAPACITY + extra) {
            ring.log(&task, TraceEvent::Release, i as Tick);
        }

        let snap = ring.snapshot();
        assert_eq!(snap.records.len(), TRACE_CAPACITY);
        // Oldest surviving record is the first one after the overwrite.
        assert_eq!(snap.records[0].timestamp, extra as Tick);
        assert_eq!(
            snap.records[TRACE_CAPACITY - 1].timestamp,
            (TRACE_CAPACITY + extra - 1) as Tick
        );
    }

    #[test]
    fn log_pair_is_adjacent() {
        let ring = TraceRing::new();
        let task = name("T1");
        ring.log_pair(&task, TraceEvent::OverrunCatchup, TraceEvent::Release, 100);

        let snap = ring.snapshot();
        assert_eq!(snap.records.len(), 2);
        assert_eq!(snap.records[0].event, TraceEvent::OverrunCatchup);
        assert_eq!(snap.records[1].event, TraceEvent::Release);
        assert_eq!(snap.records[0].timestamp, snap.records[1].timestamp);
    }

    #[test]
    fn idle_spans_accumulate() {
        let ring = TraceRing::new();
        ring.track_idle_entry(100);
        ring.track_idle_exit(130);
        ring.track_idle_entry(200);
        ring.track_idle_exit(250);

        let snap = ring.snapshot();
        assert_eq!(snap.idle_time, 80);
        assert_eq!(snap.records.len(), 4);
        assert_eq!(snap.records[0].event, TraceEvent::IdleStart);
        assert_eq!(snap.records[1].event, TraceEvent::IdleEnd);
    }

    #[test]
    fn backwards_idle_exit_is_ignored() {
        let ring = TraceRing::new();
        ring.track_idle_entry(100);
        ring.track_idle_exit(90);
        assert_eq!(ring.snapshot().idle_time, 0);
    }

    #[test]
    fn reset_clears_everything() {
        let ring = TraceRing::new();
        let task = name("T1");
        ring.log(&task, TraceEvent::Release, 1);
        ring.track_idle_entry(2);
        ring.track_idle_exit(5);
        ring.reset();

        let snap = ring.snapshot();
        assert!(snap.records.is_empty());
        assert_eq!(snap.idle_time, 0);
    }
}
