#![doc = r#"# ptl-trace

Scheduling trace for the periodic task layer.

Every scheduling decision lands in a fixed-capacity circular event log
that is safe to write from any context, including interrupt-style hooks.
An offline reducer turns a snapshot of the log into aggregate statistics,
and the dump module renders both in the human-readable form the serial
console expects.

- [`event`] – closed vocabulary of trace events.
- [`ring`]  – circular record buffer and idle-time accounting.
- [`stats`] – one-pass statistics reduction over a snapshot.
- [`dump`]  – trace and statistics writers for byte-oriented sinks.
"#]

pub mod dump;
pub mod event;
pub mod ring;
pub mod stats;

pub use dump::{write_statistics, write_trace, TraceError, SUPERVISOR_PREFIX};
pub use event::TraceEvent;
pub use ring::{NameRef, TraceRecord, TraceRing, TraceSnapshot, TRACE_CAPACITY};
pub use stats::TraceStats;
