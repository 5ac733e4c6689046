//! Trace event vocabulary.

use core::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Scheduling events recorded by the trace ring.
///
/// The set is closed: the statistics reducer and the dump filter both
/// match on it exhaustively.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TraceEvent {
    /// A job became eligible to run.
    Release,
    /// A job body started executing.
    Start,
    /// A job body finished.
    Complete,
    /// A job was observed past its absolute deadline.
    DeadlineMiss,
    /// Overrun handled by dropping the new release.
    OverrunSkip,
    /// Overrun handled by destroying and recreating the task.
    OverrunKill,
    /// Overrun handled by releasing immediately over the late job.
    OverrunCatchup,
    /// A task was switched onto the CPU.
    SwitchIn,
    /// A task was switched off the CPU.
    SwitchOut,
    /// The idle task was scheduled in.
    IdleStart,
    /// The idle task was scheduled out.
    IdleEnd,
}

impl TraceEvent {
    /// Display name used in trace dumps.
    pub fn name(self) -> &'static str {
        match self {
            Self::Release => "RELEASE",
            Self::Start => "START",
            Self::Complete => "COMPLETE",
            Self::DeadlineMiss => "DEADLINE_MISS",
            Self::OverrunSkip => "OVERRUN_SKIP",
            Self::OverrunKill => "OVERRUN_KILL",
            Self::OverrunCatchup => "OVERRUN_CATCHUP",
            Self::SwitchIn => "SWITCH_IN",
            Self::SwitchOut => "SWITCH_OUT",
            Self::IdleStart => "IDLE_START",
            Self::IdleEnd => "IDLE_END",
        }
    }

    /// True for the three overrun-policy events.
    pub fn is_overrun(self) -> bool {
        matches!(
            self,
            Self::OverrunSkip | Self::OverrunKill | Self::OverrunCatchup
        )
    }
}

impl fmt::Display for TraceEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
