#![doc = r#"# ptl-kernel

Hosted kernel primitives for the periodic task layer.

This crate renders the small slice of an RTOS surface the layer needs on
top of `std::thread`, so the scheduling engine built above it stays
kernel-shaped:

- [`clock`]  – monotonic tick clock with absolute-deadline sleep.
- [`task`]   – task creation and cancellation-based deletion.
- [`notify`] – single-slot wake notification.
- [`burn`]   – calibrated busy-loop CPU burner for workload simulation.
- [`sync`]   – mutex wrapper shared by the crates in this workspace.

Priorities are carried per task and validated by the layer, but are
advisory on a hosted OS; timing guarantees degrade gracefully to what the
host scheduler provides.
"#]

pub mod burn;
pub mod clock;
pub mod notify;
pub mod sync;
pub mod task;

pub use clock::{Clock, ManualClock, SystemClock, Tick};
pub use notify::Notification;
pub use task::{CancelToken, TaskHandle};
