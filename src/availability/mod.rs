//! Backend availability: the wake-up state machine, its shared-store
//! persistence and the timers that drive it.

pub mod messages;
pub mod monitor;
pub mod runner;
pub mod state;

pub use monitor::{AvailabilityMonitor, MonitorUpdate};
pub use runner::{AvailabilityRunner, RunnerHandle};
pub use state::{format_countdown, AvailabilityEvent, AvailabilityState, Phase, Transition, WakeRecord};
