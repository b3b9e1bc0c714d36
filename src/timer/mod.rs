pub mod commands;
pub mod controller;
pub mod state;

pub use controller::{TimerController, TimerEvent, TimerSnapshot};
pub use state::{format_clock, SessionSwitch, SessionType, TickOutcome, TimerState};
