pub mod controller;
pub mod state;

pub use controller::{Clock, SleepTrackerController, TrackerEvent};
pub use state::{TrackerSnapshot, TrackerState};
