pub mod night;

pub use night::{SleepNight, SleepQuality, UNRATED_QUALITY};
