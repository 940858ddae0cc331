pub mod recorder;

pub use recorder::SleepQualityRecorder;
