use thiserror::Error;

/// Failures surfaced by the tracker and quality recorder.
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("night {night_id} is still being tracked")]
    AlreadyTracking { night_id: i64 },

    #[error("night {night_id} is already rated")]
    AlreadyRated { night_id: i64 },

    #[error("sleep quality must be between 0 and 5, got {0}")]
    InvalidQuality(i32),

    #[error("component is closed")]
    Closed,

    #[error("storage failure: {0:#}")]
    Storage(#[from] anyhow::Error),
}

pub type TrackerResult<T> = std::result::Result<T, TrackerError>;
