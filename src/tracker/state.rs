use chrono::TimeZone;

use crate::{db::SleepNight, format::format_nights};

#[derive(Debug, Clone, Default)]
pub struct TrackerState {
    /// The night being tracked right now. Never a closed night.
    pub tonight: Option<SleepNight>,
    /// Whole history, latest start first.
    pub nights: Vec<SleepNight>,
    /// Store revision `nights` was loaded at.
    pub history_revision: u64,
}

/// What the presentation layer renders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerSnapshot {
    pub tonight: Option<SleepNight>,
    pub nights_text: String,
    pub start_enabled: bool,
    pub stop_enabled: bool,
    pub clear_enabled: bool,
}

impl TrackerState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `tonight` from the most recent stored night, dropping it when it
    /// has already been stopped.
    pub fn resume(&mut self, latest: Option<SleepNight>) {
        self.tonight = latest.filter(SleepNight::is_open);
    }

    pub fn open_night(&self) -> Option<&SleepNight> {
        self.tonight.as_ref().filter(|night| night.is_open())
    }

    pub fn snapshot<Tz: TimeZone>(&self, tz: &Tz) -> TrackerSnapshot
    where
        Tz::Offset: std::fmt::Display,
    {
        TrackerSnapshot {
            tonight: self.tonight.clone(),
            nights_text: format_nights(&self.nights, tz),
            start_enabled: self.tonight.is_none(),
            stop_enabled: self.tonight.is_some(),
            clear_enabled: !self.nights.is_empty(),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn closed_night() -> SleepNight {
        SleepNight {
            night_id: 1,
            start_time_milli: 100,
            end_time_milli: 500,
            sleep_quality: -1,
        }
    }

    #[test]
    fn test_resume_keeps_open_night() {
        // Arrange
        let mut state = TrackerState::new();
        let open = SleepNight {
            night_id: 2,
            ..SleepNight::starting_at(100)
        };

        // Act
        state.resume(Some(open.clone()));

        // Assert
        assert_eq!(state.tonight, Some(open));
    }

    #[test]
    fn test_resume_never_picks_up_completed_night() {
        // Arrange
        let mut state = TrackerState::new();

        // Act
        state.resume(Some(closed_night()));

        // Assert
        assert_eq!(state.tonight, None);
        assert!(state.open_night().is_none());
    }

    #[test]
    fn test_snapshot_button_flags() {
        // Arrange
        let mut idle = TrackerState::new();
        idle.nights = vec![closed_night()];
        let mut tracking = TrackerState::new();
        tracking.tonight = Some(SleepNight::starting_at(100));

        // Act
        let idle_snapshot = idle.snapshot(&Utc);
        let tracking_snapshot = tracking.snapshot(&Utc);

        // Assert
        assert!(idle_snapshot.start_enabled);
        assert!(!idle_snapshot.stop_enabled);
        assert!(idle_snapshot.clear_enabled);
        assert!(!tracking_snapshot.start_enabled);
        assert!(tracking_snapshot.stop_enabled);
        assert!(!tracking_snapshot.clear_enabled);
    }
}
