use std::fmt::Write;

use chrono::TimeZone;

use crate::db::{helpers::millis_to_datetime, SleepNight};

const DATE_FORMAT: &str = "%A %b-%d-%Y Time: %H:%M";

pub fn quality_label(rating: i32) -> &'static str {
    crate::db::SleepQuality::from_rating(rating)
        .map(|quality| quality.label())
        .unwrap_or("--")
}

fn format_timestamp<Tz: TimeZone>(millis: i64, tz: &Tz) -> String
where
    Tz::Offset: std::fmt::Display,
{
    match millis_to_datetime(millis, tz, "timestamp") {
        Ok(dt) => dt.format(DATE_FORMAT).to_string(),
        Err(_) => millis.to_string(),
    }
}

fn format_duration(duration_ms: i64) -> String {
    let total_secs = duration_ms / 1000;
    format!(
        "{}:{:02}:{:02}",
        total_secs / 3600,
        (total_secs / 60) % 60,
        total_secs % 60
    )
}

/// Renders the sleep history as plain text, one block per night.
///
/// Open nights only show their start.
pub fn format_nights<Tz: TimeZone>(nights: &[SleepNight], tz: &Tz) -> String
where
    Tz::Offset: std::fmt::Display,
{
    let mut out = String::from("Here is your sleep data:\n");
    for night in nights {
        out.push('\n');
        let _ = writeln!(
            out,
            "Start: {}",
            format_timestamp(night.start_time_milli, tz)
        );
        if !night.is_open() {
            let _ = writeln!(out, "End: {}", format_timestamp(night.end_time_milli, tz));
            let _ = writeln!(out, "Quality: {}", quality_label(night.sleep_quality));
            let _ = writeln!(
                out,
                "Hours:Minutes:Seconds: {}",
                format_duration(night.duration_ms())
            );
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    const JAN_1_2024_22H: i64 = 1_704_146_400_000;

    #[test]
    fn test_quality_labels() {
        // Arrange / Act / Assert
        assert_eq!(quality_label(0), "Very bad");
        assert_eq!(quality_label(2), "So-so");
        assert_eq!(quality_label(4), "Pretty good");
        assert_eq!(quality_label(-1), "--");
        assert_eq!(quality_label(9), "--");
    }

    #[test]
    fn test_format_duration_splits_hours_minutes_seconds() {
        // Arrange / Act / Assert
        assert_eq!(format_duration(0), "0:00:00");
        assert_eq!(format_duration(8 * 3_600_000 + 30 * 60_000 + 5_000), "8:30:05");
    }

    #[test]
    fn test_format_nights_renders_closed_night() {
        // Arrange
        let night = SleepNight {
            night_id: 1,
            start_time_milli: JAN_1_2024_22H,
            end_time_milli: JAN_1_2024_22H + 8 * 3_600_000 + 30 * 60_000,
            sleep_quality: 4,
        };

        // Act
        let text = format_nights(&[night], &Utc);

        // Assert
        assert_eq!(
            text,
            "Here is your sleep data:\n\
             \n\
             Start: Monday Jan-01-2024 Time: 22:00\n\
             End: Tuesday Jan-02-2024 Time: 06:30\n\
             Quality: Pretty good\n\
             Hours:Minutes:Seconds: 8:30:00\n"
        );
    }

    #[test]
    fn test_format_nights_shows_only_start_for_open_night() {
        // Arrange
        let night = SleepNight::starting_at(JAN_1_2024_22H);

        // Act
        let text = format_nights(&[night], &Utc);

        // Assert
        assert!(text.contains("Start: Monday Jan-01-2024 Time: 22:00"));
        assert!(!text.contains("End:"));
        assert!(!text.contains("Quality:"));
    }

    #[test]
    fn test_format_nights_with_empty_history() {
        // Arrange / Act
        let text = format_nights(&[], &Utc);

        // Assert
        assert_eq!(text, "Here is your sleep data:\n");
    }
}
