//! Sleep night records and quality ratings.


/// Quality value stored for a night that has not been rated yet.
pub const UNRATED_QUALITY: i32 = -1;

/// One recorded sleep interval.
///
/// A night is open while `end_time_milli == start_time_milli`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SleepNight {
    /// Assigned by the store on insert; `0` before that.
    pub night_id: i64,
    pub start_time_milli: i64,
    pub end_time_milli: i64,
    pub sleep_quality: i32,
}

impl SleepNight {
    /// A new, unsaved, open night starting at `start_time_milli`.
    pub fn starting_at(start_time_milli: i64) -> Self {
        Self {
            night_id: 0,
            start_time_milli,
            end_time_milli: start_time_milli,
            sleep_quality: UNRATED_QUALITY,
        }
    }

    pub fn is_open(&self) -> bool {
        self.end_time_milli == self.start_time_milli
    }

    pub fn is_rated(&self) -> bool {
        self.sleep_quality != UNRATED_QUALITY
    }

    pub fn duration_ms(&self) -> i64 {
        (self.end_time_milli - self.start_time_milli).max(0)
    }

    pub fn quality(&self) -> Option<SleepQuality> {
        SleepQuality::from_rating(self.sleep_quality)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SleepQuality {
    VeryBad,
    Poor,
    SoSo,
    Ok,
    PrettyGood,
    Excellent,
}

impl SleepQuality {
    pub fn from_rating(rating: i32) -> Option<Self> {
        match rating {
            0 => Some(SleepQuality::VeryBad),
            1 => Some(SleepQuality::Poor),
            2 => Some(SleepQuality::SoSo),
            3 => Some(SleepQuality::Ok),
            4 => Some(SleepQuality::PrettyGood),
            5 => Some(SleepQuality::Excellent),
            _ => None,
        }
    }

    pub fn rating(self) -> i32 {
        match self {
            SleepQuality::VeryBad => 0,
            SleepQuality::Poor => 1,
            SleepQuality::SoSo => 2,
            SleepQuality::Ok => 3,
            SleepQuality::PrettyGood => 4,
            SleepQuality::Excellent => 5,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SleepQuality::VeryBad => "Very bad",
            SleepQuality::Poor => "Poor",
            SleepQuality::SoSo => "So-so",
            SleepQuality::Ok => "OK",
            SleepQuality::PrettyGood => "Pretty good",
            SleepQuality::Excellent => "Excellent",
        }
    }
}
