use std::convert::TryFrom;

use anyhow::{anyhow, Result};
use chrono::{DateTime, TimeZone, Utc};

pub fn to_i32(value: i64, field: &str) -> Result<i32> {
    i32::try_from(value).map_err(|_| anyhow!("{field} value {value} is out of range"))
}

pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

pub fn millis_to_datetime<Tz: TimeZone>(millis: i64, tz: &Tz, field: &str) -> Result<DateTime<Tz>> {
    DateTime::<Utc>::from_timestamp_millis(millis)
        .map(|dt| dt.with_timezone(tz))
        .ok_or_else(|| anyhow!("{field} timestamp {millis} is out of range"))
}
