use anyhow::{Context, Result};
use rusqlite::{params, OptionalExtension, Row};

use crate::db::{connection::Database, helpers::to_i32, models::SleepNight};

const NIGHT_COLUMNS: &str = "night_id, start_time_milli, end_time_milli, quality_rating";

fn row_to_night(row: &Row) -> Result<SleepNight> {
    let quality_rating: i64 = row.get("quality_rating")?;

    Ok(SleepNight {
        night_id: row.get("night_id")?,
        start_time_milli: row.get("start_time_milli")?,
        end_time_milli: row.get("end_time_milli")?,
        sleep_quality: to_i32(quality_rating, "quality_rating")?,
    })
}

impl Database {
    /// Inserts `night` and returns it with the id the store assigned.
    pub async fn insert_night(&self, night: &SleepNight) -> Result<SleepNight> {
        let mut record = night.clone();
        let inserted = self.execute(move |conn| {
            conn.execute(
                "INSERT INTO daily_sleep_quality_table (start_time_milli, end_time_milli, quality_rating)
                 VALUES (?1, ?2, ?3)",
                params![
                    record.start_time_milli,
                    record.end_time_milli,
                    record.sleep_quality,
                ],
            )
            .context("failed to insert night")?;
            record.night_id = conn.last_insert_rowid();
            Ok(record)
        })
        .await?;
        self.mark_changed();
        Ok(inserted)
    }

    /// Writes every field of `night` back to its row.
    ///
    /// Returns `false` when no row with that id exists anymore.
    pub async fn update_night(&self, night: &SleepNight) -> Result<bool> {
        let record = night.clone();
        let updated = self.execute(move |conn| {
            let rows_affected = conn
                .execute(
                    "UPDATE daily_sleep_quality_table
                     SET start_time_milli = ?1,
                         end_time_milli = ?2,
                         quality_rating = ?3
                     WHERE night_id = ?4",
                    params![
                        record.start_time_milli,
                        record.end_time_milli,
                        record.sleep_quality,
                        record.night_id,
                    ],
                )
                .with_context(|| format!("failed to update night {}", record.night_id))?;
            Ok(rows_affected > 0)
        })
        .await?;
        if updated {
            self.mark_changed();
        }
        Ok(updated)
    }

    /// Deletes every night. Returns how many rows were removed.
    pub async fn clear_nights(&self) -> Result<usize> {
        let removed = self.execute(|conn| {
            let removed = conn
                .execute("DELETE FROM daily_sleep_quality_table", [])
                .context("failed to clear nights")?;
            Ok(removed)
        })
        .await?;
        self.mark_changed();
        Ok(removed)
    }

    pub async fn get_night(&self, night_id: i64) -> Result<Option<SleepNight>> {
        self.execute(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {NIGHT_COLUMNS}
                 FROM daily_sleep_quality_table
                 WHERE night_id = ?1"
            ))?;

            let night = stmt
                .query_row(params![night_id], |row| Ok(row_to_night(row)))
                .optional()?
                .transpose()?;
            Ok(night)
        })
        .await
    }

    /// Most recently inserted night, open or not.
    pub async fn get_tonight(&self) -> Result<Option<SleepNight>> {
        self.execute(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {NIGHT_COLUMNS}
                 FROM daily_sleep_quality_table
                 ORDER BY night_id DESC
                 LIMIT 1"
            ))?;

            let mut rows = stmt.query([])?;
            let night = match rows.next()? {
                Some(row) => Some(row_to_night(row)?),
                None => None,
            };
            Ok(night)
        })
        .await
    }

    /// All nights, latest start first.
    pub async fn get_all_nights(&self) -> Result<Vec<SleepNight>> {
        self.execute(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {NIGHT_COLUMNS}
                 FROM daily_sleep_quality_table
                 ORDER BY start_time_milli DESC, night_id DESC"
            ))?;

            let mut rows = stmt.query([])?;
            let mut nights = Vec::new();
            while let Some(row) = rows.next()? {
                nights.push(row_to_night(row)?);
            }

            Ok(nights)
        })
        .await
    }
}
