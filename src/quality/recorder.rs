use std::future::Future;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::{
    db::{Database, SleepNight, SleepQuality},
    error::{TrackerError, TrackerResult},
    signals::SignalQueue,
};

const ENABLE_LOGS: bool = true;

use crate::log_info;

/// Attaches a quality rating to a stopped night, then asks to go back to the
/// tracker.
pub struct SleepQualityRecorder {
    db: Database,
    in_flight: Mutex<()>,
    navigate_back: SignalQueue<()>,
    cancel_token: CancellationToken,
}

impl SleepQualityRecorder {
    pub fn new(db: Database) -> Self {
        Self {
            db,
            in_flight: Mutex::new(()),
            navigate_back: SignalQueue::new(),
            cancel_token: CancellationToken::new(),
        }
    }

    /// Rates `night_id`. An unknown id is ignored and returns `None`.
    pub async fn record_quality(
        &self,
        night_id: i64,
        quality: i32,
    ) -> TrackerResult<Option<SleepNight>> {
        let quality =
            SleepQuality::from_rating(quality).ok_or(TrackerError::InvalidQuality(quality))?;
        let _guard = self.in_flight.lock().await;

        let Some(mut night) = self.scoped(self.db.get_night(night_id)).await? else {
            return Ok(None);
        };

        if !night.is_open() && night.is_rated() {
            return Err(TrackerError::AlreadyRated { night_id });
        }

        night.sleep_quality = quality.rating();
        if !self.scoped(self.db.update_night(&night)).await? {
            return Ok(None);
        }

        log_info!("Night {} rated {}", night_id, quality.label());
        self.navigate_back.raise(());
        Ok(Some(night))
    }

    /// Whether the "back to tracker" navigation is still unhandled.
    pub fn pending_navigation(&self) -> bool {
        self.navigate_back.peek().is_some()
    }

    pub fn on_navigation_handled(&self) {
        self.navigate_back.acknowledge();
    }

    /// Waits until a navigation back is pending, without consuming it.
    pub async fn next_event(&self) {
        self.navigate_back.next().await
    }

    pub fn close(&self) {
        self.cancel_token.cancel();
    }

    async fn scoped<T, F>(&self, fut: F) -> TrackerResult<T>
    where
        F: Future<Output = anyhow::Result<T>>,
    {
        tokio::select! {
            biased;
            _ = self.cancel_token.cancelled() => Err(TrackerError::Closed),
            result = fut => result.map_err(TrackerError::from),
        }
    }
}

impl Drop for SleepQualityRecorder {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}
