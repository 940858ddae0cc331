use std::{future::Future, sync::Arc};

use chrono::Local;
use tokio::sync::{watch, Mutex};
use tokio_util::sync::CancellationToken;

use crate::{
    db::{helpers::now_millis, Database, SleepNight},
    error::{TrackerError, TrackerResult},
    signals::SignalQueue,
};

use super::{TrackerSnapshot, TrackerState};

const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

/// Source of "now" in epoch milliseconds.
pub type Clock = Arc<dyn Fn() -> i64 + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerEvent {
    /// A night was stopped and should be rated.
    NavigateToSleepQuality { night_id: i64 },
    HistoryCleared,
}

/// Drives tracking of tonight's sleep.
///
/// Every operation holds the state lock for its whole duration, so calls on
/// one controller apply in the order they were made. Storage calls are tied to
/// the controller's cancellation scope: once [`close`](Self::close) runs,
/// pending calls stop being awaited and new ones fail with
/// [`TrackerError::Closed`].
///
/// Writes made through other handles on the same store (the quality recorder)
/// are picked up by a background task that reloads the history.
pub struct SleepTrackerController {
    state: Arc<Mutex<TrackerState>>,
    db: Database,
    clock: Clock,
    navigation: SignalQueue<i64>,
    notifications: SignalQueue<()>,
    snapshot_tx: Arc<watch::Sender<TrackerSnapshot>>,
    cancel_token: CancellationToken,
}

impl SleepTrackerController {
    pub async fn open(db: Database) -> TrackerResult<Self> {
        Self::open_with_clock(db, Arc::new(now_millis)).await
    }

    /// Builds the controller and loads tonight and the history from `db`.
    pub async fn open_with_clock(db: Database, clock: Clock) -> TrackerResult<Self> {
        let state = TrackerState::new();
        let (snapshot_tx, _) = watch::channel(state.snapshot(&Local));

        let controller = Self {
            state: Arc::new(Mutex::new(state)),
            db,
            clock,
            navigation: SignalQueue::new(),
            notifications: SignalQueue::new(),
            snapshot_tx: Arc::new(snapshot_tx),
            cancel_token: CancellationToken::new(),
        };
        controller.initialize().await?;
        controller.spawn_history_watcher();
        Ok(controller)
    }

    async fn initialize(&self) -> TrackerResult<()> {
        let mut state = self.state.lock().await;
        let latest = self.scoped(self.db.get_tonight()).await?;
        state.resume(latest);
        self.reload(&mut state).await?;

        if let Some(night) = &state.tonight {
            log_info!("Resuming night {} started at {}", night.night_id, night.start_time_milli);
        }
        Ok(())
    }

    fn spawn_history_watcher(&self) {
        let db = self.db.clone();
        let state = Arc::clone(&self.state);
        let snapshot_tx = Arc::clone(&self.snapshot_tx);
        let cancel_token = self.cancel_token.clone();
        let mut changes = db.watch_changes();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = cancel_token.cancelled() => break,
                    changed = changes.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }

                let revision = *changes.borrow_and_update();
                let mut state = state.lock().await;
                if state.history_revision == revision {
                    continue;
                }
                if let Err(err) =
                    reload_history(&db, &cancel_token, &mut state, &snapshot_tx).await
                {
                    log_warn!("Failed to reload sleep history: {}", err);
                }
            }
        });
    }

    /// Current state. Reloads the history first when the store changed since
    /// it was last read.
    pub async fn snapshot(&self) -> TrackerSnapshot {
        let mut state = self.state.lock().await;
        if state.history_revision != self.db.revision() {
            self.refresh(&mut state).await;
        }
        state.snapshot(&Local)
    }

    /// Receiver that always holds the latest snapshot.
    pub fn subscribe(&self) -> watch::Receiver<TrackerSnapshot> {
        self.snapshot_tx.subscribe()
    }

    pub async fn start_tracking(&self) -> TrackerResult<SleepNight> {
        let mut state = self.state.lock().await;
        if let Some(open) = state.open_night() {
            return Err(TrackerError::AlreadyTracking {
                night_id: open.night_id,
            });
        }

        let new_night = SleepNight::starting_at((self.clock)());
        let night = self.scoped(self.db.insert_night(&new_night)).await?;
        state.tonight = Some(night.clone());
        log_info!("Started tracking night {}", night.night_id);

        self.refresh(&mut state).await;
        Ok(night)
    }

    /// Ends tonight and asks for it to be rated.
    ///
    /// Returns `None` without touching storage when nothing is being tracked.
    pub async fn stop_tracking(&self) -> TrackerResult<Option<SleepNight>> {
        let mut state = self.state.lock().await;
        let Some(mut night) = state.tonight.clone() else {
            return Ok(None);
        };

        // A stopped night must never read as open again.
        night.end_time_milli = (self.clock)().max(night.start_time_milli + 1);

        let updated = self.scoped(self.db.update_night(&night)).await?;
        state.tonight = None;

        if updated {
            log_info!(
                "Stopped night {} after {} ms",
                night.night_id,
                night.duration_ms()
            );
            self.navigation.raise(night.night_id);
        } else {
            log_warn!("Night {} disappeared before it could be stopped", night.night_id);
        }

        self.refresh(&mut state).await;
        Ok(updated.then_some(night))
    }

    pub async fn clear_history(&self) -> TrackerResult<()> {
        let mut state = self.state.lock().await;
        let removed = self.scoped(self.db.clear_nights()).await?;
        state.tonight = None;
        log_info!("Cleared {} nights", removed);
        self.notifications.raise(());

        self.refresh(&mut state).await;
        Ok(())
    }

    /// Id of the night waiting to be rated, until the navigation is handled.
    pub fn pending_navigation(&self) -> Option<i64> {
        self.navigation.peek()
    }

    pub fn on_navigation_handled(&self) {
        self.navigation.acknowledge();
    }

    /// Whether the "history cleared" notice still has to be shown.
    pub fn pending_notification(&self) -> bool {
        self.notifications.peek().is_some()
    }

    pub fn on_notification_handled(&self) {
        self.notifications.acknowledge();
    }

    /// Waits for the next unhandled event. The event stays pending until it
    /// is acknowledged.
    pub async fn next_event(&self) -> TrackerEvent {
        tokio::select! {
            biased;
            night_id = self.navigation.next() => TrackerEvent::NavigateToSleepQuality { night_id },
            () = self.notifications.next() => TrackerEvent::HistoryCleared,
        }
    }

    pub fn close(&self) {
        self.cancel_token.cancel();
    }

    async fn reload(&self, state: &mut TrackerState) -> TrackerResult<()> {
        reload_history(&self.db, &self.cancel_token, state, &self.snapshot_tx).await
    }

    /// Reloads after a write that already succeeded. A failed read keeps the
    /// previous history but still publishes the new tonight.
    async fn refresh(&self, state: &mut TrackerState) {
        if let Err(err) = self.reload(state).await {
            log_warn!("Failed to reload sleep history: {}", err);
            self.snapshot_tx.send_replace(state.snapshot(&Local));
        }
    }

    async fn scoped<T, F>(&self, fut: F) -> TrackerResult<T>
    where
        F: Future<Output = anyhow::Result<T>>,
    {
        scoped(&self.cancel_token, fut).await
    }
}

impl Drop for SleepTrackerController {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}

async fn reload_history(
    db: &Database,
    cancel_token: &CancellationToken,
    state: &mut TrackerState,
    snapshot_tx: &watch::Sender<TrackerSnapshot>,
) -> TrackerResult<()> {
    let revision = db.revision();
    state.nights = scoped(cancel_token, db.get_all_nights()).await?;
    state.history_revision = revision;
    snapshot_tx.send_replace(state.snapshot(&Local));
    Ok(())
}

async fn scoped<T, F>(cancel_token: &CancellationToken, fut: F) -> TrackerResult<T>
where
    F: Future<Output = anyhow::Result<T>>,
{
    tokio::select! {
        biased;
        _ = cancel_token.cancelled() => Err(TrackerError::Closed),
        result = fut => result.map_err(TrackerError::from),
    }
}
