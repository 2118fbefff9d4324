use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use s3sync_core::{BackendClient, BackendError, SyncStatus};
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::state::{
    COMPLETED_MESSAGE, ProgressDetail, READY_MESSAGE, STARTING_MESSAGE, STOPPED_MESSAGE,
    SyncState, clamp_progress, progress_detail,
};
use crate::listing::ListingInvalidator;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);
pub const DEFAULT_REVERT_DELAY: Duration = Duration::from_secs(2);
pub const DEFAULT_MAX_POLL_FAILURES: u32 = 20;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("sync folder and bucket must be configured")]
    Configuration,
    #[error("{0}")]
    Remote(String),
    #[error("sync request failed: {0}")]
    Backend(BackendError),
}

impl From<BackendError> for SyncError {
    fn from(err: BackendError) -> Self {
        match err.remote_message() {
            Some(message) => SyncError::Remote(message),
            None => SyncError::Backend(err),
        }
    }
}

/// Local folder to upload and the bucket it goes to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncTarget {
    pub sync_folder: String,
    pub bucket_name: String,
}

impl SyncTarget {
    pub fn new(sync_folder: impl Into<String>, bucket_name: impl Into<String>) -> Self {
        Self {
            sync_folder: sync_folder.into(),
            bucket_name: bucket_name.into(),
        }
    }

    fn require(&self) -> Result<(&str, &str), SyncError> {
        let folder = self.sync_folder.trim();
        let bucket = self.bucket_name.trim();
        if folder.is_empty() || bucket.is_empty() {
            return Err(SyncError::Configuration);
        }
        Ok((folder, bucket))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncTimings {
    pub poll_interval: Duration,
    /// How long `Completed` is shown before reverting to `Idle`.
    pub revert_delay: Duration,
    /// Consecutive failed status polls tolerated before the run is failed.
    pub max_poll_failures: u32,
}

impl Default for SyncTimings {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            revert_delay: DEFAULT_REVERT_DELAY,
            max_poll_failures: DEFAULT_MAX_POLL_FAILURES,
        }
    }
}

#[derive(Default)]
struct Tasks {
    /// Incremented by every start, stop, dismissal and shutdown. Work tagged
    /// with an older run must not touch the state.
    run: u64,
    poll: Option<JoinHandle<()>>,
    revert: Option<JoinHandle<()>>,
}

impl Tasks {
    fn supersede(&mut self) -> u64 {
        if let Some(handle) = self.poll.take() {
            handle.abort();
        }
        if let Some(handle) = self.revert.take() {
            handle.abort();
        }
        self.run += 1;
        self.run
    }
}

enum PollStep {
    Continue,
    Finished { invalidate: bool },
    Superseded,
}

struct Shared {
    client: BackendClient,
    timings: SyncTimings,
    state_tx: watch::Sender<SyncState>,
    tasks: Mutex<Tasks>,
    invalidator: Arc<dyn ListingInvalidator>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Tasks> {
        self.tasks.lock().expect("sync tasks lock poisoned")
    }

    fn publish(&self, state: SyncState) {
        tracing::debug!(state = state.label(), message = state.message(), "sync state");
        self.state_tx.send_replace(state);
    }

    fn is_active(&self) -> bool {
        self.state_tx.borrow().is_active()
    }

    fn apply_report(
        self: &Arc<Self>,
        run: u64,
        report: Result<SyncStatus, BackendError>,
        failures: &mut u32,
    ) -> PollStep {
        let mut tasks = self.lock();
        if tasks.run != run {
            return PollStep::Superseded;
        }

        let status = match report {
            Ok(status) => {
                *failures = 0;
                status
            }
            Err(err) => {
                *failures += 1;
                tracing::warn!(run, failures = *failures, error = %err, "sync status poll failed");
                if *failures < self.timings.max_poll_failures {
                    return PollStep::Continue;
                }
                tasks.poll = None;
                self.publish(SyncState::Failed {
                    message: format!("lost contact with sync backend: {err}"),
                });
                return PollStep::Finished { invalidate: false };
            }
        };

        match status {
            SyncStatus::Progress {
                message,
                progress,
                details,
            } => {
                let (previous_message, previous_progress) = match &*self.state_tx.borrow() {
                    SyncState::Running {
                        message, progress, ..
                    } => (message.clone(), *progress),
                    _ => (String::new(), 0),
                };
                let text = non_empty(message.text()).unwrap_or(previous_message);
                let detail: Option<ProgressDetail> = progress_detail(&message, details.as_ref());
                self.publish(SyncState::Running {
                    message: text,
                    progress: clamp_progress(progress).unwrap_or(previous_progress),
                    detail,
                });
                PollStep::Continue
            }
            SyncStatus::Completed { message } => {
                tasks.poll = None;
                tracing::info!(run, "sync completed");
                self.publish(SyncState::Completed {
                    message: non_empty(message.text())
                        .unwrap_or_else(|| COMPLETED_MESSAGE.to_string()),
                });
                tasks.revert = Some(tokio::spawn(revert_after(Arc::clone(self), run)));
                PollStep::Finished { invalidate: true }
            }
            SyncStatus::Error { message } => {
                tasks.poll = None;
                let message =
                    non_empty(message.text()).unwrap_or_else(|| "Sync failed".to_string());
                tracing::warn!(run, error = %message, "sync reported failure");
                self.publish(SyncState::Failed { message });
                PollStep::Finished { invalidate: false }
            }
            SyncStatus::Status { message, .. } => {
                tasks.poll = None;
                tracing::info!(run, message = message.text(), "sync job ended");
                self.publish(SyncState::Idle {
                    message: non_empty(message.text()).unwrap_or_else(|| READY_MESSAGE.to_string()),
                });
                PollStep::Finished { invalidate: true }
            }
        }
    }
}

fn non_empty(text: &str) -> Option<String> {
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

async fn poll_loop(shared: Arc<Shared>, run: u64) {
    let mut failures = 0u32;
    let mut ticker = tokio::time::interval(shared.timings.poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick is immediate; the first poll waits one interval.
    ticker.tick().await;
    loop {
        ticker.tick().await;
        let report = shared.client.sync_status().await;
        match shared.apply_report(run, report, &mut failures) {
            PollStep::Continue => {}
            PollStep::Finished { invalidate } => {
                if invalidate {
                    shared.invalidator.invalidate_all();
                }
                return;
            }
            PollStep::Superseded => return,
        }
    }
}

async fn revert_after(shared: Arc<Shared>, run: u64) {
    tokio::time::sleep(shared.timings.revert_delay).await;
    let mut tasks = shared.lock();
    if tasks.run != run || !matches!(*shared.state_tx.borrow(), SyncState::Completed { .. }) {
        return;
    }
    tasks.revert = None;
    shared.publish(SyncState::default());
}

/// Drives one upload job at a time through
/// `Idle -> Starting -> Running -> Completed | Failed` and publishes the
/// current [`SyncState`] to subscribers.
///
/// Dropping the machine cancels its poll and revert timers.
pub struct SyncMachine {
    shared: Arc<Shared>,
    target: Mutex<SyncTarget>,
}

impl SyncMachine {
    pub fn new(
        client: BackendClient,
        target: SyncTarget,
        timings: SyncTimings,
        invalidator: Arc<dyn ListingInvalidator>,
    ) -> Self {
        let (state_tx, _) = watch::channel(SyncState::default());
        Self {
            shared: Arc::new(Shared {
                client,
                timings,
                state_tx,
                tasks: Mutex::new(Tasks::default()),
                invalidator,
            }),
            target: Mutex::new(target),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<SyncState> {
        self.shared.state_tx.subscribe()
    }

    pub fn state(&self) -> SyncState {
        self.shared.state_tx.borrow().clone()
    }

    pub fn target(&self) -> SyncTarget {
        self.target.lock().expect("sync target lock poisoned").clone()
    }

    /// Takes effect on the next `start`.
    pub fn set_target(&self, target: SyncTarget) {
        *self.target.lock().expect("sync target lock poisoned") = target;
    }

    /// Starts an upload job. Ignored while one is already starting or
    /// running; allowed from `Idle`, `Completed` and `Failed`.
    pub async fn start(&self) -> Result<(), SyncError> {
        let target = self.target();
        let (folder, bucket) = target.require()?;

        let run = {
            let mut tasks = self.shared.lock();
            if self.shared.is_active() {
                tracing::debug!("sync already in flight; start ignored");
                return Ok(());
            }
            let run = tasks.supersede();
            self.shared.publish(SyncState::Starting {
                message: STARTING_MESSAGE.to_string(),
            });
            run
        };

        tracing::info!(run, folder, bucket, "starting sync");
        let result = self.shared.client.start_sync(folder, bucket).await;

        let mut tasks = self.shared.lock();
        if tasks.run != run {
            tracing::debug!(run, "start superseded before backend answered");
            return Ok(());
        }
        match result {
            Ok(ack) => {
                self.shared.publish(SyncState::Running {
                    message: non_empty(ack.message.text())
                        .unwrap_or_else(|| "Sync started".to_string()),
                    progress: 0,
                    detail: progress_detail(&ack.message, None),
                });
                tasks.poll = Some(tokio::spawn(poll_loop(Arc::clone(&self.shared), run)));
                Ok(())
            }
            Err(err) => {
                let err = SyncError::from(err);
                tracing::warn!(run, error = %err, "sync failed to start");
                self.shared.publish(SyncState::Failed {
                    message: err.to_string(),
                });
                Err(err)
            }
        }
    }

    /// Stops the job in flight. Polling ends at once and the state returns
    /// to `Idle` even when the backend rejects the stop request; that
    /// rejection is still returned.
    pub async fn stop(&self) -> Result<(), SyncError> {
        let run = {
            let mut tasks = self.shared.lock();
            if !self.shared.is_active() {
                return Ok(());
            }
            tasks.supersede()
        };

        tracing::info!(run, "stopping sync");
        let result = self.shared.client.stop_sync().await;

        {
            let tasks = self.shared.lock();
            if tasks.run == run {
                self.shared.publish(SyncState::Idle {
                    message: STOPPED_MESSAGE.to_string(),
                });
            }
        }

        result.map(|_| ()).map_err(|err| {
            let err = SyncError::from(err);
            tracing::warn!(error = %err, "backend did not confirm stop");
            err
        })
    }

    /// Leaves `Completed` or `Failed` for `Idle`.
    pub fn dismiss(&self) {
        let mut tasks = self.shared.lock();
        if !self.shared.state_tx.borrow().is_terminal() {
            return;
        }
        tasks.supersede();
        self.shared.publish(SyncState::default());
    }

    /// Cancels every timer the machine owns. The state is left as it is.
    pub fn shutdown(&self) {
        self.shared.lock().supersede();
    }
}

impl Drop for SyncMachine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
#[path = "machine_tests.rs"]
mod tests;
