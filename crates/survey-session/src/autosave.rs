use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use survey_spec::AnswerSet;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, warn};

use crate::handler::PartialSaveHandler;

/// Default period between autosave attempts.
pub const DEFAULT_AUTOSAVE_INTERVAL: Duration = Duration::from_secs(30);

/// Running autosave ticker; the ticker stops when the handle is dropped.
///
/// Each tick reads the latest answer snapshot and hands it to the partial-save
/// collaborator on a separate task, so a slow save never delays the ticker. A tick
/// that finds a save still in flight, or no answers at all, does nothing.
pub struct AutosaveHandle {
    task: JoinHandle<()>,
    in_flight: Arc<AtomicBool>,
}

impl AutosaveHandle {
    pub(crate) fn spawn(
        runtime: &Handle,
        saver: Arc<dyn PartialSaveHandler>,
        mut snapshots: watch::Receiver<AnswerSet>,
        period: Duration,
    ) -> Self {
        let in_flight = Arc::new(AtomicBool::new(false));
        let guard = Arc::clone(&in_flight);
        let task = runtime.spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let snapshot = snapshots.borrow_and_update().clone();
                if snapshot.is_empty() {
                    continue;
                }
                if guard.swap(true, Ordering::AcqRel) {
                    debug!(survey_id = %snapshot.survey_id, "autosave skipped, previous save in flight");
                    continue;
                }
                let saver = Arc::clone(&saver);
                let guard = Arc::clone(&guard);
                tokio::spawn(async move {
                    let survey_id = snapshot.survey_id.clone();
                    let count = snapshot.len();
                    match saver.save_partial(snapshot).await {
                        Ok(()) => debug!(%survey_id, answers = count, "autosave stored answers"),
                        Err(err) => warn!(%survey_id, error = %err, "autosave failed, retrying next tick"),
                    }
                    guard.store(false, Ordering::Release);
                });
            }
        });
        Self { task, in_flight }
    }

    /// Whether a partial save is currently running.
    pub fn is_saving(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    pub fn stop(self) {
        drop(self);
    }
}

impl Drop for AutosaveHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
