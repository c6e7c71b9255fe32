use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, error, info, warn};

use super::executor::{ExecuteError, MonitoringExecutor};
use crate::store::Collection;

pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Sweeping,
}

/// What one sweep did. Pipelines may still be running when this is returned.
#[derive(Debug, Default)]
pub struct Sweep {
    pub listed: usize,
    pub skipped_in_flight: usize,
    pub handles: Vec<JoinHandle<()>>,
}

impl Sweep {
    pub fn dispatched(&self) -> usize {
        self.handles.len()
    }

    /// Wait for every pipeline dispatched by this sweep.
    pub async fn join(self) {
        for handle in self.handles {
            if let Err(e) = handle.await {
                error!("Check pipeline task failed: {}", e);
            }
        }
    }
}

/// Check ids whose pipeline has not finished yet.
#[derive(Default)]
struct InFlight(Mutex<HashSet<String>>);

impl InFlight {
    fn claim(self: &Arc<Self>, check_id: &str) -> Option<InFlightGuard> {
        let mut ids = self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        ids.insert(check_id.to_string())
            .then(|| InFlightGuard { set: Arc::clone(self), check_id: check_id.to_string() })
    }
}

/// Releases the claim when the pipeline ends, panics included.
struct InFlightGuard {
    set: Arc<InFlight>,
    check_id: String,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let mut ids = self.set.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        ids.remove(&self.check_id);
    }
}

/// Monitoring scheduler - sweeps every stored check on a fixed interval.
///
/// Each check runs in its own task so a hanging target never delays the
/// others. With `dedupe_in_flight` a check whose previous pipeline is still
/// running is skipped for that sweep; without it, it is dispatched again.
pub struct MonitoringScheduler {
    executor: Arc<MonitoringExecutor>,
    sweep_interval: Duration,
    dedupe_in_flight: bool,
    in_flight: Arc<InFlight>,
    sweeping: AtomicBool,
}

impl MonitoringScheduler {
    pub fn new(executor: Arc<MonitoringExecutor>, sweep_interval: Duration, dedupe_in_flight: bool) -> Self {
        Self {
            executor,
            sweep_interval,
            dedupe_in_flight,
            in_flight: Arc::new(InFlight::default()),
            sweeping: AtomicBool::new(false),
        }
    }

    pub fn state(&self) -> SchedulerState {
        if self.sweeping.load(Ordering::Acquire) { SchedulerState::Sweeping } else { SchedulerState::Idle }
    }

    /// List every check and dispatch one pipeline per id.
    pub async fn sweep(&self) -> Sweep {
        self.sweeping.store(true, Ordering::Release);
        let sweep = self.dispatch_all().await;
        self.sweeping.store(false, Ordering::Release);

        info!(
            listed = sweep.listed,
            dispatched = sweep.dispatched(),
            skipped = sweep.skipped_in_flight,
            "Sweep dispatched"
        );
        sweep
    }

    async fn dispatch_all(&self) -> Sweep {
        let mut sweep = Sweep::default();

        let ids = match self.executor.store().list(Collection::Checks).await {
            Ok(ids) => ids,
            Err(e) => {
                error!("Failed to list checks, skipping sweep: {}", e);
                return sweep;
            }
        };
        sweep.listed = ids.len();
        if ids.is_empty() {
            debug!("No checks to execute");
        }

        for check_id in ids {
            let guard = if self.dedupe_in_flight {
                match self.in_flight.claim(&check_id) {
                    Some(guard) => Some(guard),
                    None => {
                        debug!(check_id, "Previous probe still running, skipping");
                        sweep.skipped_in_flight += 1;
                        continue;
                    }
                }
            } else {
                None
            };

            let executor = Arc::clone(&self.executor);
            sweep.handles.push(tokio::spawn(async move {
                let _guard = guard;
                run_pipeline(&executor, &check_id).await;
            }));
        }

        sweep
    }

    /// Sweep immediately, then every interval until `shutdown` flips to true.
    /// In-flight probes are left to finish on their own timeouts.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!("Scheduler started, sweeping every {}s", self.sweep_interval.as_secs());

        let mut timer = interval(self.sweep_interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = timer.tick() => {
                    drop(self.sweep().await);
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Scheduler stopped");
    }
}

async fn run_pipeline(executor: &MonitoringExecutor, check_id: &str) {
    match executor.execute_check(check_id).await {
        Ok(run) => debug!(
            check_id,
            state = %run.report.new_state,
            alerted = run.report.alerted,
            "Check processed: {}",
            run.outcome
        ),
        Err(ExecuteError::Rejected(rejection)) => warn!(check_id, "{}", rejection),
        Err(e @ ExecuteError::Misfiled { .. }) => warn!(check_id, "Skipping check: {}", e),
        Err(e) => error!(check_id, "{}", e),
    }
}
