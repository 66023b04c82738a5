//! Unit executor.

use std::marker::PhantomData;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, mpsc};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use batchline_core::{BatchJob, NextAction, ScheduleError, UnitFault, UnitReport};

use super::queue::UnitQueue;
use super::types::{QueuedUnit, UnitId};

/// Executor configuration.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// How often to poll when nothing is ready
    pub poll_interval: Duration,
    /// Name for logging and the worker thread
    pub name: String,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            name: "batch-executor".to_string(),
        }
    }
}

impl ExecutorConfig {
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }
}

/// Executor runtime statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct ExecutorStats {
    pub units_executed: u64,
    pub units_succeeded: u64,
    pub units_faulted: u64,
    pub units_panicked: u64,
    pub records_processed: u64,
    pub continuations: u64,
    pub retries_scheduled: u64,
    pub lineages_completed: u64,
    pub lineages_dead_lettered: u64,
    pub uptime_secs: u64,
}

impl ExecutorStats {
    fn observe(&mut self, outcome: &UnitOutcome) {
        self.units_executed += 1;
        match outcome {
            UnitOutcome::Succeeded { report, .. } => {
                self.units_succeeded += 1;
                self.records_processed += report.processed as u64;
                match report.next {
                    NextAction::Continued { .. } => self.continuations += 1,
                    NextAction::RetryScheduled { .. } => self.retries_scheduled += 1,
                    NextAction::DeadLettered { .. } => self.lineages_dead_lettered += 1,
                    NextAction::Completed => self.lineages_completed += 1,
                    NextAction::Halted => {}
                }
            }
            UnitOutcome::Faulted { .. } => self.units_faulted += 1,
            UnitOutcome::Panicked { .. } => self.units_panicked += 1,
        }
    }
}

/// How one unit execution ended.
#[derive(Debug)]
pub enum UnitOutcome {
    Succeeded { id: UnitId, report: UnitReport },
    /// The unit returned a fault; its recovery guard already ran.
    Faulted { id: UnitId, fault: UnitFault },
    /// The unit panicked; its recovery guard ran during unwinding.
    Panicked { id: UnitId, message: String },
}

impl UnitOutcome {
    pub fn id(&self) -> UnitId {
        match self {
            UnitOutcome::Succeeded { id, .. }
            | UnitOutcome::Faulted { id, .. }
            | UnitOutcome::Panicked { id, .. } => *id,
        }
    }

    pub fn report(&self) -> Option<&UnitReport> {
        match self {
            UnitOutcome::Succeeded { report, .. } => Some(report),
            _ => None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, UnitOutcome::Succeeded { .. })
    }
}

/// Handle to control a running executor.
#[derive(Debug)]
pub struct ExecutorHandle {
    shutdown: mpsc::Sender<()>,
    join: Option<thread::JoinHandle<()>>,
    stats: Arc<Mutex<ExecutorStats>>,
}

impl ExecutorHandle {
    /// Request graceful shutdown. The unit in flight finishes first.
    pub fn shutdown(mut self) {
        let _ = self.shutdown.send(());
        if let Some(j) = self.join.take() {
            let _ = j.join();
        }
    }

    /// Get current executor statistics.
    pub fn stats(&self) -> ExecutorStats {
        lock_stats(&self.stats).clone()
    }
}

/// Runs queued units one at a time.
///
/// Units submit their descendants back into the same queue, so draining the
/// queue runs whole lineages.
pub struct BatchExecutor<J: BatchJob, Q: UnitQueue<J>> {
    queue: Q,
    stats: Arc<Mutex<ExecutorStats>>,
    _job: PhantomData<fn() -> J>,
}

impl<J: BatchJob, Q: UnitQueue<J>> BatchExecutor<J, Q> {
    pub fn new(queue: Q) -> Self {
        Self {
            queue,
            stats: Arc::new(Mutex::new(ExecutorStats::default())),
            _job: PhantomData,
        }
    }

    pub fn queue(&self) -> &Q {
        &self.queue
    }

    pub fn stats(&self) -> ExecutorStats {
        lock_stats(&self.stats).clone()
    }

    /// Execute a single claimed unit (for testing or synchronous use).
    pub fn execute_one(&self, queued: QueuedUnit<J>) -> UnitOutcome {
        let QueuedUnit { id, unit, .. } = queued;
        let lineage = unit.lineage();
        let attempt = unit.attempt();
        debug!(unit_id = %id, lineage = %lineage, attempt, "executing unit");

        let outcome = match catch_unwind(AssertUnwindSafe(|| unit.execute(&self.queue))) {
            Ok(Ok(report)) => UnitOutcome::Succeeded { id, report },
            Ok(Err(fault)) => {
                warn!(unit_id = %id, lineage = %lineage, attempt, fault = %fault, "unit faulted");
                UnitOutcome::Faulted { id, fault }
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!(unit_id = %id, lineage = %lineage, attempt, panic = %message, "unit panicked");
                UnitOutcome::Panicked { id, message }
            }
        };

        lock_stats(&self.stats).observe(&outcome);
        outcome
    }

    /// Run ready units until none is left. Delayed units stay queued.
    pub fn run_until_idle(&self) -> Result<Vec<UnitOutcome>, ScheduleError> {
        let mut outcomes = Vec::new();
        while let Some(queued) = self.queue.claim_next()? {
            outcomes.push(self.execute_one(queued));
        }
        Ok(outcomes)
    }

    /// Spawn the executor on a background thread.
    pub fn spawn(self, config: ExecutorConfig) -> std::io::Result<ExecutorHandle>
    where
        Q: 'static,
    {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
        let stats = self.stats.clone();

        let join = thread::Builder::new()
            .name(config.name.clone())
            .spawn(move || executor_loop(self, config, shutdown_rx))?;

        Ok(ExecutorHandle {
            shutdown: shutdown_tx,
            join: Some(join),
            stats,
        })
    }
}

fn executor_loop<J: BatchJob, Q: UnitQueue<J>>(
    executor: BatchExecutor<J, Q>,
    config: ExecutorConfig,
    shutdown_rx: mpsc::Receiver<()>,
) {
    info!(executor = %config.name, "batch executor started");
    let start_time = Instant::now();

    loop {
        if shutdown_rx.try_recv().is_ok() {
            break;
        }

        lock_stats(&executor.stats).uptime_secs = start_time.elapsed().as_secs();

        match executor.queue.claim_next() {
            Ok(Some(queued)) => {
                let outcome = executor.execute_one(queued);
                debug!(
                    executor = %config.name,
                    unit_id = %outcome.id(),
                    success = outcome.is_success(),
                    "unit finished"
                );
            }
            Ok(None) => thread::sleep(config.poll_interval),
            Err(e) => {
                error!(executor = %config.name, error = %e, "failed to claim unit");
                thread::sleep(config.poll_interval);
            }
        }
    }

    info!(executor = %config.name, "batch executor stopped");
}

fn lock_stats(stats: &Mutex<ExecutorStats>) -> MutexGuard<'_, ExecutorStats> {
    stats.lock().unwrap_or_else(PoisonError::into_inner)
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
