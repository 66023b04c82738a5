//! The recovery guard: the unit's "run no matter what" finalizer.
//!
//! Armed before the unit body runs. Finishing it normally reports the
//! outcome; dropping it unfinished (the body panicked) runs recovery from the
//! destructor. Recovery is a no-op once the unit has taken its lineage's next
//! step inline, otherwise it schedules the safest resumable unit:
//!
//! - a tail remains: continuation of the tail, carrying the retry set plus
//!   the current chunk's unreached records
//! - no tail: the unreached records count as failed this round and the
//!   retry decision is applied

use std::panic::{AssertUnwindSafe, catch_unwind};

use tracing::{debug, error, info, warn};

use crate::continuation::{ContinuationScheduler, NextAction, NextStep};
use crate::error::UnitFault;
use crate::job::BatchJob;
use crate::ledger::RetryLedger;
use crate::scheduler::UnitScheduler;
use crate::unit::UnitReport;

/// Mutable state of one unit execution.
#[derive(Debug)]
pub(crate) struct UnitState<R> {
    pub ledger: RetryLedger<R>,
    /// `None` until the batch is available.
    pub chunk: Option<Vec<R>>,
    /// Index of the first record whose outcome is not in the ledger yet.
    pub cursor: usize,
    pub remaining: Vec<R>,
    pub processing_failed: usize,
    /// Set once the lineage's next step was taken.
    pub scheduled: bool,
    pub next: Option<NextAction>,
    pub deferred: Vec<UnitFault>,
}

impl<R> UnitState<R> {
    fn new(ledger: RetryLedger<R>) -> Self {
        Self {
            ledger,
            chunk: None,
            cursor: 0,
            remaining: Vec::new(),
            processing_failed: 0,
            scheduled: false,
            next: None,
            deferred: Vec::new(),
        }
    }

    fn recovery_step(&mut self, config: &crate::config::BatchConfig) -> NextStep<R> {
        let Some(chunk) = self.chunk.as_mut() else {
            return NextStep::Halt;
        };

        let unreached = chunk.split_off(self.cursor.min(chunk.len()));
        self.ledger.fail_unprocessed(unreached);

        NextStep::plan(
            std::mem::take(&mut self.remaining),
            self.ledger.take_retry_set(),
            self.ledger.attempt(),
            config,
        )
    }
}

pub(crate) struct RecoveryGuard<'a, J, S>
where
    J: BatchJob,
    S: UnitScheduler<J> + ?Sized,
{
    pub continuation: ContinuationScheduler<'a, J, S>,
    pub state: UnitState<J::Record>,
    finished: bool,
}

impl<'a, J, S> RecoveryGuard<'a, J, S>
where
    J: BatchJob,
    S: UnitScheduler<J> + ?Sized,
{
    pub fn arm(continuation: ContinuationScheduler<'a, J, S>, ledger: RetryLedger<J::Record>) -> Self {
        Self {
            continuation,
            state: UnitState::new(ledger),
            finished: false,
        }
    }

    /// Disarm with the body's result.
    pub fn finish(mut self, result: Result<(), UnitFault>) -> Result<UnitReport, UnitFault> {
        self.finished = true;

        match result {
            Ok(()) => {
                let job = self.continuation.job();
                let attempt = self.state.ledger.attempt();
                for fault in &self.state.deferred {
                    job.on_unhandled_fault(fault, attempt);
                }
                Ok(self.report())
            }
            Err(fault) => {
                self.recover(&fault);
                Err(fault)
            }
        }
    }

    fn report(&self) -> UnitReport {
        UnitReport {
            lineage: self.continuation.lineage(),
            attempt: self.state.ledger.attempt(),
            chunk_len: self.state.chunk.as_ref().map_or(0, Vec::len),
            processed: self.state.ledger.processed().len(),
            validation_failed: self.state.ledger.validation_failures().len(),
            processing_failed: self.state.processing_failed,
            deferred_faults: self.state.deferred.iter().map(ToString::to_string).collect(),
            next: self.state.next.clone().unwrap_or(NextAction::Halted),
        }
    }

    fn recover(&mut self, fault: &UnitFault) {
        let job = self.continuation.job();
        let attempt = self.state.ledger.attempt();
        error!(
            lineage = %self.continuation.lineage(),
            attempt,
            fault = %fault,
            aborted_chunk = fault.aborted_chunk(),
            "unit faulted; running recovery"
        );

        // Hooks may run while unwinding; a second panic would abort.
        if catch_unwind(AssertUnwindSafe(|| job.on_unhandled_fault(fault, attempt))).is_err() {
            warn!("fault hook panicked");
        }

        if self.state.scheduled {
            debug!(next = ?self.state.next, "next step already taken inline; nothing to recover");
            return;
        }

        if let UnitFault::Schedule(err) = fault {
            error!(error = %err, "scheduler refused the next unit; lineage halted");
            self.state.next = Some(NextAction::Halted);
            return;
        }

        let config = *self.continuation.config();
        let step = self.state.recovery_step(&config);
        let continuation = &self.continuation;
        let scheduled = &mut self.state.scheduled;

        match catch_unwind(AssertUnwindSafe(|| continuation.dispatch(step, scheduled))) {
            Ok(Ok(action)) => {
                info!(action = ?action, "recovery continued the lineage");
                self.state.next = Some(action);
            }
            Ok(Err(err)) => error!(error = %err, "recovery could not continue the lineage"),
            Err(_) => error!("recovery panicked while continuing the lineage"),
        }
    }
}

impl<J, S> Drop for RecoveryGuard<'_, J, S>
where
    J: BatchJob,
    S: UnitScheduler<J> + ?Sized,
{
    fn drop(&mut self) {
        if !self.finished {
            self.finished = true;
            self.recover(&UnitFault::Panicked);
        }
    }
}
