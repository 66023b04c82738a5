//! The job unit: one scheduled execution over one chunk.

use std::fmt;

use serde::Serialize;
use tracing::{debug, info_span, warn};

use crate::chunker::split_chunk;
use crate::config::BatchConfig;
use crate::continuation::{ContinuationScheduler, NextAction, NextStep};
use crate::error::UnitFault;
use crate::id::LineageId;
use crate::job::BatchJob;
use crate::ledger::{ExecutionResult, RetryLedger};
use crate::recovery::{RecoveryGuard, UnitState};
use crate::scheduler::UnitScheduler;

/// A single execution unit of a lineage.
///
/// Holds everything it needs explicitly: the records it owns (or none, for a
/// root unit that still has to fetch its batch), the failures carried in from
/// earlier chunks of the same attempt, the attempt number and the lineage
/// configuration. Executing consumes the unit.
pub struct JobUnit<J: BatchJob> {
    job: J,
    records: Option<Vec<J::Record>>,
    carried_failures: Vec<J::Record>,
    attempt: u32,
    config: BatchConfig,
    lineage: LineageId,
}

impl<J: BatchJob> JobUnit<J> {
    /// First unit of a fresh lineage. Its batch comes from
    /// [`BatchJob::fetch_batch`] when it runs.
    pub fn root(job: J, config: BatchConfig) -> Self {
        Self {
            job,
            records: None,
            carried_failures: Vec::new(),
            attempt: 1,
            config,
            lineage: LineageId::new(),
        }
    }

    /// A unit over an explicit record set, as built by
    /// [`BatchJob::create_new`]. Attempts below 1 are raised to 1.
    pub fn with_records(job: J, records: Vec<J::Record>, attempt: u32, config: BatchConfig) -> Self {
        Self {
            job,
            records: Some(records),
            carried_failures: Vec::new(),
            attempt: attempt.max(1),
            config,
            lineage: LineageId::new(),
        }
    }

    pub(crate) fn in_lineage(mut self, lineage: LineageId) -> Self {
        self.lineage = lineage;
        self
    }

    pub(crate) fn carrying(mut self, failures: Vec<J::Record>) -> Self {
        self.carried_failures = failures;
        self
    }

    pub fn job(&self) -> &J {
        &self.job
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    pub fn lineage(&self) -> LineageId {
        self.lineage
    }

    /// `None` for a root unit that has not fetched its batch.
    pub fn records(&self) -> Option<&[J::Record]> {
        self.records.as_deref()
    }

    pub fn carried_failures(&self) -> &[J::Record] {
        &self.carried_failures
    }

    pub fn is_root(&self) -> bool {
        self.records.is_none()
    }

    /// Run this unit's chunk and hand off to the next unit.
    ///
    /// The recovery guard is armed before any hook runs. Whatever way the
    /// body exits (success, fault, or panic) the guard makes sure the lineage
    /// is continued exactly once. A returned fault has already been through
    /// recovery.
    pub fn execute<S>(self, scheduler: &S) -> Result<UnitReport, UnitFault>
    where
        S: UnitScheduler<J> + ?Sized,
    {
        let JobUnit {
            job,
            records,
            carried_failures,
            attempt,
            config,
            lineage,
        } = self;

        let span = info_span!("job_unit", lineage = %lineage, attempt);
        let _enter = span.enter();

        let continuation = ContinuationScheduler::new(&job, scheduler, lineage, config);
        let mut guard = RecoveryGuard::arm(continuation, RetryLedger::new(attempt, carried_failures));

        let result = run_chunk(&job, records, &guard.continuation, &mut guard.state);
        guard.finish(result)
    }
}

impl<J: BatchJob> fmt::Debug for JobUnit<J> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobUnit")
            .field("lineage", &self.lineage)
            .field("attempt", &self.attempt)
            .field("records", &self.records.as_ref().map(Vec::len))
            .field("carried_failures", &self.carried_failures.len())
            .field("config", &self.config)
            .finish()
    }
}

/// Summary of one unit execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnitReport {
    pub lineage: LineageId,
    pub attempt: u32,
    pub chunk_len: usize,
    pub processed: usize,
    pub validation_failed: usize,
    pub processing_failed: usize,
    /// Faults that did not block scheduling (post-processing errors outside
    /// fail-fast mode).
    pub deferred_faults: Vec<String>,
    pub next: NextAction,
}

fn run_chunk<J, S>(
    job: &J,
    records: Option<Vec<J::Record>>,
    continuation: &ContinuationScheduler<'_, J, S>,
    state: &mut UnitState<J::Record>,
) -> Result<(), UnitFault>
where
    J: BatchJob,
    S: UnitScheduler<J> + ?Sized,
{
    let config = *continuation.config();
    let attempt = state.ledger.attempt();

    let batch = match records {
        Some(records) => records,
        None => {
            let batch = job
                .fetch_batch()
                .map_err(|error| UnitFault::RecordSource { error })?;
            debug!(records = batch.len(), "batch fetched from record source");
            batch
        }
    };

    let (chunk, remaining) = split_chunk(batch, config.chunk_size());
    debug!(chunk_len = chunk.len(), remaining = remaining.len(), "chunk selected");
    state.remaining = remaining;
    let chunk: &Vec<J::Record> = state.chunk.insert(chunk);

    for (index, record) in chunk.iter().enumerate() {
        state.cursor = index;

        let result = classify(job, record, index, config.fail_fast())?;
        state.ledger.record(record.clone(), result.clone());
        state.cursor = index + 1;

        match result {
            ExecutionResult::Processed => {}
            ExecutionResult::ValidationFailed(reason) => {
                warn!(index, record = ?record, reason = %reason, "record failed validation");
                job.on_validation_failed(record, &reason);
            }
            ExecutionResult::ProcessingFailed => {
                debug!(index, record = ?record, "record failed processing");
                state.processing_failed += 1;
            }
        }
    }

    if let Err(error) = job.post_processing(state.ledger.processed()) {
        let fault = UnitFault::PostProcessing { error };
        if config.fail_fast() {
            return Err(fault);
        }
        warn!(fault = %fault, "post-processing failed; continuing lineage");
        state.deferred.push(fault);
    }

    // The forwarded records stay in `state` until the step is taken, so a
    // panic inside dispatch can still be recovered from.
    let step = NextStep::plan(
        state.remaining.clone(),
        state.ledger.retry_set().to_vec(),
        attempt,
        &config,
    );
    let action = continuation.dispatch(step, &mut state.scheduled)?;
    state.remaining.clear();
    state.ledger.take_retry_set();
    state.next = Some(action);
    Ok(())
}

fn classify<J: BatchJob>(
    job: &J,
    record: &J::Record,
    index: usize,
    fail_fast: bool,
) -> Result<ExecutionResult, UnitFault> {
    let reason = job
        .validate(record)
        .map_err(|error| UnitFault::hook("validate", index, error))?;
    if let Some(reason) = reason.filter(|reason| !reason.is_empty()) {
        return Ok(ExecutionResult::ValidationFailed(reason));
    }

    let ok = job
        .process(record)
        .map_err(|error| UnitFault::hook("process", index, error))?;

    match (ok, fail_fast) {
        (true, _) => Ok(ExecutionResult::Processed),
        (false, true) => Err(UnitFault::FailFast { index }),
        (false, false) => Ok(ExecutionResult::ProcessingFailed),
    }
}
