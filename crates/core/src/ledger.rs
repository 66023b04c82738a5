//! Per-unit bookkeeping of record outcomes.

use serde::{Deserialize, Serialize};

use crate::config::BatchConfig;

/// Outcome of a single record within one chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionResult {
    Processed,
    /// Permanent; never retried.
    ValidationFailed(String),
    /// Transient; carried into the retry set.
    ProcessingFailed,
}

/// What to do once the last chunk of an attempt is done.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Nothing failed processing; the lineage is finished.
    Complete,
    /// Start another round with the retry set as its batch.
    Retry { next_attempt: u32 },
    /// Rounds exhausted; hand the retry set to the dead-letter hook.
    Exhausted,
}

impl RetryDecision {
    pub fn evaluate(retry_set_len: usize, attempt: u32, config: &BatchConfig) -> Self {
        if retry_set_len == 0 {
            RetryDecision::Complete
        } else if config.should_retry(attempt) {
            RetryDecision::Retry {
                next_attempt: attempt + 1,
            }
        } else {
            RetryDecision::Exhausted
        }
    }
}

/// Ledger for one unit execution.
///
/// The retry set starts with the failures carried in from earlier chunks of
/// the same attempt, so at the end of the attempt it holds every record that
/// failed processing in that attempt, in the order they failed.
#[derive(Debug, Clone)]
pub struct RetryLedger<R> {
    attempt: u32,
    processed: Vec<R>,
    validation_failures: Vec<(R, String)>,
    retry_set: Vec<R>,
    carried: usize,
}

impl<R> RetryLedger<R> {
    pub fn new(attempt: u32, carried_failures: Vec<R>) -> Self {
        Self {
            attempt,
            processed: Vec::new(),
            validation_failures: Vec::new(),
            carried: carried_failures.len(),
            retry_set: carried_failures,
        }
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Record the outcome of one record.
    pub fn record(&mut self, record: R, result: ExecutionResult) {
        match result {
            ExecutionResult::Processed => self.processed.push(record),
            ExecutionResult::ValidationFailed(reason) => {
                self.validation_failures.push((record, reason))
            }
            ExecutionResult::ProcessingFailed => self.retry_set.push(record),
        }
    }

    /// Records processed in this unit's chunk.
    pub fn processed(&self) -> &[R] {
        &self.processed
    }

    pub fn validation_failures(&self) -> &[(R, String)] {
        &self.validation_failures
    }

    /// The attempt's retry set so far (carried failures included).
    pub fn retry_set(&self) -> &[R] {
        &self.retry_set
    }

    /// Processing failures that happened in this unit's chunk.
    pub fn new_failures(&self) -> &[R] {
        &self.retry_set[self.carried..]
    }

    /// Append records that were never reached because the chunk aborted.
    pub fn fail_unprocessed(&mut self, records: impl IntoIterator<Item = R>) {
        self.retry_set.extend(records);
    }

    pub fn take_retry_set(&mut self) -> Vec<R> {
        self.carried = 0;
        std::mem::take(&mut self.retry_set)
    }

    pub fn decide(&self, config: &BatchConfig) -> RetryDecision {
        RetryDecision::evaluate(self.retry_set.len(), self.attempt, config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_outcomes() {
        let mut ledger = RetryLedger::new(1, vec![10]);
        ledger.record(1, ExecutionResult::Processed);
        ledger.record(2, ExecutionResult::ValidationFailed("bad".into()));
        ledger.record(3, ExecutionResult::ProcessingFailed);
        ledger.record(4, ExecutionResult::Processed);

        assert_eq!(ledger.processed(), &[1, 4]);
        assert_eq!(ledger.validation_failures(), &[(2, "bad".to_string())]);
        assert_eq!(ledger.retry_set(), &[10, 3]);
        assert_eq!(ledger.new_failures(), &[3]);
    }

    #[test]
    fn unprocessed_records_join_the_retry_set() {
        let mut ledger = RetryLedger::new(2, Vec::new());
        ledger.record(1, ExecutionResult::ProcessingFailed);
        ledger.fail_unprocessed([2, 3]);
        assert_eq!(ledger.take_retry_set(), vec![1, 2, 3]);
        assert!(ledger.retry_set().is_empty());
    }

    #[test]
    fn decision_rules() {
        let config = BatchConfig::default().with_max_retries(1);

        assert_eq!(RetryDecision::evaluate(0, 1, &config), RetryDecision::Complete);
        assert_eq!(
            RetryDecision::evaluate(4, 1, &config),
            RetryDecision::Retry { next_attempt: 2 }
        );
        assert_eq!(RetryDecision::evaluate(4, 2, &config), RetryDecision::Exhausted);
    }

    #[test]
    fn zero_retries_exhausts_immediately() {
        let config = BatchConfig::default().with_max_retries(0);
        let mut ledger = RetryLedger::new(1, Vec::new());
        ledger.record("a", ExecutionResult::ProcessingFailed);
        assert_eq!(ledger.decide(&config), RetryDecision::Exhausted);
    }

    #[test]
    fn validation_failures_never_count_toward_retries() {
        let config = BatchConfig::default().with_max_retries(0);
        let mut ledger = RetryLedger::new(1, Vec::new());
        ledger.record("a", ExecutionResult::ValidationFailed("missing".into()));
        assert_eq!(ledger.decide(&config), RetryDecision::Complete);
    }
}
