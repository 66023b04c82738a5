//! Deciding and scheduling the unit that follows a finished one.
//!
//! | finished chunk   | next step                                  |
//! |------------------|--------------------------------------------|
//! | tail remains     | continuation, same attempt, carries failures |
//! | last, no failures| complete                                   |
//! | last, failures   | retry round, or dead-letter when exhausted |

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::BatchConfig;
use crate::error::UnitFault;
use crate::id::LineageId;
use crate::job::BatchJob;
use crate::ledger::RetryDecision;
use crate::scheduler::UnitScheduler;

/// The planned follow-up of a unit, still holding the records it forwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextStep<R> {
    Continue {
        remaining: Vec<R>,
        retry_set: Vec<R>,
        attempt: u32,
    },
    Retry {
        records: Vec<R>,
        next_attempt: u32,
        delay: Duration,
    },
    DeadLetter {
        records: Vec<R>,
    },
    Complete,
    /// Nothing can be resumed (the batch never became available).
    Halt,
}

impl<R> NextStep<R> {
    /// Plan the next step for a unit whose chunk is done.
    ///
    /// `retry_set` is the attempt's accumulated retry set including this
    /// unit's failures.
    pub fn plan(remaining: Vec<R>, retry_set: Vec<R>, attempt: u32, config: &BatchConfig) -> Self {
        if !remaining.is_empty() {
            return NextStep::Continue {
                remaining,
                retry_set,
                attempt,
            };
        }

        match RetryDecision::evaluate(retry_set.len(), attempt, config) {
            RetryDecision::Complete => NextStep::Complete,
            RetryDecision::Retry { next_attempt } => NextStep::Retry {
                records: retry_set,
                next_attempt,
                delay: config.delay_for_attempt(next_attempt),
            },
            RetryDecision::Exhausted => NextStep::DeadLetter { records: retry_set },
        }
    }
}

/// What a unit ended up doing about its lineage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "action")]
pub enum NextAction {
    Continued {
        remaining: usize,
        carried_failures: usize,
    },
    RetryScheduled {
        next_attempt: u32,
        records: usize,
        delay: Duration,
    },
    DeadLettered {
        records: usize,
    },
    Completed,
    Halted,
}

/// Turns a [`NextStep`] into a submitted unit or a terminal hook call.
pub struct ContinuationScheduler<'a, J, S: ?Sized> {
    job: &'a J,
    scheduler: &'a S,
    lineage: LineageId,
    config: BatchConfig,
}

impl<'a, J, S> ContinuationScheduler<'a, J, S>
where
    J: BatchJob,
    S: UnitScheduler<J> + ?Sized,
{
    pub fn new(job: &'a J, scheduler: &'a S, lineage: LineageId, config: BatchConfig) -> Self {
        Self {
            job,
            scheduler,
            lineage,
            config,
        }
    }

    pub fn job(&self) -> &'a J {
        self.job
    }

    pub fn lineage(&self) -> LineageId {
        self.lineage
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Carry out `step`.
    ///
    /// `scheduled` is set as soon as the lineage's next step has been taken,
    /// before any hook that could fault runs, so recovery never repeats it.
    pub fn dispatch(
        &self,
        step: NextStep<J::Record>,
        scheduled: &mut bool,
    ) -> Result<NextAction, UnitFault> {
        match step {
            NextStep::Continue {
                remaining,
                retry_set,
                attempt,
            } => {
                let action = NextAction::Continued {
                    remaining: remaining.len(),
                    carried_failures: retry_set.len(),
                };
                let unit = self.descendant(remaining, attempt).carrying(retry_set);
                self.scheduler.submit(unit, Duration::ZERO)?;
                *scheduled = true;
                debug!(lineage = %self.lineage, attempt, ?action, "continuation scheduled");
                Ok(action)
            }
            NextStep::Retry {
                records,
                next_attempt,
                delay,
            } => {
                let action = NextAction::RetryScheduled {
                    next_attempt,
                    records: records.len(),
                    delay,
                };
                let unit = self.descendant(records, next_attempt);
                self.scheduler.submit(unit, delay)?;
                *scheduled = true;
                info!(
                    lineage = %self.lineage,
                    next_attempt,
                    delay_secs = delay.as_secs(),
                    "retry round scheduled"
                );
                Ok(action)
            }
            NextStep::DeadLetter { records } => {
                *scheduled = true;
                warn!(
                    lineage = %self.lineage,
                    records = records.len(),
                    max_retries = self.config.max_retries(),
                    "retries exhausted; dead-lettering"
                );
                self.job
                    .on_max_retries_reached(&records)
                    .map_err(|error| UnitFault::DeadLetter { error })?;
                Ok(NextAction::DeadLettered {
                    records: records.len(),
                })
            }
            NextStep::Complete => {
                *scheduled = true;
                info!(lineage = %self.lineage, "lineage complete");
                Ok(NextAction::Completed)
            }
            NextStep::Halt => {
                *scheduled = true;
                warn!(lineage = %self.lineage, "nothing to resume; lineage halted");
                Ok(NextAction::Halted)
            }
        }
    }

    fn descendant(&self, records: Vec<J::Record>, attempt: u32) -> crate::unit::JobUnit<J> {
        let unit = self.job.create_new(
            records,
            attempt,
            self.config.max_retries(),
            self.config.chunk_size(),
        );

        if unit.attempt() != attempt || *unit.config() != self.config {
            warn!(
                lineage = %self.lineage,
                expected_attempt = attempt,
                got_attempt = unit.attempt(),
                expected = ?self.config,
                got = ?unit.config(),
                "descendant factory changed attempt or configuration"
            );
        }

        unit.in_lineage(self.lineage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(max_retries: u32) -> BatchConfig {
        BatchConfig::default().with_max_retries(max_retries)
    }

    #[test]
    fn tail_means_continuation_even_with_failures() {
        let step = NextStep::plan(vec![4, 5], vec![1], 1, &config(0));
        assert_eq!(
            step,
            NextStep::Continue {
                remaining: vec![4, 5],
                retry_set: vec![1],
                attempt: 1
            }
        );
    }

    #[test]
    fn last_chunk_without_failures_completes() {
        let step: NextStep<u8> = NextStep::plan(Vec::new(), Vec::new(), 3, &config(5));
        assert_eq!(step, NextStep::Complete);
    }

    #[test]
    fn last_chunk_with_failures_retries_with_delay() {
        let cfg = BatchConfig::builder()
            .set_delay_minutes(2)
            .unwrap()
            .set_max_retries(2)
            .unwrap()
            .build();
        let step = NextStep::plan(Vec::new(), vec![7, 8], 1, &cfg);
        assert_eq!(
            step,
            NextStep::Retry {
                records: vec![7, 8],
                next_attempt: 2,
                delay: Duration::from_secs(120)
            }
        );
    }

    #[test]
    fn exhausted_attempts_dead_letter() {
        let step = NextStep::plan(Vec::new(), vec![7], 2, &config(1));
        assert_eq!(step, NextStep::DeadLetter { records: vec![7] });

        let step = NextStep::plan(Vec::new(), vec![7], 1, &config(0));
        assert_eq!(step, NextStep::DeadLetter { records: vec![7] });
    }

    #[test]
    fn next_action_serializes_with_tag() {
        let json = serde_json::to_value(NextAction::DeadLettered { records: 4 }).unwrap();
        assert_eq!(json, serde_json::json!({"action": "dead_lettered", "records": 4}));
    }
}
