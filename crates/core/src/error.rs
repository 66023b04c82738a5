//! Error model for configuration, scheduling and unit faults.

use thiserror::Error;

/// Configuration was rejected when it was set.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid configuration: {field} {reason} (got {value})")]
    InvalidConfiguration {
        field: &'static str,
        reason: &'static str,
        value: String,
    },
}

impl ConfigError {
    pub fn invalid(field: &'static str, reason: &'static str, value: impl ToString) -> Self {
        Self::InvalidConfiguration {
            field,
            reason,
            value: value.to_string(),
        }
    }
}

/// The host scheduler refused a unit.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("scheduler is closed")]
    Closed,

    /// Internal lock poisoning.
    #[error("scheduler state poisoned")]
    Poisoned,

    #[error("scheduler rejected unit: {0}")]
    Rejected(String),
}

/// An unhandled fault that escapes a unit.
///
/// Record-level failures never show up here unless fail-fast escalated them.
/// Every fault is routed through the recovery guard before it is returned.
#[derive(Debug, Error)]
pub enum UnitFault {
    /// The record source could not supply the batch.
    #[error("record source failed: {error:#}")]
    RecordSource { error: anyhow::Error },

    /// A caller hook returned an error.
    #[error("hook `{hook}` failed at record {index}: {error:#}")]
    Hook {
        hook: &'static str,
        index: usize,
        error: anyhow::Error,
    },

    /// Fail-fast mode escalated a processing failure.
    #[error("record {index} failed processing (fail-fast)")]
    FailFast { index: usize },

    #[error("post-processing hook failed: {error:#}")]
    PostProcessing { error: anyhow::Error },

    #[error("dead-letter hook failed: {error:#}")]
    DeadLetter { error: anyhow::Error },

    #[error("could not schedule next unit: {0}")]
    Schedule(#[from] ScheduleError),

    /// The unit body unwound.
    #[error("unit aborted by panic")]
    Panicked,
}

impl UnitFault {
    pub fn hook(hook: &'static str, index: usize, error: anyhow::Error) -> Self {
        Self::Hook { hook, index, error }
    }

    /// Whether this fault happened before the chunk finished.
    pub fn aborted_chunk(&self) -> bool {
        matches!(
            self,
            UnitFault::RecordSource { .. }
                | UnitFault::Hook { .. }
                | UnitFault::FailFast { .. }
                | UnitFault::Panicked
        )
    }
}
