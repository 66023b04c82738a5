//! `batchline-core`: the chunk/retry/continuation engine.
//!
//! This crate is runtime agnostic: it decides what a unit of work handles,
//! how failures are classified and carried forward, and what the next unit
//! is. Actually running units is left to a [`UnitScheduler`] implementation
//! (see `batchline-infra`).

pub mod chunker;
pub mod config;
pub mod continuation;
pub mod error;
pub mod id;
pub mod job;
pub mod ledger;
mod recovery;
pub mod scheduler;
pub mod unit;

pub use chunker::{Chunk, next_chunk, split_chunk};
pub use config::{BackoffStrategy, BatchConfig, BatchConfigBuilder};
pub use continuation::{ContinuationScheduler, NextAction, NextStep};
pub use error::{ConfigError, ScheduleError, UnitFault};
pub use id::LineageId;
pub use job::BatchJob;
pub use ledger::{ExecutionResult, RetryDecision, RetryLedger};
pub use scheduler::UnitScheduler;
pub use unit::{JobUnit, UnitReport};
