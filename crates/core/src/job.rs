use std::num::NonZeroUsize;

use crate::error::UnitFault;
use crate::unit::JobUnit;

/// A batch use-case: where records come from, what validating and processing
/// one means, and how to rebuild a unit for a descendant.
///
/// Hooks return `anyhow::Result`; an `Err` from any of them is an unhandled
/// fault for the unit, regardless of fail-fast. A processor returning
/// `Ok(false)` is an ordinary processing failure.
pub trait BatchJob: Sized + Send + Sync + 'static {
    type Record: Clone + core::fmt::Debug + Send + Sync + 'static;

    /// Supply the batch for attempt 1 of a fresh lineage.
    ///
    /// Called at most once per lineage; continuations and retries are handed
    /// their records directly.
    fn fetch_batch(&self) -> anyhow::Result<Vec<Self::Record>>;

    /// `Ok(None)` or an empty reason means the record is valid.
    fn validate(&self, record: &Self::Record) -> anyhow::Result<Option<String>>;

    /// `Ok(true)` on success.
    fn process(&self, record: &Self::Record) -> anyhow::Result<bool>;

    /// Build the unit for a continuation or retry.
    ///
    /// The engine passes the forward record set, the attempt the new unit
    /// runs as, and the lineage's retry limit and chunk size. Implementations
    /// must also preserve the delay and fail-fast settings they were created
    /// with.
    fn create_new(
        &self,
        records: Vec<Self::Record>,
        next_attempt: u32,
        max_retries: u32,
        chunk_size: NonZeroUsize,
    ) -> JobUnit<Self>;

    /// Called after every chunk that ran to the end, with the records
    /// processed in it (possibly none).
    fn post_processing(&self, _processed: &[Self::Record]) -> anyhow::Result<()> {
        Ok(())
    }

    /// Dead-letter hook. Receives each exhausted record exactly once.
    fn on_max_retries_reached(&self, _failed: &[Self::Record]) -> anyhow::Result<()> {
        Ok(())
    }

    fn on_validation_failed(&self, _record: &Self::Record, _reason: &str) {}

    /// Reporting channel for faults, called by the recovery guard.
    fn on_unhandled_fault(&self, _fault: &UnitFault, _attempt: u32) {}
}
