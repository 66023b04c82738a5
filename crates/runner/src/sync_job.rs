//! Synthetic record-sync workload.
//!
//! Records are ids `1..=records`. Every `invalid_every`-th id fails
//! validation, every `fail_every`-th id fails processing on its first visit
//! and succeeds on a retry.

use std::collections::HashSet;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::Context;
use tracing::{info, warn};

use batchline_core::{BatchConfig, BatchJob, JobUnit, UnitFault};

#[derive(Debug, Clone, Copy)]
pub struct Workload {
    pub records: u64,
    pub fail_every: u64,
    pub invalid_every: u64,
}

impl Workload {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            records: env_u64("BATCHLINE_RECORDS", 500)?,
            fail_every: env_u64("BATCHLINE_FAIL_EVERY", 7)?,
            invalid_every: env_u64("BATCHLINE_INVALID_EVERY", 0)?,
        })
    }
}

fn env_u64(key: &str, default: u64) -> anyhow::Result<u64> {
    match std::env::var(key) {
        Ok(v) => v.trim().parse().with_context(|| format!("{key} must be a non-negative integer")),
        Err(_) => Ok(default),
    }
}

fn every(id: u64, n: u64) -> bool {
    n != 0 && id % n == 0
}

#[derive(Clone)]
pub struct RecordSync {
    workload: Workload,
    config: BatchConfig,
    failed_once: Arc<Mutex<HashSet<u64>>>,
}

impl RecordSync {
    pub fn new(workload: Workload, config: BatchConfig) -> Self {
        Self {
            workload,
            config,
            failed_once: Arc::default(),
        }
    }
}

impl BatchJob for RecordSync {
    type Record = u64;

    fn fetch_batch(&self) -> anyhow::Result<Vec<u64>> {
        Ok((1..=self.workload.records).collect())
    }

    fn validate(&self, record: &u64) -> anyhow::Result<Option<String>> {
        Ok(every(*record, self.workload.invalid_every).then(|| format!("record {record} is malformed")))
    }

    fn process(&self, record: &u64) -> anyhow::Result<bool> {
        if !every(*record, self.workload.fail_every) {
            return Ok(true);
        }
        let mut failed = self.failed_once.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(!failed.insert(*record))
    }

    fn create_new(
        &self,
        records: Vec<u64>,
        next_attempt: u32,
        max_retries: u32,
        chunk_size: NonZeroUsize,
    ) -> JobUnit<Self> {
        let config = self.config.with_max_retries(max_retries).with_chunk_size(chunk_size);
        JobUnit::with_records(self.clone(), records, next_attempt, config)
    }

    fn post_processing(&self, records: &[u64]) -> anyhow::Result<()> {
        info!(chunk_len = records.len(), "chunk synced");
        Ok(())
    }

    fn on_max_retries_reached(&self, records: &[u64]) -> anyhow::Result<()> {
        warn!(records = ?records, "records dead-lettered");
        Ok(())
    }

    fn on_validation_failed(&self, record: &u64, reason: &str) {
        warn!(record, reason, "record rejected");
    }

    fn on_unhandled_fault(&self, fault: &UnitFault, attempt: u32) {
        warn!(attempt, fault = %fault, "unit fault reported");
    }
}
