//! Runs one synthetic record-sync lineage to completion on the in-memory
//! queue and prints executor statistics as JSON.
//!
//! `BATCHLINE_EXPEDITE=false` waits out retry delays instead of skipping them.

mod sync_job;

use std::thread;
use std::time::Duration;

use chrono::Utc;
use tracing::info;

use batchline_core::{JobUnit, UnitScheduler};
use batchline_infra::config::Settings;
use batchline_infra::jobs::{BatchExecutor, InMemoryUnitQueue, UnitQueue};

use crate::sync_job::{RecordSync, Workload};

fn main() -> anyhow::Result<()> {
    batchline_observability::init();

    let settings = Settings::from_env()?;
    let workload = Workload::from_env()?;
    let expedite = std::env::var("BATCHLINE_EXPEDITE").map(|v| v != "false").unwrap_or(true);

    info!(
        records = workload.records,
        chunk_size = settings.batch.chunk_size().get(),
        max_retries = settings.batch.max_retries(),
        delay_minutes = settings.batch.delay_minutes(),
        fail_fast = settings.batch.fail_fast(),
        "starting record sync"
    );

    let job = RecordSync::new(workload, settings.batch);
    let executor = BatchExecutor::<RecordSync, _>::new(InMemoryUnitQueue::arc());
    executor.queue().enqueue(JobUnit::root(job, settings.batch))?;

    loop {
        let outcomes = executor.run_until_idle()?;
        let stats = UnitQueue::stats(executor.queue())?;
        info!(units = outcomes.len(), delayed = stats.delayed, "queue drained");

        let Some(next_ready_at) = stats.next_ready_at else {
            break;
        };
        if expedite {
            executor.queue().expedite_all()?;
        } else {
            let wait = (next_ready_at - Utc::now()).to_std().unwrap_or(Duration::ZERO);
            info!(wait_secs = wait.as_secs(), "waiting for delayed retry");
            thread::sleep(wait.max(settings.executor.poll_interval));
        }
    }

    println!("{}", serde_json::to_string_pretty(&executor.stats())?);
    Ok(())
}
