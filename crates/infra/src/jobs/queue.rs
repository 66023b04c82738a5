//! Unit queue implementations.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::debug;

use batchline_core::{BatchJob, JobUnit, ScheduleError, UnitScheduler};

use super::types::{QueuedUnit, QueuedUnitInfo, UnitId};

/// Queue abstraction the executor drains.
pub trait UnitQueue<J: BatchJob>: UnitScheduler<J> + Send + Sync {
    /// Claim the next unit that is ready to run.
    /// Returns None if nothing is ready.
    fn claim_next(&self) -> Result<Option<QueuedUnit<J>>, ScheduleError>;

    fn stats(&self) -> Result<QueueStats, ScheduleError>;
}

/// Queue statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct QueueStats {
    pub pending: usize,
    pub ready: usize,
    pub delayed: usize,
    pub submitted_total: u64,
    pub next_ready_at: Option<DateTime<Utc>>,
}

#[derive(Debug)]
struct QueueState<J: BatchJob> {
    units: Vec<QueuedUnit<J>>,
    next_sequence: u64,
}

/// In-memory unit queue for tests/dev and single-process hosts.
#[derive(Debug)]
pub struct InMemoryUnitQueue<J: BatchJob> {
    state: Mutex<QueueState<J>>,
    closed: AtomicBool,
}

impl<J: BatchJob> InMemoryUnitQueue<J> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                units: Vec::new(),
                next_sequence: 0,
            }),
            closed: AtomicBool::new(false),
        }
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    fn lock(&self) -> Result<MutexGuard<'_, QueueState<J>>, ScheduleError> {
        self.state.lock().map_err(|_| ScheduleError::Poisoned)
    }

    /// Stop accepting submissions. Queued units can still be claimed.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> Result<usize, ScheduleError> {
        Ok(self.lock()?.units.len())
    }

    pub fn is_empty(&self) -> Result<bool, ScheduleError> {
        Ok(self.len()? == 0)
    }

    /// Pending units in claim order.
    pub fn snapshot(&self) -> Result<Vec<QueuedUnitInfo>, ScheduleError> {
        let state = self.lock()?;
        let mut infos: Vec<_> = state.units.iter().collect();
        infos.sort_by_key(|u| (u.scheduled_at, u.sequence));
        Ok(infos.into_iter().map(QueuedUnit::info).collect())
    }

    /// Make every delayed unit ready now. Returns how many were moved.
    pub fn expedite_all(&self) -> Result<usize, ScheduleError> {
        let mut state = self.lock()?;
        let now = Utc::now();
        let mut moved = 0;
        for unit in state.units.iter_mut().filter(|u| !u.is_ready_at(now)) {
            unit.scheduled_at = now;
            moved += 1;
        }
        Ok(moved)
    }
}

impl<J: BatchJob> Default for InMemoryUnitQueue<J> {
    fn default() -> Self {
        Self::new()
    }
}

impl<J: BatchJob> UnitScheduler<J> for InMemoryUnitQueue<J> {
    fn submit(&self, unit: JobUnit<J>, delay: Duration) -> Result<(), ScheduleError> {
        if self.is_closed() {
            return Err(ScheduleError::Closed);
        }

        let now = Utc::now();
        let scheduled_at = chrono::Duration::from_std(delay)
            .ok()
            .and_then(|d| now.checked_add_signed(d))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        let mut state = self.lock()?;
        let sequence = state.next_sequence;
        state.next_sequence += 1;

        let queued = QueuedUnit {
            id: UnitId::new(),
            unit,
            sequence,
            enqueued_at: now,
            scheduled_at,
        };
        debug!(
            unit_id = %queued.id,
            lineage = %queued.unit.lineage(),
            attempt = queued.unit.attempt(),
            delay_secs = delay.as_secs(),
            "unit queued"
        );
        state.units.push(queued);
        Ok(())
    }
}

impl<J: BatchJob> UnitQueue<J> for InMemoryUnitQueue<J> {
    fn claim_next(&self) -> Result<Option<QueuedUnit<J>>, ScheduleError> {
        let mut state = self.lock()?;
        let now = Utc::now();

        let next = state
            .units
            .iter()
            .enumerate()
            .filter(|(_, u)| u.is_ready_at(now))
            .min_by_key(|(_, u)| (u.scheduled_at, u.sequence))
            .map(|(i, _)| i);

        Ok(next.map(|i| state.units.remove(i)))
    }

    fn stats(&self) -> Result<QueueStats, ScheduleError> {
        let state = self.lock()?;
        let now = Utc::now();

        let ready = state.units.iter().filter(|u| u.is_ready_at(now)).count();
        Ok(QueueStats {
            pending: state.units.len(),
            ready,
            delayed: state.units.len() - ready,
            submitted_total: state.next_sequence,
            next_ready_at: state.units.iter().map(|u| u.scheduled_at).min(),
        })
    }
}

impl<J: BatchJob> UnitQueue<J> for Arc<InMemoryUnitQueue<J>> {
    fn claim_next(&self) -> Result<Option<QueuedUnit<J>>, ScheduleError> {
        (**self).claim_next()
    }

    fn stats(&self) -> Result<QueueStats, ScheduleError> {
        (**self).stats()
    }
}
