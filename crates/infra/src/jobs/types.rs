//! Queue-side unit types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use batchline_core::{BatchJob, JobUnit, LineageId};

/// Identifier of a queued unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnitId(pub Uuid);

impl UnitId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for UnitId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for UnitId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A unit waiting in a queue.
pub struct QueuedUnit<J: BatchJob> {
    pub id: UnitId,
    pub unit: JobUnit<J>,
    /// Submission order, used to keep claiming FIFO.
    pub sequence: u64,
    pub enqueued_at: DateTime<Utc>,
    /// Earliest time the unit may run.
    pub scheduled_at: DateTime<Utc>,
}

impl<J: BatchJob> QueuedUnit<J> {
    pub fn is_ready_at(&self, now: DateTime<Utc>) -> bool {
        self.scheduled_at <= now
    }

    pub fn info(&self) -> QueuedUnitInfo {
        QueuedUnitInfo {
            id: self.id,
            lineage: self.unit.lineage(),
            attempt: self.unit.attempt(),
            records: self.unit.records().map(<[_]>::len),
            carried_failures: self.unit.carried_failures().len(),
            enqueued_at: self.enqueued_at,
            scheduled_at: self.scheduled_at,
        }
    }
}

impl<J: BatchJob> std::fmt::Debug for QueuedUnit<J> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueuedUnit")
            .field("id", &self.id)
            .field("unit", &self.unit)
            .field("sequence", &self.sequence)
            .field("scheduled_at", &self.scheduled_at)
            .finish()
    }
}

/// Record-free view of a queued unit, for inspection and logs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueuedUnitInfo {
    pub id: UnitId,
    pub lineage: LineageId,
    pub attempt: u32,
    /// `None` for a root unit that has not fetched its batch yet.
    pub records: Option<usize>,
    pub carried_failures: usize,
    pub enqueued_at: DateTime<Utc>,
    pub scheduled_at: DateTime<Utc>,
}

impl QueuedUnitInfo {
    /// How long after submission the unit becomes ready.
    pub fn delay(&self) -> chrono::Duration {
        self.scheduled_at - self.enqueued_at
    }
}
