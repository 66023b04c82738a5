//! Host scheduler for job units: a delayed-ready queue and an executor.
//!
//! ## Design
//!
//! - Units are queued with a ready time (`now + delay`)
//! - Claiming is FIFO among ready units
//! - The executor runs one unit at a time, so descendants never overlap
//!   their parent
//! - Panicking units are contained; the unit's recovery guard has already
//!   continued the lineage by the time the executor sees the panic
//!
//! ## Components
//!
//! - `QueuedUnit`: a unit plus its queue metadata
//! - `UnitQueue` / `InMemoryUnitQueue`: storage for pending units
//! - `BatchExecutor`: drains the queue synchronously or on a worker thread

pub mod executor;
pub mod queue;
pub mod types;

pub use executor::{BatchExecutor, ExecutorConfig, ExecutorHandle, ExecutorStats, UnitOutcome};
pub use queue::{InMemoryUnitQueue, QueueStats, UnitQueue};
pub use types::{QueuedUnit, QueuedUnitInfo, UnitId};
