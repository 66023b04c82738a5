use std::sync::Arc;
use std::time::Duration;

use crate::error::ScheduleError;
use crate::job::BatchJob;
use crate::unit::JobUnit;

/// Host scheduler that runs units asynchronously.
///
/// Implementations must invoke every accepted unit at least once. The delay
/// is advisory: the engine never waits on it.
pub trait UnitScheduler<J: BatchJob> {
    fn submit(&self, unit: JobUnit<J>, delay: Duration) -> Result<(), ScheduleError>;

    /// Enqueue a unit for immediate execution.
    fn enqueue(&self, unit: JobUnit<J>) -> Result<(), ScheduleError> {
        self.submit(unit, Duration::ZERO)
    }
}

impl<J: BatchJob, S: UnitScheduler<J> + ?Sized> UnitScheduler<J> for Arc<S> {
    fn submit(&self, unit: JobUnit<J>, delay: Duration) -> Result<(), ScheduleError> {
        (**self).submit(unit, delay)
    }
}

impl<J: BatchJob, S: UnitScheduler<J> + ?Sized> UnitScheduler<J> for &S {
    fn submit(&self, unit: JobUnit<J>, delay: Duration) -> Result<(), ScheduleError> {
        (**self).submit(unit, delay)
    }
}
