//! Producer interface and run budgets for time-boxed simulations.

use std::time::Duration;

use surge_core::Request;

/// Source of work driven by [`LoadBalancer::run_for`](crate::LoadBalancer::run_for).
///
/// Every `interval()` the balancer asks for one batch and submits it.
pub trait Producer: Send {
    /// Delay between two batches. Must be non-zero.
    fn interval(&self) -> Duration;

    /// Produce the next batch. An empty batch is fine.
    fn next_batch(&mut self) -> Vec<Request>;
}

/// Wall-clock budget for a simulated run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunBudget {
    Duration(Duration),
    /// Clock cycles; one cycle lasts one millisecond.
    Cycles(u64),
}

impl RunBudget {
    pub fn as_duration(&self) -> Duration {
        match *self {
            RunBudget::Duration(d) => d,
            RunBudget::Cycles(cycles) => Duration::from_millis(cycles),
        }
    }
}
