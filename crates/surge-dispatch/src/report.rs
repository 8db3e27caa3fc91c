//! Final run report and submission outcomes.

use std::fmt;

use serde::Serialize;

/// Why the balancer stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// `stop()` was called.
    Requested,
    /// The `run_for` budget expired.
    Deadline,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::Requested => f.write_str("requested"),
            StopReason::Deadline => f.write_str("deadline"),
        }
    }
}

/// Outcome of one `submit` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Submission {
    pub accepted: usize,
    /// Requests dropped because the balancer was already stopping.
    pub rejected: usize,
}

/// Summary produced once the balancer reaches its terminal state.
///
/// `min_service_time` and `max_service_time` are `None` when no request
/// was ever admitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FinalReport {
    /// Admission queue depth at stop. Always 0 after a completed drain.
    pub final_queue_size: usize,
    pub min_service_time: Option<u64>,
    pub max_service_time: Option<u64>,
    pub accepted: u64,
    pub rejected: u64,
    /// Requests handed from the admission queue to a worker.
    pub dispatched: u64,
    pub processed: u64,
    /// Requests discarded from worker-private queues.
    pub abandoned: u64,
    pub peak_pool_size: usize,
    /// Pool size when teardown began.
    pub final_pool_size: usize,
    pub stop_reason: StopReason,
}

impl FinalReport {
    pub fn service_time_range(&self) -> Option<(u64, u64)> {
        self.min_service_time.zip(self.max_service_time)
    }
}

impl fmt::Display for FinalReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Stop reason: {}", self.stop_reason)?;
        writeln!(f, "Final queue size: {}", self.final_queue_size)?;
        match self.service_time_range() {
            Some((min, max)) => writeln!(f, "Range of task times: [{min} ms, {max} ms]")?,
            None => writeln!(f, "Range of task times: no data observed")?,
        }
        writeln!(
            f,
            "Requests: {} accepted, {} rejected, {} dispatched, {} processed, {} abandoned",
            self.accepted, self.rejected, self.dispatched, self.processed, self.abandoned
        )?;
        write!(
            f,
            "Workers: peak {}, final {}",
            self.peak_pool_size, self.final_pool_size
        )
    }
}
