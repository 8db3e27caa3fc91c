//! Admission queue: the shared FIFO of accepted, not-yet-assigned requests.
//!
//! The queue itself is not synchronized. It lives inside the dispatcher's
//! coarse lock together with the worker pool, so every compound
//! check-then-act (depth check, resize, assignment) sees one consistent
//! state.

use std::collections::VecDeque;
use std::fmt;

use serde::Serialize;
use surge_core::Request;

use crate::error::{DispatchError, DispatchResult};

/// Running service-time bounds over every request ever admitted.
///
/// Bounds only widen. `None` means no request has been observed yet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ServiceTimeStats {
    min: Option<u64>,
    max: Option<u64>,
    observed: u64,
}

impl ServiceTimeStats {
    fn record(&mut self, service_time_ms: u64) {
        self.min = Some(self.min.map_or(service_time_ms, |m| m.min(service_time_ms)));
        self.max = Some(self.max.map_or(service_time_ms, |m| m.max(service_time_ms)));
        self.observed += 1;
    }

    pub fn min(&self) -> Option<u64> {
        self.min
    }

    pub fn max(&self) -> Option<u64> {
        self.max
    }

    /// Number of requests that contributed to the bounds.
    pub fn observed(&self) -> u64 {
        self.observed
    }

    /// `(min, max)` if at least one request was observed.
    pub fn range(&self) -> Option<(u64, u64)> {
        self.min.zip(self.max)
    }
}

impl fmt::Display for ServiceTimeStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.range() {
            Some((min, max)) => write!(f, "[{min} ms, {max} ms]"),
            None => f.write_str("no data observed"),
        }
    }
}

/// FIFO buffer of admitted requests plus their aggregate statistics.
#[derive(Debug, Default)]
pub struct AdmissionQueue {
    requests: VecDeque<Request>,
    stats: ServiceTimeStats,
}

impl AdmissionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a request to the tail and fold it into the statistics.
    pub fn enqueue(&mut self, req: Request) {
        self.stats.record(req.service_time_ms());
        self.requests.push_back(req);
    }

    /// Remove and return the head of the queue.
    ///
    /// Calling this on an empty queue is a contract violation; callers
    /// check [`is_empty`](Self::is_empty) first.
    pub fn dequeue(&mut self) -> DispatchResult<Request> {
        self.requests.pop_front().ok_or(DispatchError::EmptyQueue)
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    pub fn stats(&self) -> ServiceTimeStats {
        self.stats
    }
}
