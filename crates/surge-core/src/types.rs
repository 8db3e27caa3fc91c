//! Domain types shared by every surge crate.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Identifier of a worker within one run.
///
/// Assigned from a monotonically increasing counter and never reused,
/// even after the worker it named has been removed from the pool.
pub type WorkerId = u64;

/// One unit of work flowing through the dispatcher.
///
/// Requests are immutable once built. They move between queues by value,
/// so at any moment exactly one queue owns a given request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    origin: String,
    destination: String,
    service_time_ms: u64,
}

impl Request {
    /// Create a request travelling from `origin` to `destination` that
    /// costs `service_time_ms` milliseconds to process.
    pub fn new(
        origin: impl Into<String>,
        destination: impl Into<String>,
        service_time_ms: u64,
    ) -> Self {
        Self {
            origin: origin.into(),
            destination: destination.into(),
            service_time_ms,
        }
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    /// Declared processing cost in milliseconds.
    pub fn service_time_ms(&self) -> u64 {
        self.service_time_ms
    }

    /// Declared processing cost as a [`Duration`].
    pub fn service_time(&self) -> Duration {
        Duration::from_millis(self.service_time_ms)
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -> {} ({} ms)",
            self.origin, self.destination, self.service_time_ms
        )
    }
}
