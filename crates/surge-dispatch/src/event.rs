//! Observable dispatch events.
//!
//! Every event is also logged through `tracing` at its call site. The
//! optional [`EventSink`] lets embedders (and tests) watch pool-size
//! history without parsing log output.

use std::sync::Arc;

use serde::Serialize;
use surge_core::WorkerId;

use crate::autoscaler::ScaleDecision;
use crate::report::StopReason;

/// Something the dispatch engine did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DispatchEvent {
    /// A worker task was spawned and joined the pool.
    WorkerStarted { worker_id: WorkerId },
    /// A worker's processing loop exited.
    WorkerStopped {
        worker_id: WorkerId,
        processed: u64,
        abandoned: u64,
    },
    /// One dispatcher pass: autoscaler decision, then round-robin
    /// assignment.
    Pass {
        pass: u64,
        queue_depth: usize,
        decision: ScaleDecision,
        pool_before: usize,
        pool_after: usize,
        assigned: usize,
    },
    /// Requests refused because the balancer is stopping.
    Rejected { count: usize },
    /// The balancer reached its terminal state.
    Stopped { reason: StopReason },
}

/// Callback invoked synchronously for every [`DispatchEvent`].
///
/// Runs on the emitting task, sometimes while the dispatcher lock is
/// held, so it must return quickly and must not call back into the
/// balancer.
pub type EventSink = Arc<dyn Fn(&DispatchEvent) + Send + Sync>;

/// Cheaply cloneable handle over an optional sink.
#[derive(Clone, Default)]
pub(crate) struct EventBus {
    sink: Option<EventSink>,
}

impl EventBus {
    pub(crate) fn new(sink: Option<EventSink>) -> Self {
        Self { sink }
    }

    pub(crate) fn emit(&self, event: DispatchEvent) {
        if let Some(ref sink) = self.sink {
            sink(&event);
        }
    }
}
