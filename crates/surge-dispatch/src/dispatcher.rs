//! Dispatcher — the control loop feeding workers from the admission queue.
//!
//! # State machine
//!
//! ```text
//!            queue non-empty                 queue empty, running
//!   Idle ───────────────────────▶ Draining ───────────────────────▶ Idle
//!    │                               │
//!    │ stop requested, queue empty   │ stop requested, queue empty
//!    ▼                               ▼
//!  Stopped ◀─────────────────────────┘
//! ```
//!
//! Each `Draining` pass runs the autoscaler against the current depth,
//! applies at most one resize, then hands one request to each worker in
//! pool order. Passes repeat until one starts with an empty queue; that
//! last pass still consults the autoscaler, which is where the pool
//! shrinks back after a burst.

use std::sync::Arc;

use tokio::sync::{Mutex, Notify};
use tokio::task::JoinSet;
use tracing::{debug, info};

use crate::autoscaler::{Autoscaler, ScaleDecision};
use crate::error::{DispatchError, DispatchResult};
use crate::event::{DispatchEvent, EventBus};
use crate::pool::WorkerPool;
use crate::queue::AdmissionQueue;

/// Dispatcher loop states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatcherPhase {
    /// Waiting for work or a stop request.
    Idle,
    /// Running autoscale + assign passes.
    Draining,
    /// Terminal.
    Stopped,
}

/// Everything guarded by the coarse lock.
pub(crate) struct DispatchState {
    pub(crate) queue: AdmissionQueue,
    pub(crate) pool: WorkerPool,
    /// Cleared when a stop begins; submissions are refused afterwards.
    pub(crate) running: bool,
    pub(crate) accepted: u64,
    pub(crate) rejected: u64,
    pub(crate) dispatched: u64,
    pub(crate) passes: u64,
}

impl DispatchState {
    pub(crate) fn new(pool: WorkerPool) -> Self {
        Self {
            queue: AdmissionQueue::new(),
            pool,
            running: true,
            accepted: 0,
            rejected: 0,
            dispatched: 0,
            passes: 0,
        }
    }
}

/// State shared between the balancer handle and the dispatcher task.
pub(crate) struct Shared {
    pub(crate) state: Mutex<DispatchState>,
    /// Signalled on submit and on stop.
    pub(crate) wake: Notify,
    pub(crate) autoscaler: Autoscaler,
    pub(crate) events: EventBus,
}

/// Run the dispatcher until a stop is requested and the queue is empty.
///
/// Workers retired by the shrink rule are stopped in the background so a
/// long-running request does not stall dispatch; all of them are joined
/// before this returns.
pub(crate) async fn run(shared: Arc<Shared>) -> DispatchResult<()> {
    let mut retiring: JoinSet<DispatchResult<()>> = JoinSet::new();
    let mut phase = DispatcherPhase::Idle;
    info!("dispatcher started");

    while phase != DispatcherPhase::Stopped {
        phase = {
            let state = shared.state.lock().await;
            if !state.queue.is_empty() {
                DispatcherPhase::Draining
            } else if !state.running {
                DispatcherPhase::Stopped
            } else {
                DispatcherPhase::Idle
            }
        };

        match phase {
            DispatcherPhase::Idle => shared.wake.notified().await,
            DispatcherPhase::Draining => drain(&shared, &mut retiring).await?,
            DispatcherPhase::Stopped => {}
        }

        // Reap finished retirements so the set does not grow unbounded.
        while let Some(joined) = retiring.try_join_next() {
            joined.map_err(|e| DispatchError::task("worker retirement", e))??;
        }
    }

    while let Some(joined) = retiring.join_next().await {
        joined.map_err(|e| DispatchError::task("worker retirement", e))??;
    }

    let state = shared.state.lock().await;
    info!(
        queue_size = state.queue.len(),
        passes = state.passes,
        "dispatcher stopped"
    );
    Ok(())
}

/// Run passes until one begins with an empty queue.
async fn drain(
    shared: &Shared,
    retiring: &mut JoinSet<DispatchResult<()>>,
) -> DispatchResult<()> {
    loop {
        let mut guard = shared.state.lock().await;
        let state = &mut *guard;

        let queue_depth = state.queue.len();
        let pool_before = state.pool.len();
        let decision = shared.autoscaler.evaluate(queue_depth, pool_before);
        let retired = state.pool.apply(decision);

        let assigned = state.pool.assign_pass(&mut state.queue)?;
        state.dispatched += assigned as u64;
        state.passes += 1;

        let pool_after = state.pool.len();
        if decision != ScaleDecision::Hold || assigned > 0 {
            debug!(
                pass = state.passes,
                queue_depth,
                ?decision,
                pool_before,
                pool_after,
                assigned,
                "dispatch pass"
            );
        }
        shared.events.emit(DispatchEvent::Pass {
            pass: state.passes,
            queue_depth,
            decision,
            pool_before,
            pool_after,
            assigned,
        });
        drop(guard);

        if let Some(worker) = retired {
            retiring.spawn(async move { worker.stop().await });
        }

        if queue_depth == 0 {
            return Ok(());
        }
    }
}
