//! Worker — an independently scheduled execution unit.
//!
//! Each worker is one tokio task draining its own unbounded FIFO. Handing
//! a request to a worker never takes a lock, so the dispatcher can assign
//! work while holding its coarse lock without any lock-ordering concerns.
//!
//! Stopping is cooperative: a watch channel carries the stop flag, and a
//! request that is already executing always runs its full service time.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use serde::Serialize;
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use surge_core::{Request, ShrinkPolicy, WorkerId};

use crate::error::{DispatchError, DispatchResult};
use crate::event::{DispatchEvent, EventBus};

/// Lifecycle of a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    Running,
    /// Stop requested; the loop has not exited yet.
    Stopping,
    Stopped,
}

/// Completion counters shared by every worker of one balancer.
///
/// Retired workers keep contributing here after they leave the pool, so
/// the final report accounts for all work.
#[derive(Debug, Default)]
pub struct WorkTally {
    processed: AtomicU64,
    abandoned: AtomicU64,
}

impl WorkTally {
    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    pub fn abandoned(&self) -> u64 {
        self.abandoned.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Default)]
struct WorkerCounters {
    /// Requests handed over and not yet finished (queued + executing).
    outstanding: AtomicUsize,
    processed: AtomicU64,
}

/// Point-in-time view of a worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkerSnapshot {
    pub worker_id: WorkerId,
    pub state: WorkerState,
    pub outstanding: usize,
    pub processed: u64,
}

/// Handle to a running worker task.
pub struct Worker {
    id: WorkerId,
    tx: mpsc::UnboundedSender<Request>,
    state: Arc<watch::Sender<WorkerState>>,
    counters: Arc<WorkerCounters>,
    tally: Arc<WorkTally>,
    /// Taken by the first `stop()` that finishes joining.
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Worker {
    /// Spawn the worker's processing task on the current runtime.
    pub(crate) fn spawn(
        id: WorkerId,
        policy: ShrinkPolicy,
        tally: Arc<WorkTally>,
        events: EventBus,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let state = Arc::new(watch::Sender::new(WorkerState::Running));
        let counters = Arc::new(WorkerCounters::default());

        let worker_loop = WorkerLoop {
            id,
            rx,
            state: state.clone(),
            counters: counters.clone(),
            tally: tally.clone(),
            policy,
            events: events.clone(),
        };
        let handle = tokio::spawn(worker_loop.run());

        events.emit(DispatchEvent::WorkerStarted { worker_id: id });

        Self {
            id,
            tx,
            state,
            counters,
            tally,
            handle: Mutex::new(Some(handle)),
        }
    }

    pub fn id(&self) -> WorkerId {
        self.id
    }

    pub fn state(&self) -> WorkerState {
        *self.state.borrow()
    }

    /// Requests handed to this worker that have not finished yet.
    pub fn outstanding(&self) -> usize {
        self.counters.outstanding.load(Ordering::Relaxed)
    }

    pub fn processed(&self) -> u64 {
        self.counters.processed.load(Ordering::Relaxed)
    }

    /// True when nothing is queued or executing.
    pub fn is_idle(&self) -> bool {
        self.outstanding() == 0
    }

    pub fn snapshot(&self) -> WorkerSnapshot {
        WorkerSnapshot {
            worker_id: self.id,
            state: self.state(),
            outstanding: self.outstanding(),
            processed: self.processed(),
        }
    }

    /// Append a request to the private queue and wake the worker.
    ///
    /// Never blocks. If the worker's loop has already exited the request
    /// is counted as abandoned.
    pub fn add_request(&self, req: Request) {
        self.counters.outstanding.fetch_add(1, Ordering::Relaxed);
        if let Err(mpsc::error::SendError(req)) = self.tx.send(req) {
            self.counters.outstanding.fetch_sub(1, Ordering::Relaxed);
            self.tally.abandoned.fetch_add(1, Ordering::Relaxed);
            warn!(worker_id = self.id, %req, "worker already exited, request abandoned");
        }
    }

    /// Flip the state to `Stopping` without waiting. Returns false if a
    /// stop was already requested.
    pub fn signal_stop(&self) -> bool {
        let changed = self.state.send_if_modified(|state| {
            if *state == WorkerState::Running {
                *state = WorkerState::Stopping;
                true
            } else {
                false
            }
        });
        if changed {
            debug!(worker_id = self.id, "worker stop requested");
        }
        changed
    }

    /// Stop the worker and wait for its loop to exit.
    ///
    /// Idempotent and safe to call concurrently: every caller returns once
    /// the task has been joined, and the task is joined exactly once.
    /// Whether queued requests are executed or abandoned depends on the
    /// worker's [`ShrinkPolicy`].
    pub async fn stop(&self) -> DispatchResult<()> {
        self.signal_stop();

        let mut handle = self.handle.lock().await;
        if let Some(task) = handle.as_mut() {
            let joined = task.await;
            *handle = None;
            joined.map_err(|e| DispatchError::task(format!("worker-{}", self.id), e))?;
        }
        Ok(())
    }
}

/// State owned by the spawned task.
struct WorkerLoop {
    id: WorkerId,
    rx: mpsc::UnboundedReceiver<Request>,
    state: Arc<watch::Sender<WorkerState>>,
    counters: Arc<WorkerCounters>,
    tally: Arc<WorkTally>,
    policy: ShrinkPolicy,
    events: EventBus,
}

impl WorkerLoop {
    async fn run(mut self) {
        let mut stop_rx = self.state.subscribe();
        debug!(worker_id = self.id, "worker started");

        loop {
            // A pending stop wins over queued work.
            if stop_requested(&mut stop_rx) {
                break;
            }
            tokio::select! {
                biased;
                _ = stop_rx.changed() => continue,
                next = self.rx.recv() => match next {
                    Some(req) => execute(self.id, &self.counters, &self.tally, req).await,
                    None => break,
                },
            }
        }

        // Refuse further sends; anything already buffered is still readable.
        self.rx.close();

        let abandoned = match self.policy {
            ShrinkPolicy::Drain => {
                while let Ok(req) = self.rx.try_recv() {
                    execute(self.id, &self.counters, &self.tally, req).await;
                }
                0
            }
            ShrinkPolicy::Abandon => {
                let mut count = 0u64;
                while self.rx.try_recv().is_ok() {
                    count += 1;
                }
                count
            }
        };

        if abandoned > 0 {
            self.counters
                .outstanding
                .fetch_sub(abandoned as usize, Ordering::Relaxed);
            self.tally.abandoned.fetch_add(abandoned, Ordering::Relaxed);
            warn!(
                worker_id = self.id,
                abandoned, "worker stopped with queued requests, abandoning them"
            );
        }

        self.state.send_replace(WorkerState::Stopped);

        let processed = self.counters.processed.load(Ordering::Relaxed);
        info!(worker_id = self.id, processed, abandoned, "worker stopped");
        self.events.emit(DispatchEvent::WorkerStopped {
            worker_id: self.id,
            processed,
            abandoned,
        });
    }
}

/// Simulate processing by blocking for the declared service time.
async fn execute(id: WorkerId, counters: &WorkerCounters, tally: &WorkTally, req: Request) {
    debug!(
        worker_id = id,
        origin = req.origin(),
        destination = req.destination(),
        service_time_ms = req.service_time_ms(),
        "processing request"
    );
    tokio::time::sleep(req.service_time()).await;

    counters.processed.fetch_add(1, Ordering::Relaxed);
    counters.outstanding.fetch_sub(1, Ordering::Relaxed);
    tally.processed.fetch_add(1, Ordering::Relaxed);
}

fn stop_requested(rx: &mut watch::Receiver<WorkerState>) -> bool {
    *rx.borrow_and_update() != WorkerState::Running
}
