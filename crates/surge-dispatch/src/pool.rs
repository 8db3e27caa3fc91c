//! Worker pool — the ordered set of live workers.
//!
//! Workers are kept in creation order (newest last). Growth appends a
//! worker with the next unused id; shrinking removes the newest one.
//! Round-robin assignment walks the pool in that order, one request per
//! worker per pass.

use std::sync::Arc;

use tracing::{debug, info};

use surge_core::{ShrinkPolicy, WorkerId};

use crate::autoscaler::ScaleDecision;
use crate::error::DispatchResult;
use crate::event::EventBus;
use crate::queue::AdmissionQueue;
use crate::worker::{WorkTally, Worker, WorkerSnapshot};

/// Live workers plus the id allocator.
///
/// Not synchronized on its own; the dispatcher keeps it under the same
/// lock as the admission queue.
pub struct WorkerPool {
    workers: Vec<Worker>,
    /// Next id to hand out. Ids are never reused within a run.
    next_id: WorkerId,
    policy: ShrinkPolicy,
    tally: Arc<WorkTally>,
    events: EventBus,
    /// Largest pool size observed.
    peak: usize,
}

impl WorkerPool {
    pub(crate) fn new(policy: ShrinkPolicy, tally: Arc<WorkTally>, events: EventBus) -> Self {
        Self {
            workers: Vec::new(),
            next_id: 0,
            policy,
            tally,
            events,
            peak: 0,
        }
    }

    /// Spawn `count` workers.
    pub(crate) fn warm_up(&mut self, count: usize) {
        for _ in 0..count {
            self.grow();
        }
        info!(workers = count, policy = %self.policy, "worker pool warmed");
    }

    /// Spawn one worker and append it to the pool.
    pub(crate) fn grow(&mut self) -> WorkerId {
        let id = self.next_id;
        self.next_id += 1;

        let worker = Worker::spawn(id, self.policy, self.tally.clone(), self.events.clone());
        self.workers.push(worker);
        self.peak = self.peak.max(self.workers.len());

        info!(worker_id = id, pool_size = self.workers.len(), "allocated worker");
        id
    }

    /// Detach the newest worker and tell it to stop.
    ///
    /// The caller awaits [`Worker::stop`] on the returned handle; the pool
    /// no longer offers it any work.
    pub(crate) fn shrink(&mut self) -> Option<Worker> {
        let worker = self.workers.pop()?;
        worker.signal_stop();
        info!(
            worker_id = worker.id(),
            pool_size = self.workers.len(),
            backlog = worker.outstanding(),
            "deallocated worker"
        );
        Some(worker)
    }

    /// Apply an autoscaler decision. Returns the retired worker on shrink.
    pub(crate) fn apply(&mut self, decision: ScaleDecision) -> Option<Worker> {
        match decision {
            ScaleDecision::Grow => {
                self.grow();
                None
            }
            ScaleDecision::Shrink => self.shrink(),
            ScaleDecision::Hold => None,
        }
    }

    /// Offer each worker, in pool order, one request from `queue` while
    /// the queue is non-empty. Returns how many requests were assigned.
    pub(crate) fn assign_pass(&self, queue: &mut AdmissionQueue) -> DispatchResult<usize> {
        let mut assigned = 0;
        for worker in &self.workers {
            if queue.is_empty() {
                break;
            }
            let req = queue.dequeue()?;
            debug!(worker_id = worker.id(), %req, "assigned request");
            worker.add_request(req);
            assigned += 1;
        }
        Ok(assigned)
    }

    /// Remove every worker, preserving pool order.
    pub(crate) fn take_all(&mut self) -> Vec<Worker> {
        std::mem::take(&mut self.workers)
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Largest pool size reached so far.
    pub fn peak(&self) -> usize {
        self.peak
    }

    /// Worker ids in pool order.
    pub fn ids(&self) -> Vec<WorkerId> {
        self.workers.iter().map(Worker::id).collect()
    }

    /// True when no worker has anything queued or executing.
    pub fn all_idle(&self) -> bool {
        self.workers.iter().all(Worker::is_idle)
    }

    pub fn snapshots(&self) -> Vec<WorkerSnapshot> {
        self.workers.iter().map(Worker::snapshot).collect()
    }
}
