//! Load balancer — lifecycle controller for the dispatch engine.
//!
//! Owns start, admission, and both stop paths:
//!
//! - **Graceful stop** (`stop`): refuse new submissions, let the
//!   dispatcher drain the admission queue (resizes still happen), give
//!   workers a grace period to finish their backlog, then stop every
//!   remaining worker in pool order.
//! - **Deadline stop** (`run_for`): drive a producer until the wall-clock
//!   budget expires, stop the producer, then run the same protocol.
//!
//! Both are idempotent: the first caller performs the shutdown and every
//! caller receives the same [`FinalReport`].

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, Notify, OnceCell};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use surge_core::{ConfigResult, DispatchConfig, Request, WorkerId};

use crate::autoscaler::Autoscaler;
use crate::dispatcher::{self, DispatchState, Shared};
use crate::error::{DispatchError, DispatchResult};
use crate::event::{DispatchEvent, EventBus, EventSink};
use crate::pool::WorkerPool;
use crate::producer::{Producer, RunBudget};
use crate::queue::ServiceTimeStats;
use crate::report::{FinalReport, StopReason, Submission};
use crate::worker::{WorkTally, WorkerSnapshot};

/// How often teardown re-checks whether workers have gone idle.
const SETTLE_POLL: Duration = Duration::from_millis(10);

/// Handle to a running dispatch engine.
pub struct LoadBalancer {
    config: DispatchConfig,
    shared: Arc<Shared>,
    tally: Arc<WorkTally>,
    dispatcher: Mutex<Option<JoinHandle<DispatchResult<()>>>>,
    report: OnceCell<FinalReport>,
}

impl LoadBalancer {
    /// Validate `config`, spawn `min_servers` workers and the dispatcher.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(config: DispatchConfig) -> ConfigResult<Self> {
        Self::start_inner(config, EventBus::default())
    }

    /// Like [`start`](Self::start), delivering every [`DispatchEvent`] to
    /// `sink`.
    pub fn start_with_events(config: DispatchConfig, sink: EventSink) -> ConfigResult<Self> {
        Self::start_inner(config, EventBus::new(Some(sink)))
    }

    fn start_inner(config: DispatchConfig, events: EventBus) -> ConfigResult<Self> {
        config.validate()?;

        let tally = Arc::new(WorkTally::default());
        let mut pool = WorkerPool::new(config.shrink_policy, tally.clone(), events.clone());
        pool.warm_up(config.min_servers);

        let shared = Arc::new(Shared {
            state: Mutex::new(DispatchState::new(pool)),
            wake: Notify::new(),
            autoscaler: Autoscaler::new(&config),
            events,
        });
        let dispatcher = tokio::spawn(dispatcher::run(shared.clone()));

        info!(
            min_servers = config.min_servers,
            max_servers = config.max_servers,
            threshold_high = config.threshold_high,
            threshold_low = config.threshold_low,
            "load balancer started"
        );

        Ok(Self {
            config,
            shared,
            tally,
            dispatcher: Mutex::new(Some(dispatcher)),
            report: OnceCell::new(),
        })
    }

    /// Admit a batch of requests.
    ///
    /// Once a stop has begun every request is rejected; rejection is not
    /// an error, only a count in the returned [`Submission`].
    pub async fn submit<I>(&self, requests: I) -> Submission
    where
        I: IntoIterator<Item = Request>,
    {
        let mut outcome = Submission::default();
        {
            let mut state = self.shared.state.lock().await;
            for req in requests {
                if !state.running {
                    outcome.rejected += 1;
                    continue;
                }
                debug!(%req, "request admitted");
                state.queue.enqueue(req);
                outcome.accepted += 1;
            }
            state.accepted += outcome.accepted as u64;
            state.rejected += outcome.rejected as u64;
        }

        if outcome.accepted > 0 {
            self.shared.wake.notify_one();
        }
        if outcome.rejected > 0 {
            debug!(rejected = outcome.rejected, "submission rejected, balancer is stopping");
            self.shared.events.emit(DispatchEvent::Rejected {
                count: outcome.rejected,
            });
        }
        outcome
    }

    /// Drive `producer` until `budget` elapses, then stop with
    /// [`StopReason::Deadline`].
    ///
    /// The producer is stopped before the drain starts; requests already
    /// admitted are still fully dispatched.
    ///
    /// Fails with [`DispatchError::ZeroInterval`] before admitting anything
    /// if the producer reports a zero interval; the balancer keeps running.
    pub async fn run_for<P: Producer>(
        &self,
        budget: RunBudget,
        mut producer: P,
    ) -> DispatchResult<FinalReport> {
        let period = producer.interval();
        if period.is_zero() {
            return Err(DispatchError::ZeroInterval);
        }
        let budget = budget.as_duration();
        let deadline = Instant::now() + budget;
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);

        info!(budget_ms = budget.as_millis() as u64, "simulation started");
        loop {
            tokio::select! {
                biased;
                _ = tokio::time::sleep_until(deadline) => break,
                _ = ticker.tick() => {
                    let batch = producer.next_batch();
                    self.submit(batch).await;
                }
            }
        }
        info!("simulation deadline reached, request generation stopped");

        self.finish(StopReason::Deadline).await
    }

    /// Graceful stop. See the module docs for the protocol.
    pub async fn stop(&self) -> DispatchResult<FinalReport> {
        self.finish(StopReason::Requested).await
    }

    async fn finish(&self, reason: StopReason) -> DispatchResult<FinalReport> {
        self.report
            .get_or_try_init(|| self.shutdown(reason))
            .await
            .cloned()
    }

    async fn shutdown(&self, reason: StopReason) -> DispatchResult<FinalReport> {
        {
            let mut state = self.shared.state.lock().await;
            state.running = false;
            info!(%reason, queue_size = state.queue.len(), "stopping, draining admission queue");
        }
        self.shared.wake.notify_one();

        // Keep the handle in place until it resolves so a cancelled stop
        // can be retried.
        {
            let mut dispatcher = self.dispatcher.lock().await;
            if let Some(task) = dispatcher.as_mut() {
                let joined = task.await;
                *dispatcher = None;
                joined.map_err(|e| DispatchError::task("dispatcher", e))??;
            }
        }

        self.settle().await;

        let (workers, final_pool_size) = {
            let mut state = self.shared.state.lock().await;
            let workers = state.pool.take_all();
            let size = workers.len();
            (workers, size)
        };
        for worker in &workers {
            worker.stop().await?;
        }

        let (report, stats) = {
            let state = self.shared.state.lock().await;
            let stats = state.queue.stats();
            let report = FinalReport {
                final_queue_size: state.queue.len(),
                min_service_time: stats.min(),
                max_service_time: stats.max(),
                accepted: state.accepted,
                rejected: state.rejected,
                dispatched: state.dispatched,
                processed: self.tally.processed(),
                abandoned: self.tally.abandoned(),
                peak_pool_size: state.pool.peak(),
                final_pool_size,
                stop_reason: reason,
            };
            (report, stats)
        };

        info!(
            final_queue_size = report.final_queue_size,
            range = %stats,
            processed = report.processed,
            abandoned = report.abandoned,
            "all requests dispatched, load balancer stopped"
        );
        self.shared.events.emit(DispatchEvent::Stopped { reason });
        Ok(report)
    }

    /// Wait up to the teardown grace for every worker to go idle.
    async fn settle(&self) {
        let grace = self.config.teardown_grace();
        if grace.is_zero() {
            return;
        }
        let deadline = Instant::now() + grace;
        loop {
            if self.shared.state.lock().await.pool.all_idle() {
                return;
            }
            if Instant::now() >= deadline {
                warn!(
                    grace_ms = self.config.teardown_grace_ms,
                    "teardown grace expired with work still queued on workers"
                );
                return;
            }
            tokio::time::sleep(SETTLE_POLL).await;
        }
    }

    /// Whether a stop has begun.
    pub async fn is_running(&self) -> bool {
        self.shared.state.lock().await.running
    }

    pub async fn pool_size(&self) -> usize {
        self.shared.state.lock().await.pool.len()
    }

    pub async fn queue_len(&self) -> usize {
        self.shared.state.lock().await.queue.len()
    }

    /// Live worker ids in pool order.
    pub async fn worker_ids(&self) -> Vec<WorkerId> {
        self.shared.state.lock().await.pool.ids()
    }

    pub async fn workers(&self) -> Vec<WorkerSnapshot> {
        self.shared.state.lock().await.pool.snapshots()
    }

    pub async fn stats(&self) -> ServiceTimeStats {
        self.shared.state.lock().await.queue.stats()
    }
}

impl Drop for LoadBalancer {
    fn drop(&mut self) {
        // Never stopped: abort the dispatcher so its reference to the pool
        // is released and worker tasks exit once their channels close.
        if let Some(task) = self.dispatcher.get_mut().take() {
            task.abort();
        }
    }
}

