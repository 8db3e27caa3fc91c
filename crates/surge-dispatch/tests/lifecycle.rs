//! End-to-end lifecycle tests for the dispatch engine.
//!
//! All tests run on a paused clock, so simulated service times advance
//! virtual time instantly and the scenarios are deterministic.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use surge_core::{ConfigError, DispatchConfig, Request, ShrinkPolicy};
use surge_dispatch::*;

type Recorded = Arc<Mutex<Vec<DispatchEvent>>>;

fn recorder() -> (EventSink, Recorded) {
    let events: Recorded = Arc::new(Mutex::new(Vec::new()));
    let sink_events = events.clone();
    let sink: EventSink = Arc::new(move |event: &DispatchEvent| {
        sink_events.lock().unwrap().push(event.clone());
    });
    (sink, events)
}

fn burst(count: usize, service_time_ms: u64) -> Vec<Request> {
    (0..count)
        .map(|i| Request::new(format!("10.0.0.{i}"), "192.168.0.1", service_time_ms))
        .collect()
}

/// `(pool_before, pool_after, decision)` for every dispatcher pass.
fn passes(events: &Recorded) -> Vec<(usize, usize, ScaleDecision)> {
    events
        .lock()
        .unwrap()
        .iter()
        .filter_map(|e| match e {
            DispatchEvent::Pass {
                pool_before,
                pool_after,
                decision,
                ..
            } => Some((*pool_before, *pool_after, *decision)),
            _ => None,
        })
        .collect()
}

fn assert_resize_invariants(passes: &[(usize, usize, ScaleDecision)], min: usize, max: usize) {
    for (before, after, decision) in passes {
        assert!((min..=max).contains(after), "pool size {after} out of bounds");
        assert!(before.abs_diff(*after) <= 1, "pass resized {before} -> {after}");
        match decision {
            ScaleDecision::Grow => assert_eq!(*after, before + 1),
            ScaleDecision::Shrink => assert_eq!(*after + 1, *before),
            ScaleDecision::Hold => assert_eq!(after, before),
        }
    }
}

struct FixedProducer {
    interval: Duration,
    batch: usize,
    service_time_ms: u64,
}

impl Producer for FixedProducer {
    fn interval(&self) -> Duration {
        self.interval
    }

    fn next_batch(&mut self) -> Vec<Request> {
        burst(self.batch, self.service_time_ms)
    }
}

#[tokio::test(start_paused = true)]
async fn burst_grows_to_ceiling_then_shrinks_back() {
    let (sink, events) = recorder();
    let config = DispatchConfig::new(2, 5, 10, 2);
    let balancer = LoadBalancer::start_with_events(config, sink).unwrap();
    assert_eq!(balancer.pool_size().await, 2);

    let outcome = balancer.submit(burst(20, 50)).await;
    assert_eq!(outcome, Submission { accepted: 20, rejected: 0 });

    let stats = balancer.stats().await;
    assert_eq!(stats.observed(), 20);
    assert_eq!(stats.range(), Some((50, 50)));

    let report = balancer.stop().await.unwrap();
    assert_eq!(report.final_queue_size, 0);
    assert_eq!(report.accepted, 20);
    assert_eq!(report.dispatched, 20);
    assert_eq!(report.service_time_range(), Some((50, 50)));
    assert_eq!(report.peak_pool_size, 5);
    assert!(report.final_pool_size < 5);
    assert_eq!(report.processed + report.abandoned, 20);
    // The shrunk worker still had requests queued.
    assert!(report.abandoned >= 1);

    let passes = passes(&events);
    assert_resize_invariants(&passes, 2, 5);
    assert!(passes.iter().any(|p| p.2 == ScaleDecision::Grow));
    assert!(passes.iter().any(|p| p.2 == ScaleDecision::Shrink));
    assert_eq!(passes.iter().map(|p| p.1).max(), Some(5));
}

#[tokio::test(start_paused = true)]
async fn drain_policy_processes_every_request() {
    let config = DispatchConfig::new(2, 5, 10, 2).with_shrink_policy(ShrinkPolicy::Drain);
    let balancer = LoadBalancer::start(config).unwrap();

    balancer.submit(burst(20, 50)).await;
    let report = balancer.stop().await.unwrap();

    assert_eq!(report.final_queue_size, 0);
    assert_eq!(report.processed, 20);
    assert_eq!(report.abandoned, 0);
}

#[tokio::test(start_paused = true)]
async fn fixed_pool_never_resizes() {
    let (sink, events) = recorder();
    let config = DispatchConfig::new(3, 3, 10, 2);
    let balancer = LoadBalancer::start_with_events(config, sink).unwrap();

    balancer.submit(burst(50, 20)).await;
    tokio::time::sleep(Duration::from_millis(5)).await;
    assert_eq!(balancer.worker_ids().await, vec![0, 1, 2]);
    let snapshots = balancer.workers().await;
    assert!(snapshots.iter().all(|s| s.state == WorkerState::Running));
    assert_eq!(snapshots.iter().map(|s| s.outstanding).sum::<usize>(), 50);
    assert!(snapshots.iter().all(|s| s.processed == 0));

    let report = balancer.stop().await.unwrap();
    assert_eq!(report.final_queue_size, 0);
    assert_eq!(report.peak_pool_size, 3);
    assert_eq!(report.final_pool_size, 3);

    let passes = passes(&events);
    assert!(!passes.is_empty());
    assert!(passes.iter().all(|p| p == &(3, 3, ScaleDecision::Hold)));

    let started = events
        .lock()
        .unwrap()
        .iter()
        .filter(|e| matches!(e, DispatchEvent::WorkerStarted { .. }))
        .count();
    assert_eq!(started, 3);
}

#[tokio::test(start_paused = true)]
async fn stop_with_no_requests_reports_no_data() {
    let balancer = LoadBalancer::start(DispatchConfig::new(1, 4, 10, 2)).unwrap();

    let report = balancer.stop().await.unwrap();
    assert_eq!(report.final_queue_size, 0);
    assert_eq!(report.min_service_time, None);
    assert_eq!(report.max_service_time, None);
    assert_eq!(report.accepted, 0);
    assert_eq!(report.processed, 0);
    assert_eq!(report.stop_reason, StopReason::Requested);
    assert!(report.to_string().contains("no data observed"));
}

#[tokio::test(start_paused = true)]
async fn stop_is_idempotent() {
    let (sink, events) = recorder();
    let balancer =
        LoadBalancer::start_with_events(DispatchConfig::new(2, 4, 10, 2), sink).unwrap();
    balancer.submit(burst(6, 30)).await;

    let first = balancer.stop().await.unwrap();
    let second = balancer.stop().await.unwrap();
    assert_eq!(first, second);

    let stopped = events
        .lock()
        .unwrap()
        .iter()
        .filter(|e| matches!(e, DispatchEvent::Stopped { .. }))
        .count();
    assert_eq!(stopped, 1);
}

#[tokio::test(start_paused = true)]
async fn submissions_after_stop_are_rejected() {
    let (sink, events) = recorder();
    let balancer =
        LoadBalancer::start_with_events(DispatchConfig::new(1, 2, 10, 2), sink).unwrap();
    balancer.stop().await.unwrap();
    assert!(!balancer.is_running().await);

    let outcome = balancer.submit(burst(5, 10)).await;
    assert_eq!(outcome, Submission { accepted: 0, rejected: 5 });
    assert_eq!(balancer.queue_len().await, 0);
    assert!(
        events
            .lock()
            .unwrap()
            .contains(&DispatchEvent::Rejected { count: 5 })
    );
}

#[tokio::test(start_paused = true)]
async fn submissions_during_drain_are_rejected() {
    let config = DispatchConfig::new(1, 1, 10, 0);
    let balancer = LoadBalancer::start(config).unwrap();
    balancer.submit(burst(5, 100)).await;

    // Workers need 500 ms for the backlog, so the stop is still in
    // progress when the late submission arrives.
    let (report, late) = tokio::join!(balancer.stop(), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        balancer.submit(burst(3, 10)).await
    });
    let report = report.unwrap();

    assert_eq!(late, Submission { accepted: 0, rejected: 3 });
    assert_eq!(report.accepted, 5);
    assert_eq!(report.rejected, 3);
    assert_eq!(report.dispatched, 5);
    assert_eq!(report.final_queue_size, 0);
    assert_eq!(report.service_time_range(), Some((100, 100)));
}

#[tokio::test(start_paused = true)]
async fn graceful_stop_drains_a_large_backlog() {
    let balancer = LoadBalancer::start(DispatchConfig::new(1, 2, 50, 10)).unwrap();
    balancer.submit(burst(100, 10)).await;

    let report = balancer.stop().await.unwrap();
    assert_eq!(report.final_queue_size, 0);
    assert_eq!(report.dispatched, 100);
    assert_eq!(balancer.queue_len().await, 0);
    assert_eq!(balancer.pool_size().await, 0);
}

#[tokio::test(start_paused = true)]
async fn zero_grace_abandons_worker_backlog_at_teardown() {
    let config = DispatchConfig::new(1, 1, 10, 0).with_teardown_grace(Duration::ZERO);
    let balancer = LoadBalancer::start(config).unwrap();
    balancer.submit(burst(3, 100)).await;

    let report = balancer.stop().await.unwrap();
    assert_eq!(report.final_queue_size, 0);
    assert_eq!(report.dispatched, 3);
    assert!(report.abandoned >= 2);
    assert_eq!(report.processed + report.abandoned, 3);
}

#[tokio::test(start_paused = true)]
async fn run_for_stops_at_deadline_and_drains() {
    let (sink, events) = recorder();
    let config = DispatchConfig::new(1, 4, 4, 1);
    let balancer = LoadBalancer::start_with_events(config, sink).unwrap();

    let producer = FixedProducer {
        interval: Duration::from_millis(100),
        batch: 3,
        service_time_ms: 40,
    };
    let report = balancer
        .run_for(RunBudget::Cycles(1000), producer)
        .await
        .unwrap();

    assert_eq!(report.stop_reason, StopReason::Deadline);
    assert_eq!(report.final_queue_size, 0);
    assert_eq!(report.rejected, 0);
    assert_eq!(report.accepted % 3, 0);
    assert!((24..=30).contains(&report.accepted));
    assert_eq!(report.dispatched, report.accepted);
    assert_eq!(report.processed + report.abandoned, report.accepted);

    assert_resize_invariants(&passes(&events), 1, 4);

    // A later graceful stop is a no-op returning the same report.
    assert_eq!(balancer.stop().await.unwrap(), report);
}

struct ZeroIntervalProducer;

impl Producer for ZeroIntervalProducer {
    fn interval(&self) -> Duration {
        Duration::ZERO
    }

    fn next_batch(&mut self) -> Vec<Request> {
        burst(1, 10)
    }
}

#[tokio::test(start_paused = true)]
async fn run_for_rejects_zero_interval_producer() {
    let balancer = LoadBalancer::start(DispatchConfig::new(1, 2, 10, 2)).unwrap();

    let result = balancer
        .run_for(RunBudget::Cycles(10), ZeroIntervalProducer)
        .await;
    assert!(matches!(result, Err(DispatchError::ZeroInterval)));

    // Nothing was admitted and the balancer is still usable.
    assert!(balancer.is_running().await);
    assert_eq!(balancer.queue_len().await, 0);
    let report = balancer.stop().await.unwrap();
    assert_eq!(report.accepted, 0);
    assert_eq!(report.stop_reason, StopReason::Requested);
}

#[test]
fn invalid_config_fails_fast() {
    assert!(matches!(
        LoadBalancer::start(DispatchConfig::new(0, 3, 10, 2)),
        Err(ConfigError::MinServersZero)
    ));
    assert!(matches!(
        LoadBalancer::start(DispatchConfig::new(4, 3, 10, 2)),
        Err(ConfigError::MaxBelowMin { .. })
    ));
    assert!(matches!(
        LoadBalancer::start(DispatchConfig::new(1, 3, 2, 10)),
        Err(ConfigError::ThresholdsInverted { .. })
    ));
}
