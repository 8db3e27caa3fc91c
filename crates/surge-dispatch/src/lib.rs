//! surge-dispatch — the autoscaling dispatch engine.
//!
//! A bounded pool of workers fed from a shared admission queue. The pool
//! grows and shrinks one worker at a time as queue depth crosses two
//! thresholds. The engine provides:
//!
//! - **Admission**: a FIFO queue with running service-time statistics
//! - **Workers**: one tokio task per worker, each with a private FIFO
//! - **Autoscaling**: a per-pass threshold policy bounded by
//!   `min_servers..=max_servers`
//! - **Dispatch**: strict round-robin, one request per worker per pass
//! - **Lifecycle**: graceful and deadline-driven stops that always drain
//!   the admission queue before halting
//!
//! # Architecture
//!
//! ```text
//! LoadBalancer (lifecycle controller)
//!   ├── Shared
//!   │   ├── Mutex<DispatchState>      (coarse lock)
//!   │   │   ├── AdmissionQueue        (FIFO + ServiceTimeStats)
//!   │   │   └── WorkerPool            (Vec<Worker>, newest last)
//!   │   ├── Notify                    (submit / stop wake-ups)
//!   │   └── Autoscaler                (Grow / Shrink / Hold)
//!   ├── dispatcher task               (Idle → Draining → Stopped)
//!   └── Worker tasks                  (private mpsc queue, watch stop flag)
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use surge_core::{DispatchConfig, Request};
//! use surge_dispatch::LoadBalancer;
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let balancer = LoadBalancer::start(DispatchConfig::new(2, 5, 10, 2))?;
//! balancer
//!     .submit((0..20).map(|_| Request::new("10.0.0.1", "10.0.0.2", 50)))
//!     .await;
//! let report = balancer.stop().await?;
//! assert_eq!(report.final_queue_size, 0);
//! # Ok(())
//! # }
//! ```

pub mod autoscaler;
pub mod balancer;
pub mod dispatcher;
pub mod error;
pub mod event;
pub mod pool;
pub mod producer;
pub mod queue;
pub mod report;
pub mod worker;

pub use autoscaler::{Autoscaler, ScaleDecision};
pub use balancer::LoadBalancer;
pub use dispatcher::DispatcherPhase;
pub use error::{DispatchError, DispatchResult};
pub use event::{DispatchEvent, EventSink};
pub use pool::WorkerPool;
pub use producer::{Producer, RunBudget};
pub use queue::{AdmissionQueue, ServiceTimeStats};
pub use report::{FinalReport, StopReason, Submission};
pub use worker::{WorkTally, Worker, WorkerSnapshot, WorkerState};
