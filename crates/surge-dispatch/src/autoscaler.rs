//! Autoscaler — threshold-driven pool resizing.
//!
//! Evaluated once per dispatcher pass with the current queue depth and
//! pool size. Emits at most one single-step decision; the dispatcher
//! applies it to the pool.
//!
//! ```text
//! if depth > threshold_high and pool < max_servers: Grow   (+1 worker)
//! if depth < threshold_low  and pool > min_servers: Shrink (-1, newest)
//! otherwise:                                        Hold
//! ```
//!
//! With `threshold_low <= threshold_high` (enforced by config validation)
//! the two rules can never both fire for the same depth.

use serde::Serialize;
use tracing::debug;

use surge_core::DispatchConfig;

/// A resize decision for one dispatcher pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScaleDecision {
    /// Add exactly one worker.
    Grow,
    /// Remove the most recently added worker.
    Shrink,
    /// No change needed.
    Hold,
}

/// Threshold policy with the pool floor and ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Autoscaler {
    min_servers: usize,
    max_servers: usize,
    threshold_high: usize,
    threshold_low: usize,
}

impl Autoscaler {
    /// Build the policy from a config that has already been validated.
    pub fn new(config: &DispatchConfig) -> Self {
        Self {
            min_servers: config.min_servers,
            max_servers: config.max_servers,
            threshold_high: config.threshold_high,
            threshold_low: config.threshold_low,
        }
    }

    /// Decide whether the pool should change for this pass.
    pub fn evaluate(&self, queue_depth: usize, pool_size: usize) -> ScaleDecision {
        if queue_depth > self.threshold_high && pool_size < self.max_servers {
            debug!(
                queue_depth,
                pool_size,
                threshold_high = self.threshold_high,
                "queue above high threshold, growing pool"
            );
            return ScaleDecision::Grow;
        }

        if queue_depth < self.threshold_low && pool_size > self.min_servers {
            debug!(
                queue_depth,
                pool_size,
                threshold_low = self.threshold_low,
                "queue below low threshold, shrinking pool"
            );
            return ScaleDecision::Shrink;
        }

        ScaleDecision::Hold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scaler(min: usize, max: usize, high: usize, low: usize) -> Autoscaler {
        Autoscaler::new(&DispatchConfig::new(min, max, high, low))
    }

    fn next_size(decision: ScaleDecision, pool_size: usize) -> usize {
        match decision {
            ScaleDecision::Grow => pool_size + 1,
            ScaleDecision::Shrink => pool_size.saturating_sub(1),
            ScaleDecision::Hold => pool_size,
        }
    }

    #[test]
    fn grow_when_above_high_threshold() {
        let s = scaler(2, 5, 10, 2);
        assert_eq!(s.evaluate(11, 2), ScaleDecision::Grow);
    }

    #[test]
    fn threshold_is_strict() {
        let s = scaler(2, 5, 10, 2);
        assert_eq!(s.evaluate(10, 2), ScaleDecision::Hold);
        assert_eq!(s.evaluate(2, 3), ScaleDecision::Hold);
    }

    #[test]
    fn respects_max_servers() {
        let s = scaler(2, 5, 10, 2);
        assert_eq!(s.evaluate(1_000, 5), ScaleDecision::Hold);
    }

    #[test]
    fn shrink_when_below_low_threshold() {
        let s = scaler(2, 5, 10, 2);
        assert_eq!(s.evaluate(1, 4), ScaleDecision::Shrink);
        assert_eq!(s.evaluate(0, 3), ScaleDecision::Shrink);
    }

    #[test]
    fn respects_min_servers() {
        let s = scaler(2, 5, 10, 2);
        assert_eq!(s.evaluate(0, 2), ScaleDecision::Hold);
    }

    #[test]
    fn fixed_pool_never_resizes() {
        let s = scaler(3, 3, 10, 2);
        for depth in [0, 1, 2, 5, 10, 11, 500] {
            assert_eq!(s.evaluate(depth, 3), ScaleDecision::Hold, "depth {depth}");
        }
    }

    #[test]
    fn no_change_between_thresholds() {
        let s = scaler(1, 10, 20, 5);
        for depth in 5..=20 {
            assert_eq!(s.evaluate(depth, 4), ScaleDecision::Hold);
        }
    }

    #[test]
    fn decisions_stay_within_bounds() {
        let s = scaler(2, 6, 8, 3);
        for depth in 0..30 {
            for pool in 2..=6 {
                let next = next_size(s.evaluate(depth, pool), pool);
                assert!((2..=6).contains(&next), "depth {depth} pool {pool} -> {next}");
                assert!(next.abs_diff(pool) <= 1);
            }
        }
    }

    #[test]
    fn equal_thresholds_are_mutually_exclusive() {
        let s = scaler(1, 10, 4, 4);
        assert_eq!(s.evaluate(5, 3), ScaleDecision::Grow);
        assert_eq!(s.evaluate(4, 3), ScaleDecision::Hold);
        assert_eq!(s.evaluate(3, 3), ScaleDecision::Shrink);
    }

    #[test]
    fn empty_pool_never_shrinks() {
        let s = scaler(1, 4, 10, 2);
        assert_eq!(s.evaluate(0, 0), ScaleDecision::Hold);
        assert_eq!(next_size(ScaleDecision::Shrink, 0), 0);
    }
}
