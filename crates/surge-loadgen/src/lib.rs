//! surge-loadgen — synthetic request traffic for simulated runs.
//!
//! Every tick the generator emits a batch of `min_batch..=max_batch`
//! requests between random IPv4 addresses, each with a service time drawn
//! from `[min_service_time_ms, max_service_time_ms)`.
//!
//! A fixed `seed` makes the generated traffic reproducible.

use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use surge_core::{ConfigResult, LoadConfig, Request};
use surge_dispatch::Producer;

/// Random request producer driven by a [`LoadConfig`].
pub struct LoadGenerator {
    config: LoadConfig,
    rng: StdRng,
    batches: u64,
}

impl LoadGenerator {
    /// Validate `config` and seed the RNG, from `config.seed` when set and
    /// from the OS otherwise.
    pub fn new(config: LoadConfig) -> ConfigResult<Self> {
        config.validate()?;
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Ok(Self {
            config,
            rng,
            batches: 0,
        })
    }

    /// Number of batches generated so far.
    pub fn batches(&self) -> u64 {
        self.batches
    }

    /// A random dotted-quad IPv4 address.
    pub fn random_ip(&mut self) -> String {
        let [a, b, c, d]: [u8; 4] = self.rng.random();
        format!("{a}.{b}.{c}.{d}")
    }

    /// One request with random endpoints and service time.
    pub fn request(&mut self) -> Request {
        let origin = self.random_ip();
        let destination = self.random_ip();
        let service_time_ms = self
            .rng
            .random_range(self.config.min_service_time_ms..self.config.max_service_time_ms);
        Request::new(origin, destination, service_time_ms)
    }

    /// One batch of requests.
    pub fn batch(&mut self) -> Vec<Request> {
        let size = self
            .rng
            .random_range(self.config.min_batch..=self.config.max_batch);
        let batch: Vec<Request> = (0..size).map(|_| self.request()).collect();
        self.batches += 1;
        debug!(batch = self.batches, size, "generated requests");
        batch
    }
}

impl Producer for LoadGenerator {
    fn interval(&self) -> Duration {
        self.config.interval()
    }

    fn next_batch(&mut self) -> Vec<Request> {
        self.batch()
    }
}
