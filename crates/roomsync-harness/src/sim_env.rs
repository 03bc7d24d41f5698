//! Simulated environment.
//!
//! Time comes from tokio's clock, which tests pause (`start_paused`) so that
//! sleeps complete instantly and in a deterministic order. Randomness comes
//! from a seeded ChaCha generator shared by every clone.

#![allow(clippy::disallowed_types, reason = "synchronous RNG access, never held across await")]

use std::{
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use roomsync_core::Environment;
use tokio::time::Instant;

/// Wall clock reading at simulation start: 2024-01-01T00:00:00Z.
const WALL_ORIGIN_MS: u64 = 1_704_067_200_000;

/// Deterministic environment for simulation.
#[derive(Clone)]
pub struct SimEnv {
    rng: Arc<Mutex<ChaCha8Rng>>,
    origin: Instant,
    seed: u64,
}

impl std::fmt::Debug for SimEnv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimEnv").field("seed", &self.seed).finish_non_exhaustive()
    }
}

impl Default for SimEnv {
    fn default() -> Self {
        Self::new()
    }
}

impl SimEnv {
    /// Environment seeded with 0.
    pub fn new() -> Self {
        Self::with_seed(0)
    }

    /// Environment with a specific RNG seed.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: Arc::new(Mutex::new(ChaCha8Rng::seed_from_u64(seed))),
            origin: Instant::now(),
            seed,
        }
    }

    /// Seed this environment was created with.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Next random `u64`.
    pub fn random_u64(&self) -> u64 {
        self.rng.lock().unwrap_or_else(PoisonError::into_inner).next_u64()
    }

    /// Random value in `0..bound`. Returns 0 for a zero bound.
    pub fn random_below(&self, bound: u64) -> u64 {
        if bound == 0 {
            return 0;
        }
        self.rng.lock().unwrap_or_else(PoisonError::into_inner).gen_range(0..bound)
    }

    /// True with probability `p`, clamped to `[0, 1]`.
    pub fn chance(&self, p: f64) -> bool {
        self.rng.lock().unwrap_or_else(PoisonError::into_inner).gen_bool(p.clamp(0.0, 1.0))
    }

    /// Virtual time elapsed since creation.
    pub fn elapsed(&self) -> Duration {
        Instant::now() - self.origin
    }
}

impl Environment for SimEnv {
    type Instant = Instant;

    fn now(&self) -> Self::Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }

    fn wall_clock_millis(&self) -> u64 {
        WALL_ORIGIN_MS + u64::try_from(self.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}
