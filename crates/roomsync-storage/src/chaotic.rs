//! Fault-injecting backend wrapper for chaos testing.
//!
//! Delegates to an inner backend but fails a configurable fraction of
//! operations, so that loaders and caches can be checked for graceful
//! degradation.

#![allow(clippy::disallowed_types, reason = "Locking simple RNG state")]

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};

use roomsync_proto::CollectionKey;

use super::{CacheBackend, StorageError};

/// Backend wrapper that randomly fails operations.
///
/// Failures are drawn from a seeded generator shared by all clones, so a run
/// with the same seed and the same operation order fails the same operations.
#[derive(Clone)]
pub struct ChaoticBackend<B: CacheBackend> {
    inner: B,
    /// Failure rate (0.0 = never fail, 1.0 = always fail)
    failure_rate: f64,
    rng: Arc<Mutex<ChaoticRng>>,
    operations: Arc<AtomicUsize>,
    failures: Arc<AtomicUsize>,
}

/// Linear congruential generator. Fast and reproducible, not random.
struct ChaoticRng {
    state: u64,
}

impl ChaoticRng {
    fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    /// Next value in [0.0, 1.0)
    #[allow(clippy::cast_precision_loss)]
    fn next(&mut self) -> f64 {
        // LCG constants from Numerical Recipes
        const A: u64 = 1_664_525;
        const C: u64 = 1_013_904_223;
        const M: u64 = 1u64 << 32;

        self.state = (A.wrapping_mul(self.state).wrapping_add(C)) % M;
        (self.state as f64) / (M as f64)
    }
}

impl<B: CacheBackend> ChaoticBackend<B> {
    /// Wrap `inner` with the default seed.
    ///
    /// # Errors
    ///
    /// `StorageError::Io` if `failure_rate` is outside [0.0, 1.0].
    pub fn new(inner: B, failure_rate: f64) -> Result<Self, StorageError> {
        Self::with_seed(inner, failure_rate, 0x1234_5678_9ABC_DEF0)
    }

    /// Wrap `inner` with an explicit seed for reproducible chaos.
    ///
    /// # Errors
    ///
    /// `StorageError::Io` if `failure_rate` is outside [0.0, 1.0].
    pub fn with_seed(inner: B, failure_rate: f64, seed: u64) -> Result<Self, StorageError> {
        if !(0.0..=1.0).contains(&failure_rate) {
            return Err(StorageError::Io(format!(
                "failure_rate must be between 0.0 and 1.0, got {failure_rate}"
            )));
        }

        Ok(Self {
            inner,
            failure_rate,
            rng: Arc::new(Mutex::new(ChaoticRng::new(seed))),
            operations: Arc::new(AtomicUsize::new(0)),
            failures: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Underlying backend, for checking state after chaos.
    pub fn inner(&self) -> &B {
        &self.inner
    }

    /// Operations attempted through this wrapper.
    pub fn operation_count(&self) -> usize {
        self.operations.load(Ordering::Relaxed)
    }

    /// Operations that were failed on purpose.
    pub fn failure_count(&self) -> usize {
        self.failures.load(Ordering::Relaxed)
    }

    fn inject(&self) -> Result<(), StorageError> {
        self.operations.fetch_add(1, Ordering::Relaxed);

        // A poisoned generator fails every operation.
        let fail = self.rng.lock().map_or(true, |mut rng| rng.next() < self.failure_rate);
        if fail {
            self.failures.fetch_add(1, Ordering::Relaxed);
            return Err(StorageError::Io("chaotic failure injection".to_string()));
        }
        Ok(())
    }
}

impl<B: CacheBackend> CacheBackend for ChaoticBackend<B> {
    fn load(&self, key: &CollectionKey) -> Result<Option<Vec<u8>>, StorageError> {
        self.inject()?;
        self.inner.load(key)
    }

    fn store(&self, key: &CollectionKey, bytes: &[u8]) -> Result<(), StorageError> {
        self.inject()?;
        self.inner.store(key, bytes)
    }

    fn remove(&self, key: &CollectionKey) -> Result<(), StorageError> {
        self.inject()?;
        self.inner.remove(key)
    }

    fn keys(&self) -> Result<Vec<CollectionKey>, StorageError> {
        self.inject()?;
        self.inner.keys()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryBackend;

    #[test]
    fn zero_rate_never_fails() {
        let backend = ChaoticBackend::new(MemoryBackend::new(), 0.0).unwrap();
        for _ in 0..100 {
            backend.store(&CollectionKey::rooms(), b"x").unwrap();
        }
        assert_eq!(backend.operation_count(), 100);
        assert_eq!(backend.failure_count(), 0);
    }

    #[test]
    fn full_rate_always_fails() {
        let backend = ChaoticBackend::new(MemoryBackend::new(), 1.0).unwrap();
        assert!(backend.load(&CollectionKey::rooms()).is_err());
        assert!(backend.inner().is_empty());
    }

    #[test]
    fn same_seed_same_failures() {
        let run = |seed| {
            let backend = ChaoticBackend::with_seed(MemoryBackend::new(), 0.5, seed).unwrap();
            (0..64).map(|_| backend.load(&CollectionKey::rooms()).is_err()).collect::<Vec<_>>()
        };
        assert_eq!(run(7), run(7));
    }

    #[test]
    fn invalid_rate_rejected() {
        assert!(ChaoticBackend::new(MemoryBackend::new(), 1.5).is_err());
    }
}
