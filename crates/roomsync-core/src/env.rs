//! Environment abstraction for deterministic testing.
//!
//! Decouples synchronization logic from system time. Enables deterministic
//! simulation (virtual clock) and production use with real time.

use std::time::Duration;

/// Abstract environment providing time and async sleeping.
///
/// Implementations MUST guarantee that `now()` never goes backwards.
pub trait Environment: Clone + Send + Sync + 'static {
    /// The specific instant type used by this environment.
    ///
    /// Both the production and the simulated environment use
    /// `tokio::time::Instant`; engine-level tests may use any ordered type.
    type Instant: Copy + Ord + Send + Sync + std::fmt::Debug + std::ops::Sub<Output = Duration>;

    /// Current time (monotonic).
    ///
    /// # Invariants
    ///
    /// - Subsequent calls return times >= previous calls.
    fn now(&self) -> Self::Instant;

    /// Sleeps for the specified duration.
    ///
    /// Only driver code sleeps; state machines take `now` as an argument.
    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send;

    /// Wall-clock time in Unix milliseconds.
    ///
    /// Used for cache record timestamps only, never for ordering decisions.
    fn wall_clock_millis(&self) -> u64;
}
