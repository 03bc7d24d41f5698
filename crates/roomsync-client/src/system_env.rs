//! Production environment using the tokio clock.
//!
//! Instants come from `tokio::time::Instant`, so a test runtime started with
//! a paused clock drives the same code deterministically.

use std::time::Duration;

use roomsync_core::Environment;

/// Production environment.
///
/// Monotonic time and sleeping come from tokio; wall-clock time from the
/// system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Create a new system environment.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    type Instant = tokio::time::Instant;

    fn now(&self) -> Self::Instant {
        tokio::time::Instant::now()
    }

    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }

    fn wall_clock_millis(&self) -> u64 {
        // A clock before 1970 records as 0; the value only labels cache records.
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map_or(0, |elapsed| elapsed.as_millis() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn sleep_advances_paused_clock() {
        let env = SystemEnv::new();
        let start = env.now();
        env.sleep(Duration::from_secs(2)).await;
        assert!(env.now() - start >= Duration::from_secs(2));
    }

    #[test]
    fn wall_clock_is_after_2020() {
        assert!(SystemEnv::new().wall_clock_millis() > 1_577_836_800_000);
    }
}
