//! Simulation clock implementing FusionContext for deterministic runs.

use async_trait::async_trait;
use pelorus_env::FusionContext;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Virtual clock context.
///
/// Time only moves when a scenario advances it, so every run of a scenario
/// with the same seed sees identical timestamps. `sleep` advances the clock
/// instead of waiting, which lets the orchestrator's fixed-rate loop run as
/// fast as the host allows.
pub struct SimClock {
    seed: u64,
    virtual_ns: Arc<Mutex<u64>>,
    /// Virtual time 0 maps to this wall-clock instant
    epoch: SystemTime,
}

impl SimClock {
    /// Creates a clock at virtual time zero over the fixed epoch
    /// (2024-01-01 00:00:00 UTC).
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            virtual_ns: Arc::new(Mutex::new(0)),
            epoch: UNIX_EPOCH + Duration::from_secs(1_704_067_200),
        }
    }

    /// Creates an Arc-wrapped clock for sharing with the orchestrator.
    pub fn shared(seed: u64) -> Arc<Self> {
        Arc::new(Self::new(seed))
    }

    /// Advances virtual time.
    pub fn advance(&self, duration: Duration) {
        let mut ns = self.virtual_ns.lock().unwrap();
        *ns += duration.as_nanos() as u64;
    }
}

#[async_trait]
impl FusionContext for SimClock {
    fn now(&self) -> Duration {
        Duration::from_nanos(*self.virtual_ns.lock().unwrap())
    }

    fn system_time(&self) -> SystemTime {
        self.epoch + self.now()
    }

    async fn sleep(&self, duration: Duration) {
        // Advance instead of waiting, yielding so spawned tasks make
        // progress between cycles.
        self.advance(duration);
        tokio::task::yield_now().await;
    }

    fn spawn<F>(&self, name: &str, future: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let _name = name.to_string();
        tokio::spawn(future);
    }

    fn seed(&self) -> u64 {
        self.seed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_starts_at_epoch() {
        let clock = SimClock::new(42);
        assert_eq!(clock.now(), Duration::ZERO);
        assert_eq!(clock.unix_secs(), 1_704_067_200.0);
    }

    #[test]
    fn test_advance_moves_both_scales() {
        let clock = SimClock::new(42);
        clock.advance(Duration::from_millis(1500));
        assert_eq!(clock.now(), Duration::from_millis(1500));
        assert_eq!(clock.unix_secs(), 1_704_067_201.5);
    }

    #[tokio::test]
    async fn test_sleep_advances_virtual_time() {
        let clock = SimClock::new(42);
        clock.sleep(Duration::from_secs(5)).await;
        assert_eq!(clock.now(), Duration::from_secs(5));
    }
}
