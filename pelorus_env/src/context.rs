//! Core environment context trait for the fusion process.

use async_trait::async_trait;
use std::future::Future;
use std::time::{Duration, SystemTime};

/// The central interface for environment interaction.
///
/// This trait abstracts the "real world" so that the fusion engines can run
/// in both production (tokio) and simulation (virtual clock) environments.
///
/// # Implementations
///
/// - **Production**: `TokioContext` wraps `tokio::time` and the system clock
/// - **Simulation**: `SimClock` (in `pelorus_sim`) is a manually advanced
///   virtual clock over a fixed epoch
///
/// # Determinism
///
/// All methods that would normally introduce non-determinism (time) are
/// controlled by the implementation, so any scenario is reproducible from
/// its seed.
#[async_trait]
pub trait FusionContext: Send + Sync + 'static {
    /// Returns the current monotonic time since context creation.
    ///
    /// Used for cycle pacing and latency measurement. In simulation this is
    /// the virtual clock time.
    fn now(&self) -> Duration;

    /// Returns the wall-clock time used for detection and track timestamps.
    ///
    /// In simulation this is derived from virtual clock + epoch offset.
    fn system_time(&self) -> SystemTime;

    /// Returns the wall-clock time as unix seconds.
    ///
    /// All track bookkeeping (aging, AIS gaps, coasting inflation) runs on
    /// this scale.
    fn unix_secs(&self) -> f64 {
        self.system_time()
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0)
    }

    /// Suspends execution for the given duration.
    ///
    /// In production: wraps `tokio::time::sleep`.
    /// In simulation: advances the virtual clock.
    async fn sleep(&self, duration: Duration);

    /// Spawns a background task (e.g. the output publisher).
    fn spawn<F>(&self, name: &str, future: F)
    where
        F: Future<Output = ()> + Send + 'static;

    /// Returns the context's seed (for logging/debugging).
    ///
    /// In production, returns 0 (not seeded). In simulation, returns the
    /// master seed.
    fn seed(&self) -> u64;
}
