//! Core environment context trait for the Neo-Miami drivers.

use async_trait::async_trait;
use rand_chacha::ChaCha8Rng;
use std::future::Future;
use std::time::{Duration, SystemTime};
use tokio::task::JoinHandle;

/// The central interface for environment interaction.
///
/// This trait abstracts the "real world" so that the tick timer and the
/// frame loop can run in both live and simulated environments.
///
/// # Implementations
///
/// - **Live**: `TokioContext` - wraps `tokio::time`, OS entropy
/// - **Simulation**: `SimContext` - virtual clock, `ChaCha8Rng(seed)`
///
/// # Determinism
///
/// For recorded runs, all methods that would normally introduce
/// non-determinism (time, randomness) are controlled by the implementation.
#[async_trait]
pub trait TwinContext: Send + Sync + 'static {
    /// Returns the current monotonic time since context creation.
    ///
    /// The frame loop measures elapsed animation time against this clock.
    fn now(&self) -> Duration;

    /// Returns the wall-clock time, used to stamp recordings.
    fn system_time(&self) -> SystemTime;

    /// Suspends execution for the given duration.
    ///
    /// Live: wraps `tokio::time::sleep`
    /// Simulation: advances the virtual clock
    async fn sleep(&self, duration: Duration);

    /// Spawns a background task and returns its handle.
    fn spawn<F>(&self, name: &str, future: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static;

    /// Derives a random stream for one subsystem.
    ///
    /// In simulation the stream combines the global seed with `stream` so the
    /// telemetry draws and the scene layout never share entropy. Live
    /// contexts return an entropy-seeded generator.
    fn derive_rng(&self, stream: u64) -> ChaCha8Rng;

    /// Returns the context's seed (for logging/debugging).
    ///
    /// Live contexts return 0 (not seeded).
    fn seed(&self) -> u64;
}
