//! Twin Runtime - drives the simulator and the animators from a context.
//!
//! Two independent periodic drivers, each confined to its own task:
//!
//! ```text
//! ┌──────────────────────────┐        ┌──────────────────────────┐
//! │   telemetry driver       │        │   frame driver           │
//! │   sleep(3200ms) → tick   │        │   sleep(1/fps) → step(t) │
//! │   owns TelemetrySimulator│        │   owns the Animator      │
//! └────────────┬─────────────┘        └────────────┬─────────────┘
//!              │ Arc<Snapshot>                     │ FrameSample
//!              ▼                                   ▼
//!        ┌─────────────────────────────────────────────────┐
//!        │         presentation (TUI / recorder)           │
//!        └─────────────────────────────────────────────────┘
//! ```
//!
//! A driver re-arms its sleep only after the previous tick or frame has been
//! published, so iterations never overlap. Cancelling a [`DriverHandle`]
//! works exactly once, is legal before the first fire, and happens
//! implicitly on drop.

use crossbeam::channel::Sender;
use neomiami_env::{EnvError, TwinContext, Viewport};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, info, warn};

use crate::animator::{Animator, FrameSample};
use crate::telemetry::{Snapshot, TelemetrySimulator};

/// Highest refresh rate a frame driver runs at.
pub const MAX_FPS: u32 = 1000;

/// Configuration for the frame driver.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Target frames per second
    pub fps: u32,

    /// Publish a sample every N frames (0 = never publish)
    pub publish_every: u64,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            fps: 60,
            publish_every: 1,
        }
    }
}

impl FrameConfig {
    /// Time between frames; `fps` is clamped to `1..=MAX_FPS`.
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.fps.clamp(1, MAX_FPS) as f64)
    }
}

/// Handle to a running driver task.
pub struct DriverHandle {
    name: &'static str,
    cancel_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl DriverHandle {
    fn new(name: &'static str, cancel_tx: oneshot::Sender<()>, task: JoinHandle<()>) -> Self {
        Self {
            name,
            cancel_tx: Some(cancel_tx),
            task: Some(task),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Signals the driver to stop.
    ///
    /// Returns `true` the first time, `false` on every later call.
    pub fn cancel(&mut self) -> bool {
        match self.cancel_tx.take() {
            Some(tx) => {
                // The task may already have exited; that is fine.
                let _ = tx.send(());
                debug!(driver = self.name, "driver cancelled");
                true
            }
            None => false,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel_tx.is_none()
    }

    /// Cancels (if still running) and waits for the task to finish its
    /// cleanup.
    pub async fn join(mut self) -> Result<(), JoinError> {
        self.cancel();
        match self.task.take() {
            Some(task) => task.await,
            None => Ok(()),
        }
    }
}

impl Drop for DriverHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Starts the telemetry driver.
///
/// The initial snapshot is published immediately, then one snapshot per
/// `period`. The driver stops on cancel or when the receiver hangs up.
pub fn spawn_telemetry<Ctx: TwinContext>(
    ctx: Arc<Ctx>,
    mut simulator: TelemetrySimulator,
    period: Duration,
    tx: Sender<Arc<Snapshot>>,
) -> DriverHandle {
    let (cancel_tx, mut cancel_rx) = oneshot::channel::<()>();
    let task_ctx = Arc::clone(&ctx);

    let task = ctx.spawn("telemetry", async move {
        info!(period_ms = period.as_millis() as u64, "telemetry driver started");

        if tx.send(Arc::new(simulator.snapshot().clone())).is_err() {
            debug!("telemetry receiver gone before first publish");
            return;
        }

        loop {
            tokio::select! {
                biased;
                _ = &mut cancel_rx => break,
                _ = task_ctx.sleep(period) => {}
            }

            let snapshot = Arc::new(simulator.tick().clone());
            if tx.send(snapshot).is_err() {
                debug!("telemetry receiver hung up");
                break;
            }
        }

        info!(ticks = simulator.tick_count(), "telemetry driver stopped");
    });

    DriverHandle::new("telemetry", cancel_tx, task)
}

/// Handle to a running frame driver; also forwards resize events.
pub struct FrameDriverHandle {
    inner: DriverHandle,
    resize_tx: mpsc::UnboundedSender<Viewport>,
}

impl FrameDriverHandle {
    /// Queues a resize for the next frame.
    ///
    /// Zero dimensions are rejected here, before reaching the scene.
    pub fn resize(&self, width: u32, height: u32) -> Result<(), EnvError> {
        let viewport = Viewport::new(width, height)?;
        self.resize_tx
            .send(viewport)
            .map_err(|_| EnvError::ContextError("frame driver has stopped".to_string()))
    }

    pub fn cancel(&mut self) -> bool {
        self.inner.cancel()
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.is_cancelled()
    }

    pub async fn join(self) -> Result<(), JoinError> {
        self.inner.join().await
    }
}

/// Starts the frame driver.
///
/// The animator is stepped once at `t = 0`, then every frame interval with
/// the time elapsed since the driver started. On exit, for whatever reason,
/// the animator is torn down inside the task.
pub fn spawn_frames<Ctx, A>(
    ctx: Arc<Ctx>,
    mut animator: A,
    config: FrameConfig,
    tx: Sender<FrameSample>,
) -> FrameDriverHandle
where
    Ctx: TwinContext,
    A: Animator,
{
    let (cancel_tx, mut cancel_rx) = oneshot::channel::<()>();
    let (resize_tx, mut resize_rx) = mpsc::unbounded_channel::<Viewport>();
    let task_ctx = Arc::clone(&ctx);
    let interval = config.frame_interval();

    let task = ctx.spawn("frames", async move {
        info!(fps = config.fps, "frame driver started");
        let started = task_ctx.now();
        let mut frames: u64 = 0;
        let mut elapsed = Duration::ZERO;

        loop {
            while let Ok(viewport) = resize_rx.try_recv() {
                if let Err(e) = animator.on_resize(viewport.width(), viewport.height()) {
                    warn!("resize to {} rejected: {}", viewport, e);
                }
            }

            animator.step(elapsed.as_secs_f64());
            frames += 1;

            if config.publish_every > 0
                && frames % config.publish_every == 0
                && tx.send(animator.sample()).is_err()
            {
                debug!("frame receiver hung up");
                break;
            }

            tokio::select! {
                biased;
                _ = &mut cancel_rx => break,
                _ = task_ctx.sleep(interval) => {}
            }
            elapsed = task_ctx.now().saturating_sub(started);
        }

        let released = animator.teardown();
        info!(frames, released, "frame driver stopped");
    });

    FrameDriverHandle {
        inner: DriverHandle::new("frames", cancel_tx, task),
        resize_tx,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{SceneConfig, SceneState};
    use neomiami_env::{HeadlessBackend, TokioContext};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    const WAIT: Duration = Duration::from_secs(5);

    #[test]
    fn test_frame_config_interval() {
        let config = FrameConfig::default();
        assert_eq!(config.frame_interval(), Duration::from_secs_f64(1.0 / 60.0));

        let zero = FrameConfig { fps: 0, publish_every: 1 };
        assert_eq!(zero.frame_interval(), Duration::from_secs(1));

        let huge = FrameConfig { fps: u32::MAX, publish_every: 1 };
        assert_eq!(huge.frame_interval(), Duration::from_millis(1));
        assert!(huge.frame_interval() > Duration::ZERO);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_telemetry_driver_publishes_and_cancels() {
        let ctx = TokioContext::shared();
        let (tx, rx) = crossbeam::channel::unbounded();
        let mut handle = spawn_telemetry(
            ctx,
            TelemetrySimulator::new(42),
            Duration::from_millis(5),
            tx,
        );

        let first = rx.recv_timeout(WAIT).unwrap();
        let second = rx.recv_timeout(WAIT).unwrap();
        let third = rx.recv_timeout(WAIT).unwrap();
        assert_eq!(first.tick, 0);
        assert_eq!(second.tick, 1);
        assert_eq!(third.tick, 2);

        assert!(handle.cancel());
        assert!(!handle.cancel());
        handle.join().await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_cancel_before_first_tick() {
        let ctx = TokioContext::shared();
        let (tx, rx) = crossbeam::channel::unbounded();
        let mut handle = spawn_telemetry(
            ctx,
            TelemetrySimulator::new(1),
            Duration::from_secs(3600),
            tx,
        );

        assert!(handle.cancel());
        handle.join().await.unwrap();

        // At most the initial snapshot made it out
        let published: Vec<_> = rx.try_iter().collect();
        assert!(published.iter().all(|s| s.tick == 0));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_frame_driver_tears_down_scene() {
        let ctx = TokioContext::shared();
        let backend = HeadlessBackend::new(Viewport::default());
        let observer = backend.clone();
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let scene = SceneState::setup(backend, &SceneConfig::default(), &mut rng).unwrap();

        let (tx, rx) = crossbeam::channel::unbounded();
        let config = FrameConfig { fps: 240, publish_every: 1 };
        let handle = spawn_frames(ctx, scene, config, tx);

        let first = rx.recv_timeout(WAIT).unwrap();
        match first {
            FrameSample::City(frame) => {
                assert_eq!(frame.elapsed, 0.0);
                assert!(frame.buildings.iter().all(|b| b.y == b.scale_y / 2.0));
            }
            other => panic!("unexpected sample {:?}", other),
        }

        handle.resize(640, 480).unwrap();
        assert!(handle.resize(0, 480).is_err());

        let target = Some(Viewport::new(640, 480).unwrap());
        let deadline = tokio::time::Instant::now() + WAIT;
        while observer.output_size() != target && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(observer.output_size(), target);

        handle.join().await.unwrap();
        assert_eq!(observer.live_count(), 0);
        assert_eq!(observer.double_releases(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_dropping_receiver_stops_frame_driver() {
        let ctx = TokioContext::shared();
        let backend = HeadlessBackend::new(Viewport::default());
        let observer = backend.clone();
        let cube = crate::cube::CubeScene::setup(backend).unwrap();

        let (tx, rx) = crossbeam::channel::unbounded();
        let handle = spawn_frames(ctx, cube, FrameConfig::default(), tx);
        drop(rx);

        handle.join().await.unwrap();
        assert_eq!(observer.live_count(), 0);
    }
}
