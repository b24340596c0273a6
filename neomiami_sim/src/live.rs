//! Live mode - the real drivers on the Tokio clock.
//!
//! Telemetry and frames run as independent tasks over [`TokioContext`]. The
//! presentation is either the terminal dashboard (feature `dashboard`) or a
//! log loop that also streams to Rerun when a viewer is attached.

use crate::context::{SCENE_STREAM, TELEMETRY_STREAM};
use crate::runner::HarnessError;
use crate::variant::Variant;

use crossbeam::channel::Receiver;
use neomiami_core::telemetry::TICK_PERIOD;
use neomiami_core::{
    spawn_frames, spawn_telemetry, CubeScene, FrameConfig, FrameSample, MetricKind, SceneConfig,
    SceneState, Snapshot, TelemetrySimulator, TwinViewer,
};
use neomiami_env::{HeadlessBackend, TokioContext, TwinContext, Viewport};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Settings for a live session.
#[derive(Debug, Clone)]
pub struct LiveConfig {
    pub variant: Variant,

    /// Stop after this long; `None` runs until Ctrl-C
    pub duration: Option<Duration>,

    pub fps: u32,
    pub viewport: Viewport,

    /// Open the terminal dashboard instead of logging
    pub dashboard: bool,

    /// Stream to a Rerun viewer
    pub visualize: bool,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            variant: Variant::NeoMiami,
            duration: None,
            fps: 60,
            viewport: Viewport::default(),
            dashboard: false,
            visualize: false,
        }
    }
}

/// Runs the twin until the duration elapses, Ctrl-C, or the dashboard quits.
///
/// Returns the number of scene resources still live after shutdown.
pub async fn run_live(config: LiveConfig) -> Result<usize, HarnessError> {
    let ctx = TokioContext::shared();
    let backend = HeadlessBackend::new(config.viewport);
    let observer = backend.clone();
    let viewer = if config.visualize {
        TwinViewer::new("neomiami")
    } else {
        TwinViewer::disabled()
    };

    let (snapshot_tx, snapshot_rx) = crossbeam::channel::unbounded();
    let (frame_tx, frame_rx) = crossbeam::channel::unbounded();

    // Frames are thinned for the log loop; the dashboard keeps only the latest.
    let frame_config = FrameConfig {
        fps: config.fps,
        publish_every: if config.dashboard { 1 } else { config.fps.max(1) as u64 },
    };

    let frames = match config.variant {
        Variant::NeoMiami => {
            let mut rng = ctx.derive_rng(SCENE_STREAM);
            let scene = SceneState::setup(backend, &SceneConfig::default(), &mut rng)?;
            viewer.log_starfield(scene.stars());
            spawn_frames(Arc::clone(&ctx), scene, frame_config, frame_tx)
        }
        Variant::Cube => {
            let cube = CubeScene::setup(backend)?;
            spawn_frames(Arc::clone(&ctx), cube, frame_config, frame_tx)
        }
    };

    let telemetry = spawn_telemetry(
        Arc::clone(&ctx),
        TelemetrySimulator::with_rng(ctx.derive_rng(TELEMETRY_STREAM)),
        TICK_PERIOD,
        snapshot_tx,
    );

    info!(variant = %config.variant, "live session started");

    present(&ctx, &config, &viewer, snapshot_rx, frame_rx).await?;

    if telemetry.join().await.is_err() {
        warn!("telemetry driver panicked");
    }
    if frames.join().await.is_err() {
        warn!("frame driver panicked");
    }

    let leaked = observer.live_count();
    info!(
        allocated = observer.allocated_total(),
        leaked, "live session stopped"
    );
    Ok(leaked)
}

#[cfg(feature = "dashboard")]
async fn present(
    ctx: &Arc<TokioContext>,
    config: &LiveConfig,
    viewer: &TwinViewer,
    snapshots: Receiver<Arc<Snapshot>>,
    samples: Receiver<FrameSample>,
) -> Result<(), HarnessError> {
    if !config.dashboard {
        return log_loop(ctx, config, viewer, snapshots, samples).await;
    }

    let mut dashboard = neomiami_core::dashboard::TwinDashboard::new(snapshots, samples);
    match tokio::task::spawn_blocking(move || dashboard.run()).await {
        Ok(result) => result?,
        Err(e) => warn!("dashboard task failed: {}", e),
    }
    Ok(())
}

#[cfg(not(feature = "dashboard"))]
async fn present(
    ctx: &Arc<TokioContext>,
    config: &LiveConfig,
    viewer: &TwinViewer,
    snapshots: Receiver<Arc<Snapshot>>,
    samples: Receiver<FrameSample>,
) -> Result<(), HarnessError> {
    if config.dashboard {
        info!("Dashboard not available (compile with --features dashboard)");
    }
    log_loop(ctx, config, viewer, snapshots, samples).await
}

/// Logs each snapshot and forwards everything to the viewer.
async fn log_loop(
    ctx: &Arc<TokioContext>,
    config: &LiveConfig,
    viewer: &TwinViewer,
    snapshots: Receiver<Arc<Snapshot>>,
    samples: Receiver<FrameSample>,
) -> Result<(), HarnessError> {
    let started = ctx.now();
    let poll = Duration::from_millis(100);

    // One listener for the whole session so no interrupt falls between polls
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        for snapshot in snapshots.try_iter() {
            log_snapshot(&snapshot);
            viewer.log_snapshot(&snapshot);
        }
        for sample in samples.try_iter() {
            viewer.log_frame(&sample);
        }

        if let Some(limit) = config.duration {
            if ctx.now().saturating_sub(started) >= limit {
                info!("duration reached");
                break;
            }
        }

        tokio::select! {
            _ = &mut ctrl_c => {
                info!("interrupted");
                break;
            }
            _ = ctx.sleep(poll) => {}
        }
    }

    Ok(())
}

fn log_snapshot(snapshot: &Snapshot) {
    let metric = |kind| snapshot.metric(kind).value;
    info!(
        "tick {} | temp {:.1}°C | humidity {:.0}% | air {:.0} | network {:.0}% | sensors {}/{}",
        snapshot.tick,
        metric(MetricKind::Temperature),
        metric(MetricKind::Humidity),
        metric(MetricKind::AirQuality),
        metric(MetricKind::NetworkHealth),
        snapshot.online_count(),
        snapshot.sensors.len()
    );
}
