//! Harness runner - drives telemetry and a scene on the virtual clock.
//!
//! A run interleaves frames and ticks exactly as the live drivers would, but
//! against [`SimContext`] so the whole run is a function of the seed. Every
//! snapshot and every captured frame is checked against the twin's
//! invariants, and the scene is torn down at the end with the backend ledger
//! inspected for leaks.

use crate::context::{SimContext, SCENE_STREAM, TELEMETRY_STREAM};
use crate::exporter::Recording;
use crate::variant::Variant;

use neomiami_core::cube::{rotation_at, SPIN_PER_FRAME};
use neomiami_core::telemetry::{SENSOR_HEALTH_WALK, SENSOR_VALUE_WALK, TICK_PERIOD};
use neomiami_core::{
    Animator, CubeScene, FrameConfig, FrameSample, SceneConfig, SceneError, SceneState, Snapshot,
    TelemetrySimulator,
};
use neomiami_env::{HeadlessBackend, TwinContext, Viewport};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Slack for float comparisons on values the harness recomputes.
const EPSILON: f64 = 1e-9;

/// Errors that abort a harness run before a verdict is reached.
#[derive(Debug, Error)]
pub enum HarnessError {
    #[error(transparent)]
    Scene(#[from] SceneError),

    #[error("recording I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration for a harness run.
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    /// Master seed
    pub seed: u64,

    /// Telemetry ticks to run; the run ends on the last one
    pub ticks: u64,

    /// Frames per second of virtual time
    pub fps: u32,

    /// Record every Nth frame (0 = record none)
    pub capture_every: u64,

    /// Surface the scene mounts into
    pub viewport: Viewport,

    /// Time between telemetry ticks
    pub tick_period: Duration,

    /// City layout parameters
    pub scene: SceneConfig,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            ticks: 10,
            fps: 60,
            capture_every: 30,
            viewport: Viewport::default(),
            tick_period: TICK_PERIOD,
            scene: SceneConfig::default(),
        }
    }
}

/// Counters collected during a run.
#[derive(Debug, Clone, Default)]
pub struct HarnessMetrics {
    /// Snapshots checked, including the initial one
    pub snapshots: u64,

    /// Frames captured into the recording
    pub captured_frames: usize,

    /// Sensor readings that came back offline
    pub offline_readings: u64,

    /// Total sensor readings
    pub sensor_readings: u64,

    /// Resources the scene allocated
    pub resources_allocated: u64,

    /// Resources released at teardown
    pub resources_released: usize,

    /// Resources still live after teardown
    pub resources_leaked: usize,
}

impl HarnessMetrics {
    /// Fraction of sensor readings that were offline.
    pub fn offline_rate(&self) -> f64 {
        if self.sensor_readings == 0 {
            return 0.0;
        }
        self.offline_readings as f64 / self.sensor_readings as f64
    }
}

/// Result of one harness run.
#[derive(Debug, Clone)]
pub struct HarnessResult {
    pub variant: Variant,
    pub seed: u64,

    /// Whether every invariant held
    pub passed: bool,

    /// Telemetry ticks executed
    pub total_ticks: u64,

    /// Frames stepped
    pub total_frames: u64,

    /// Virtual time at the end of the run
    pub final_time_secs: f64,

    /// First violation, if any
    pub failure_reason: Option<String>,

    pub metrics: HarnessMetrics,

    /// Everything the run produced
    pub recording: Recording,
}

/// Runs variants headlessly on a virtual clock.
pub struct HarnessRunner {
    config: HarnessConfig,
}

impl HarnessRunner {
    /// Creates a runner with default settings and the given seed.
    pub fn new(seed: u64) -> Self {
        Self::with_config(HarnessConfig {
            seed,
            ..Default::default()
        })
    }

    pub fn with_config(config: HarnessConfig) -> Self {
        Self { config }
    }

    /// Sets the number of telemetry ticks.
    pub fn with_ticks(mut self, ticks: u64) -> Self {
        self.config.ticks = ticks;
        self
    }

    /// Sets the frame rate.
    pub fn with_fps(mut self, fps: u32) -> Self {
        self.config.fps = fps;
        self
    }

    pub fn with_viewport(mut self, viewport: Viewport) -> Self {
        self.config.viewport = viewport;
        self
    }

    pub fn with_capture_every(mut self, frames: u64) -> Self {
        self.config.capture_every = frames;
        self
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Runs a variant and returns the verdict with its recording.
    ///
    /// # Errors
    /// Fails only when the scene cannot be mounted; invariant violations are
    /// reported through [`HarnessResult::passed`].
    pub fn run(&self, variant: Variant) -> Result<HarnessResult, HarnessError> {
        info!(
            "Starting variant: {} (seed={}, ticks={})",
            variant.name(),
            self.config.seed,
            self.config.ticks
        );

        let ctx = SimContext::new(self.config.seed);
        let backend = HeadlessBackend::new(self.config.viewport);
        let observer = backend.clone();

        let result = match variant {
            Variant::NeoMiami => {
                let mut rng = ctx.derive_rng(SCENE_STREAM);
                let scene = SceneState::setup(backend, &self.config.scene, &mut rng)?;
                self.drive(&ctx, scene, &observer, variant)
            }
            Variant::Cube => {
                let cube = CubeScene::setup(backend)?;
                self.drive(&ctx, cube, &observer, variant)
            }
        };

        Ok(result)
    }

    fn drive<A: Animator>(
        &self,
        ctx: &SimContext,
        mut animator: A,
        observer: &HeadlessBackend,
        variant: Variant,
    ) -> HarnessResult {
        let config = &self.config;
        let frame_interval = FrameConfig {
            fps: config.fps,
            publish_every: config.capture_every,
        }
        .frame_interval();

        let mut telemetry = TelemetrySimulator::with_rng(ctx.derive_rng(TELEMETRY_STREAM));
        let mut recording = Recording::new(
            variant.name(),
            config.seed,
            config.tick_period,
            config.fps,
            config.viewport,
        );
        let mut metrics = HarnessMetrics {
            resources_allocated: observer.allocated_total(),
            ..Default::default()
        };
        let mut checker = InvariantChecker::new(telemetry.snapshot());

        checker.check_snapshot(telemetry.snapshot(), &mut metrics);
        recording.add_snapshot(telemetry.snapshot().clone());

        let mut next_tick = config.tick_period;
        let mut frames: u64 = 0;

        while telemetry.tick_count() < config.ticks {
            animator.step(ctx.now().as_secs_f64());
            frames += 1;

            if config.capture_every > 0 && (frames - 1) % config.capture_every == 0 {
                let sample = animator.sample();
                checker.check_frame(&sample, frames);
                recording.add_frame(sample);
            }

            ctx.advance_time(frame_interval);

            while ctx.now() >= next_tick && telemetry.tick_count() < config.ticks {
                let snapshot = telemetry.tick();
                checker.check_snapshot(snapshot, &mut metrics);
                recording.add_snapshot(snapshot.clone());
                next_tick += config.tick_period;
            }

            if frames % (config.fps.max(1) as u64 * 10) == 0 {
                debug!(
                    "  t={:.1}s | frames={} | ticks={}",
                    ctx.now().as_secs_f64(),
                    frames,
                    telemetry.tick_count()
                );
            }
        }

        // A time-driven scene must reproduce a recorded frame exactly.
        if variant.is_time_driven() {
            if let Some(FrameSample::City(recorded)) = recording.frames.last() {
                animator.step(recorded.elapsed);
                if animator.sample() != FrameSample::City(recorded.clone()) {
                    checker.fail(format!(
                        "replaying t={:.3}s produced a different frame",
                        recorded.elapsed
                    ));
                }
            }
        }

        metrics.resources_released = animator.teardown();
        metrics.resources_leaked = observer.live_count();
        metrics.captured_frames = recording.frames.len();

        if metrics.resources_leaked > 0 {
            checker.fail(format!(
                "{} resources still live after teardown",
                metrics.resources_leaked
            ));
        }
        if observer.double_releases() > 0 {
            checker.fail(format!(
                "{} resources released twice",
                observer.double_releases()
            ));
        }

        let failure_reason = checker.into_failure();
        let passed = failure_reason.is_none();
        recording.finalize(passed);

        if let Some(reason) = &failure_reason {
            warn!("{} (seed={}) failed: {}", variant.name(), config.seed, reason);
        }

        HarnessResult {
            variant,
            seed: config.seed,
            passed,
            total_ticks: telemetry.tick_count(),
            total_frames: frames,
            final_time_secs: ctx.now().as_secs_f64(),
            failure_reason,
            metrics,
            recording,
        }
    }
}

/// Checks snapshots and frames, remembering the first violation.
struct InvariantChecker {
    /// Sensor identity at tick 0: (id, name, location, unit)
    identities: Vec<(u32, String, String, String)>,
    violations: Vec<String>,
}

impl InvariantChecker {
    fn new(initial: &Snapshot) -> Self {
        Self {
            identities: initial
                .sensors
                .iter()
                .map(|s| (s.id, s.name.clone(), s.location.clone(), s.unit.clone()))
                .collect(),
            violations: Vec::new(),
        }
    }

    fn fail(&mut self, reason: String) {
        self.violations.push(reason);
    }

    fn into_failure(self) -> Option<String> {
        self.violations.into_iter().next()
    }

    fn check_snapshot(&mut self, snapshot: &Snapshot, metrics: &mut HarnessMetrics) {
        metrics.snapshots += 1;

        for metric in &snapshot.metrics {
            if !metric.kind.walk().contains(metric.value) {
                self.fail(format!(
                    "tick {}: {} = {} out of bounds",
                    snapshot.tick,
                    metric.kind.label(),
                    metric.value
                ));
            }
            let (_, change_bounds) = metric.kind.change_baseline();
            if !change_bounds.contains(metric.change) {
                self.fail(format!(
                    "tick {}: {} change {} out of bounds",
                    snapshot.tick,
                    metric.kind.label(),
                    metric.change
                ));
            }
        }

        if snapshot.sensors.len() != self.identities.len() {
            self.fail(format!(
                "tick {}: {} sensors, expected {}",
                snapshot.tick,
                snapshot.sensors.len(),
                self.identities.len()
            ));
        }

        for (sensor, (id, name, location, unit)) in snapshot.sensors.iter().zip(&self.identities) {
            metrics.sensor_readings += 1;
            if !sensor.is_online() {
                metrics.offline_readings += 1;
            }

            if sensor.id != *id
                || &sensor.name != name
                || &sensor.location != location
                || &sensor.unit != unit
            {
                self.violations.push(format!(
                    "tick {}: sensor {} changed identity",
                    snapshot.tick, id
                ));
            }
            if !SENSOR_VALUE_WALK.contains(sensor.value) {
                self.violations.push(format!(
                    "tick {}: sensor {} value {} out of bounds",
                    snapshot.tick, id, sensor.value
                ));
            }
            if !SENSOR_HEALTH_WALK.contains(sensor.health) {
                self.violations.push(format!(
                    "tick {}: sensor {} health {} out of bounds",
                    snapshot.tick, id, sensor.health
                ));
            }
        }
    }

    fn check_frame(&mut self, sample: &FrameSample, frames: u64) {
        match sample {
            FrameSample::City(city) => {
                for (idx, b) in city.buildings.iter().enumerate() {
                    if (b.y - b.scale_y / 2.0).abs() > EPSILON {
                        self.fail(format!(
                            "t={:.3}s: building {} floats (y={}, scale={})",
                            city.elapsed, idx, b.y, b.scale_y
                        ));
                    }
                    if b.scale_y < 1.5 - EPSILON || b.scale_y > 7.5 + EPSILON {
                        self.fail(format!(
                            "t={:.3}s: building {} scale {} out of range",
                            city.elapsed, idx, b.scale_y
                        ));
                    }
                    if b.pulse < 0.25 - EPSILON || b.pulse > 1.25 + EPSILON {
                        self.fail(format!(
                            "t={:.3}s: building {} pulse {} out of range",
                            city.elapsed, idx, b.pulse
                        ));
                    }
                }
                if city.path_opacity < 0.3 - EPSILON || city.path_opacity > 0.9 + EPSILON {
                    self.fail(format!(
                        "t={:.3}s: path opacity {} out of range",
                        city.elapsed, city.path_opacity
                    ));
                }
                if (city.starfield_yaw - city.elapsed * 0.02).abs() > EPSILON {
                    self.fail(format!(
                        "t={:.3}s: starfield yaw {} drifted",
                        city.elapsed, city.starfield_yaw
                    ));
                }
            }
            FrameSample::Cube(cube) => {
                if cube.frame != frames {
                    self.fail(format!("cube reports frame {} at frame {}", cube.frame, frames));
                }
                // Accumulated per-frame spin drifts by at most one ulp per step
                let tolerance = SPIN_PER_FRAME * 1e-6 * frames as f64 + EPSILON;
                if (cube.rotation_x - rotation_at(frames)).abs() > tolerance
                    || cube.rotation_x != cube.rotation_y
                {
                    self.fail(format!(
                        "frame {}: cube rotation ({}, {}) off",
                        frames, cube.rotation_x, cube.rotation_y
                    ));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use neomiami_core::{spawn_frames, spawn_telemetry};
    use proptest::prelude::*;
    use std::sync::Arc;

    #[test]
    fn test_neo_miami_variant_passes() {
        let runner = HarnessRunner::new(42).with_ticks(3);
        let result = runner.run(Variant::NeoMiami).unwrap();

        assert!(result.passed, "{:?}", result.failure_reason);
        assert_eq!(result.total_ticks, 3);
        // Initial snapshot plus one per tick
        assert_eq!(result.recording.snapshots.len(), 4);
        assert!(result.final_time_secs >= 9.6);
        assert_eq!(result.metrics.resources_allocated, 65);
        assert_eq!(result.metrics.resources_released, 65);
        assert_eq!(result.metrics.resources_leaked, 0);
    }

    #[test]
    fn test_cube_variant_passes() {
        let runner = HarnessRunner::new(7).with_ticks(2).with_capture_every(1);
        let result = runner.run(Variant::Cube).unwrap();

        assert!(result.passed, "{:?}", result.failure_reason);
        assert_eq!(result.metrics.captured_frames as u64, result.total_frames);
        assert_eq!(result.metrics.resources_released, 3);
    }

    #[test]
    fn test_first_captured_frame_is_time_zero() {
        let result = HarnessRunner::new(1).with_ticks(1).run(Variant::NeoMiami).unwrap();

        match &result.recording.frames[0] {
            FrameSample::City(city) => assert_eq!(city.elapsed, 0.0),
            other => panic!("unexpected sample {:?}", other),
        }
    }

    #[test]
    fn test_runs_are_deterministic() {
        let a = HarnessRunner::new(99).with_ticks(4).run(Variant::NeoMiami).unwrap();
        let b = HarnessRunner::new(99).with_ticks(4).run(Variant::NeoMiami).unwrap();

        assert_eq!(a.recording.snapshots, b.recording.snapshots);
        assert_eq!(a.recording.frames, b.recording.frames);
        assert_eq!(a.total_frames, b.total_frames);
    }

    #[test]
    fn test_telemetry_stream_independent_of_variant() {
        let city = HarnessRunner::new(5).with_ticks(3).run(Variant::NeoMiami).unwrap();
        let cube = HarnessRunner::new(5).with_ticks(3).run(Variant::Cube).unwrap();

        assert_eq!(city.recording.snapshots, cube.recording.snapshots);
    }

    #[test]
    fn test_different_seeds_diverge() {
        let a = HarnessRunner::new(1).with_ticks(2).run(Variant::Cube).unwrap();
        let b = HarnessRunner::new(2).with_ticks(2).run(Variant::Cube).unwrap();

        assert_ne!(a.recording.snapshots, b.recording.snapshots);
    }

    #[test]
    fn test_zero_ticks_runs_no_frames() {
        let result = HarnessRunner::new(3).with_ticks(0).run(Variant::NeoMiami).unwrap();

        assert!(result.passed);
        assert_eq!(result.total_frames, 0);
        assert_eq!(result.recording.snapshots.len(), 1);
        assert_eq!(result.metrics.resources_leaked, 0);
    }

    #[test]
    fn test_extreme_fps_still_advances_clock() {
        let result = HarnessRunner::new(8)
            .with_ticks(1)
            .with_fps(u32::MAX)
            .with_capture_every(0)
            .run(Variant::Cube)
            .unwrap();

        assert!(result.passed, "{:?}", result.failure_reason);
        // 3.2 s at the 1 ms floor
        assert_eq!(result.total_frames, 3200);
        assert!(result.final_time_secs >= 3.2);
    }

    #[test]
    fn test_checker_flags_sensor_drift() {
        let mut sim = TelemetrySimulator::new(11);
        let mut checker = InvariantChecker::new(sim.snapshot());
        let mut metrics = HarnessMetrics::default();

        let mut tampered = sim.tick().clone();
        tampered.sensors[2].name = "Rogue Node".to_string();
        tampered.sensors[4].value = 500.0;
        checker.check_snapshot(&tampered, &mut metrics);

        assert_eq!(metrics.snapshots, 1);
        assert_eq!(metrics.sensor_readings, 6);
        assert_eq!(checker.violations.len(), 2);
        assert!(checker.violations[1].contains("sensor 4 value 500"));
        let reason = checker.into_failure().unwrap();
        assert!(reason.contains("sensor 2 changed identity"), "{}", reason);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        #[test]
        fn prop_every_seed_passes(seed in any::<u64>(), ticks in 0u64..4) {
            for variant in Variant::all() {
                let result = HarnessRunner::new(seed).with_ticks(ticks).run(variant).unwrap();
                prop_assert!(result.passed, "{:?}", result.failure_reason);
                prop_assert_eq!(result.total_ticks, ticks);
                prop_assert_eq!(result.metrics.resources_leaked, 0);
            }
        }
    }

    #[test]
    fn test_invalid_scene_config_is_an_error() {
        let config = HarnessConfig {
            scene: SceneConfig {
                city_extent: f64::NAN,
                ..Default::default()
            },
            ..Default::default()
        };
        let result = HarnessRunner::with_config(config).run(Variant::NeoMiami);

        assert!(matches!(result, Err(HarnessError::Scene(SceneError::Config(_)))));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_telemetry_driver_on_virtual_clock() {
        let ctx = SimContext::shared(42);
        let (tx, rx) = crossbeam::channel::unbounded();
        let handle = spawn_telemetry(
            Arc::clone(&ctx),
            TelemetrySimulator::with_rng(ctx.derive_rng(TELEMETRY_STREAM)),
            TICK_PERIOD,
            tx,
        );

        let received: Vec<Arc<Snapshot>> = (0..5)
            .map(|_| rx.recv_timeout(Duration::from_secs(5)).unwrap())
            .collect();
        handle.join().await.unwrap();

        let ticks: Vec<u64> = received.iter().map(|s| s.tick).collect();
        assert_eq!(ticks, vec![0, 1, 2, 3, 4]);
        // Four full periods slept, no wall-clock time spent
        assert!(ctx.now() >= TICK_PERIOD * 4);

        // Same stream as the headless harness
        let harness = HarnessRunner::new(42).with_ticks(4).run(Variant::Cube).unwrap();
        for (live, recorded) in received.iter().zip(&harness.recording.snapshots) {
            assert_eq!(live.as_ref(), recorded);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_frame_driver_on_virtual_clock() {
        let ctx = SimContext::shared(42);
        let backend = HeadlessBackend::new(Viewport::default());
        let observer = backend.clone();
        let mut rng = ctx.derive_rng(SCENE_STREAM);
        let scene = SceneState::setup(backend, &SceneConfig::default(), &mut rng).unwrap();

        let (tx, rx) = crossbeam::channel::unbounded();
        let handle = spawn_frames(Arc::clone(&ctx), scene, FrameConfig::default(), tx);

        let first = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        let second = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        handle.join().await.unwrap();

        match (first, second) {
            (FrameSample::City(a), FrameSample::City(b)) => {
                assert_eq!(a.elapsed, 0.0);
                assert!((b.elapsed - 1.0 / 60.0).abs() < 1e-6);
            }
            other => panic!("unexpected samples {:?}", other),
        }
        assert_eq!(observer.live_count(), 0);
    }
}
