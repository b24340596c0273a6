//! Neo-Miami Core - synthetic telemetry and a procedural digital twin
//!
//! This library holds everything behind the Neo-Miami IoT dashboard that is
//! not markup:
//! 1. **Telemetry**: bounded random walks over four city metrics and a six
//!    sensor fleet, advanced every 3.2 s
//! 2. **Scene**: a pulsing neon city (and a minimal spinning cube) whose every
//!    frame is a function of elapsed time
//! 3. **Runtime**: cancellable tick/frame drivers over a `TwinContext`

pub mod animator;
pub mod cube;
pub mod runtime;
pub mod scene;
pub mod telemetry;
pub mod visualization;

#[cfg(feature = "dashboard")]
pub mod dashboard;

// Re-export key types for convenience
pub use animator::{Animator, Camera, FrameSample, SceneError};
pub use cube::{CubeFrame, CubeScene};
pub use runtime::{
    spawn_frames, spawn_telemetry, DriverHandle, FrameConfig, FrameDriverHandle, MAX_FPS,
};
pub use scene::{CityFrame, SceneConfig, SceneState};
pub use telemetry::{
    sample_bounded, tick, Metric, MetricKind, SensorRecord, SensorStatus, Snapshot,
    TelemetryConfig, TelemetrySimulator,
};
pub use visualization::TwinViewer;
