//! Neo-Miami Simulation Harness
//!
//! Runs the digital twin with every source of non-determinism under control:
//! - **Time**: a virtual clock that moves only when frames advance it
//! - **Randomness**: telemetry and scene layout draw from separate streams
//!   derived from a single 64-bit seed
//! - **Resources**: a headless backend whose ledger is checked for leaks
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                     HarnessRunner                        │
//! │  ┌────────────────────────────────────────────────────┐  │
//! │  │ SimContext (virtual clock + seeded streams)        │  │
//! │  └────────────────────────────────────────────────────┘  │
//! │       │ stream 1                       │ stream 2        │
//! │  ┌────▼──────────────┐           ┌─────▼─────────────┐   │
//! │  │ TelemetrySimulator│           │ SceneState / Cube │   │
//! │  │   tick / 3.2 s    │           │   step / frame    │   │
//! │  └────┬──────────────┘           └─────┬─────────────┘   │
//! │       └──────────────┬─────────────────┘                 │
//! │               ┌──────▼──────┐                            │
//! │               │  Recording  │  → JSON                    │
//! │               └─────────────┘                            │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use neomiami_sim::{HarnessRunner, Variant};
//!
//! let result = HarnessRunner::new(42).with_ticks(10).run(Variant::NeoMiami)?;
//! assert!(result.passed);
//! result.recording.write_to_file("run.json")?;
//! ```

mod context;
mod exporter;
mod live;
mod runner;
pub mod variant;

pub use context::{SimContext, SCENE_STREAM, TELEMETRY_STREAM};
pub use exporter::Recording;
pub use live::{run_live, LiveConfig};
pub use runner::{HarnessConfig, HarnessError, HarnessMetrics, HarnessResult, HarnessRunner};
pub use variant::Variant;
