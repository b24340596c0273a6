//! Neo-Miami Environment Abstraction Layer
//!
//! This crate provides the "Sans-IO" seam that lets the telemetry simulator
//! and the scene animators run both **live** (tokio, OS entropy, a real
//! output surface) and **simulated** (virtual clock, seeded RNG, headless
//! surface).
//!
//! # Core Concept
//!
//! Every source of non-determinism the core touches is routed through here:
//! - Time (`now()`, `sleep()`)
//! - Randomness (`derive_rng()`)
//! - Rendering resources (`RenderBackend::allocate()` / `release()`)
//!
//! Deriving all entropy from a single 64-bit seed makes any recorded run
//! reproducible from its seed number.
//!
//! # Example
//!
//! ```ignore
//! use neomiami_env::{TwinContext, TokioContext};
//!
//! async fn tick_loop<Ctx: TwinContext>(ctx: &Ctx) {
//!     loop {
//!         ctx.sleep(Duration::from_millis(3200)).await;
//!         tick();
//!     }
//! }
//! ```

mod backend;
mod context;
mod error;
mod tokio_impl;
mod types;

pub use backend::{HeadlessBackend, RenderBackend, ResourceId, ResourceKind};
pub use context::TwinContext;
pub use error::EnvError;
pub use tokio_impl::TokioContext;
pub use types::Viewport;
