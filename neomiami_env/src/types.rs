//! Common types for the Neo-Miami environment abstraction.

use crate::error::EnvError;
use serde::{Deserialize, Serialize};

/// Pixel dimensions of an output surface.
///
/// Both dimensions are guaranteed non-zero; use [`Viewport::new`] to build one
/// from untrusted resize events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawViewport")]
pub struct Viewport {
    width: u32,
    height: u32,
}

impl Viewport {
    /// Creates a viewport, rejecting zero dimensions.
    pub fn new(width: u32, height: u32) -> Result<Self, EnvError> {
        if width == 0 || height == 0 {
            return Err(EnvError::InvalidViewport { width, height });
        }
        Ok(Self { width, height })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Width over height, as used for a perspective camera.
    pub fn aspect(&self) -> f64 {
        self.width as f64 / self.height as f64
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}

/// Unchecked wire form; decoding goes through [`Viewport::new`].
#[derive(Deserialize)]
struct RawViewport {
    width: u32,
    height: u32,
}

impl TryFrom<RawViewport> for Viewport {
    type Error = EnvError;

    fn try_from(raw: RawViewport) -> Result<Self, Self::Error> {
        Viewport::new(raw.width, raw.height)
    }
}

impl std::fmt::Display for Viewport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}
