//! Shared plumbing for the procedural scenes.
//!
//! Both the Neo-Miami city and the minimal cube implement [`Animator`]: they
//! are set up once against a [`RenderBackend`], stepped every frame, resized
//! on viewport events, and torn down exactly once.

use nalgebra::{Matrix4, Perspective3, Vector3};
use neomiami_env::{EnvError, RenderBackend, ResourceId, ResourceKind};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::cube::CubeFrame;
use crate::scene::CityFrame;

/// Errors raised while building or resizing a scene.
#[derive(Debug, Error)]
pub enum SceneError {
    /// The backend rejected the request (no surface, bad viewport)
    #[error(transparent)]
    Env(#[from] EnvError),

    /// Scene parameters that cannot produce a valid layout
    #[error("Invalid scene config: {0}")]
    Config(String),
}

/// A scene that is mutated once per displayed frame.
pub trait Animator: Send + 'static {
    /// Advances the scene to `elapsed_secs` since the frame loop started.
    ///
    /// Must not allocate.
    fn step(&mut self, elapsed_secs: f64);

    /// Recomputes the camera aspect and the output size.
    ///
    /// Zero dimensions are rejected with `EnvError::InvalidViewport`.
    fn on_resize(&mut self, width: u32, height: u32) -> Result<(), SceneError>;

    fn camera(&self) -> &Camera;

    /// Copies the current animated values out for presentation.
    fn sample(&self) -> FrameSample;

    /// Releases every rendering resource and returns how many were released.
    fn teardown(self) -> usize
    where
        Self: Sized;
}

/// An immutable copy of a scene's animated values after one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "variant", rename_all = "snake_case")]
pub enum FrameSample {
    City(CityFrame),
    Cube(CubeFrame),
}

// =============================================================================
// CAMERA
// =============================================================================

/// Perspective camera with a cached projection matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    fov_deg: f64,
    aspect: f64,
    near: f64,
    far: f64,
    position: Vector3<f64>,
    projection: Matrix4<f64>,
}

impl Camera {
    pub fn perspective(fov_deg: f64, aspect: f64, near: f64, far: f64, position: Vector3<f64>) -> Self {
        let mut camera = Self {
            fov_deg,
            aspect,
            near,
            far,
            position,
            projection: Matrix4::identity(),
        };
        camera.update_projection();
        camera
    }

    /// Sets a new aspect ratio and rebuilds the projection.
    pub fn set_aspect(&mut self, aspect: f64) {
        self.aspect = aspect;
        self.update_projection();
    }

    fn update_projection(&mut self) {
        self.projection =
            Perspective3::new(self.aspect, self.fov_deg.to_radians(), self.near, self.far)
                .to_homogeneous();
    }

    pub fn fov_deg(&self) -> f64 {
        self.fov_deg
    }

    pub fn aspect(&self) -> f64 {
        self.aspect
    }

    pub fn near(&self) -> f64 {
        self.near
    }

    pub fn far(&self) -> f64 {
        self.far
    }

    pub fn position(&self) -> &Vector3<f64> {
        &self.position
    }

    pub fn projection(&self) -> &Matrix4<f64> {
        &self.projection
    }
}

// =============================================================================
// RESOURCE SET
// =============================================================================

/// Rendering resources owned by one scene.
///
/// Everything acquired through a `ResourceSet` is released on `release_all`
/// or, failing that, on drop, so a setup that bails halfway leaks nothing.
pub(crate) struct ResourceSet<B: RenderBackend> {
    backend: B,
    held: Vec<ResourceId>,
}

impl<B: RenderBackend> ResourceSet<B> {
    pub(crate) fn new(backend: B) -> Self {
        Self {
            backend,
            held: Vec::new(),
        }
    }

    pub(crate) fn acquire(&mut self, kind: ResourceKind, label: &str) -> Result<ResourceId, EnvError> {
        let id = self.backend.allocate(kind, label)?;
        self.held.push(id);
        Ok(id)
    }

    pub(crate) fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub(crate) fn len(&self) -> usize {
        self.held.len()
    }

    /// Releases in reverse acquisition order. Safe to call twice.
    pub(crate) fn release_all(&mut self) -> usize {
        let mut released = 0;
        while let Some(id) = self.held.pop() {
            if self.backend.release(id) {
                released += 1;
            } else {
                warn!(?id, "backend did not recognise resource on release");
            }
        }
        released
    }
}

impl<B: RenderBackend> Drop for ResourceSet<B> {
    fn drop(&mut self) {
        if !self.held.is_empty() {
            let released = self.release_all();
            debug!(released, "released scene resources on drop");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use neomiami_env::{HeadlessBackend, Viewport};

    #[test]
    fn test_camera_aspect_updates_projection() {
        let mut camera = Camera::perspective(60.0, 1.0, 0.1, 1000.0, Vector3::new(0.0, 35.0, 60.0));
        let before = *camera.projection();

        camera.set_aspect(2.0);
        assert_eq!(camera.aspect(), 2.0);
        assert_ne!(before, *camera.projection());

        // m00 = 1 / (aspect * tan(fov/2))
        let expected = 1.0 / (2.0 * (30.0f64).to_radians().tan());
        assert_relative_eq!(camera.projection()[(0, 0)], expected, epsilon = 1e-12);
    }

    #[test]
    fn test_resource_set_releases_on_drop() {
        let backend = HeadlessBackend::new(Viewport::default());
        let observer = backend.clone();

        {
            let mut set = ResourceSet::new(backend);
            set.acquire(ResourceKind::Geometry, "a").unwrap();
            set.acquire(ResourceKind::Material, "b").unwrap();
            assert_eq!(observer.live_count(), 2);
        }

        assert_eq!(observer.live_count(), 0);
        assert_eq!(observer.double_releases(), 0);
    }

    #[test]
    fn test_release_all_is_idempotent() {
        let backend = HeadlessBackend::new(Viewport::default());
        let observer = backend.clone();
        let mut set = ResourceSet::new(backend);
        set.acquire(ResourceKind::Renderer, "renderer").unwrap();

        assert_eq!(set.release_all(), 1);
        assert_eq!(set.release_all(), 0);
        assert_eq!(observer.double_releases(), 0);
    }
}
