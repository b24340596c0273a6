//! Minimal variant: a single spinning cube.
//!
//! Unlike the city, the cube's pose is driven by frame count rather than
//! elapsed time: every frame adds a fixed 0.01 rad to both the x and y
//! rotation, so its speed follows the display refresh rate.

use nalgebra::Vector3;
use neomiami_env::{RenderBackend, ResourceKind, Viewport};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::animator::{Animator, Camera, FrameSample, ResourceSet, SceneError};

/// Rotation added to each axis per frame (radians).
pub const SPIN_PER_FRAME: f64 = 0.01;

pub const CUBE_CAMERA_FOV_DEG: f64 = 75.0;
pub const CUBE_CAMERA_POSITION: [f64; 3] = [0.0, 0.0, 3.0];
pub const CUBE_BACKGROUND: u32 = 0x111111;

/// Cube pose after one frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CubeFrame {
    pub frame: u64,
    pub rotation_x: f64,
    pub rotation_y: f64,
}

/// Closed-form rotation after `frames` frames.
pub fn rotation_at(frames: u64) -> f64 {
    frames as f64 * SPIN_PER_FRAME
}

/// The spinning-cube scene.
pub struct CubeScene<B: RenderBackend> {
    camera: Camera,
    viewport: Viewport,
    rotation: Vector3<f64>,
    frames: u64,
    resources: ResourceSet<B>,
}

impl<B: RenderBackend> CubeScene<B> {
    /// Mounts a unit cube with a normal-shaded material.
    pub fn setup(backend: B) -> Result<Self, SceneError> {
        let viewport = backend.surface_size()?;
        let mut resources = ResourceSet::new(backend);

        resources.acquire(ResourceKind::Renderer, "renderer")?;
        resources.acquire(ResourceKind::Geometry, "cube")?;
        resources.acquire(ResourceKind::Material, "cube-normals")?;

        let camera = Camera::perspective(
            CUBE_CAMERA_FOV_DEG,
            viewport.aspect(),
            0.1,
            1000.0,
            Vector3::from(CUBE_CAMERA_POSITION),
        );
        info!(%viewport, "cube scene ready");

        Ok(Self {
            camera,
            viewport,
            rotation: Vector3::zeros(),
            frames: 0,
            resources,
        })
    }

    /// Current rotation in radians (z stays 0).
    pub fn rotation(&self) -> &Vector3<f64> {
        &self.rotation
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }
}

impl<B: RenderBackend> Animator for CubeScene<B> {
    fn step(&mut self, _elapsed_secs: f64) {
        self.rotation.x += SPIN_PER_FRAME;
        self.rotation.y += SPIN_PER_FRAME;
        self.frames += 1;
    }

    fn on_resize(&mut self, width: u32, height: u32) -> Result<(), SceneError> {
        let viewport = Viewport::new(width, height)?;
        self.camera.set_aspect(viewport.aspect());
        self.resources.backend_mut().set_output_size(viewport);
        self.viewport = viewport;
        debug!(%viewport, "cube scene resized");
        Ok(())
    }

    fn camera(&self) -> &Camera {
        &self.camera
    }

    fn sample(&self) -> FrameSample {
        FrameSample::Cube(CubeFrame {
            frame: self.frames,
            rotation_x: self.rotation.x,
            rotation_y: self.rotation.y,
        })
    }

    fn teardown(mut self) -> usize {
        let released = self.resources.release_all();
        info!(released, frames = self.frames, "cube scene torn down");
        released
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use neomiami_env::{EnvError, HeadlessBackend};

    #[test]
    fn test_cube_spins_per_frame() {
        let backend = HeadlessBackend::new(Viewport::new(300, 300).unwrap());
        let mut cube = CubeScene::setup(backend).unwrap();

        for _ in 0..100 {
            // Elapsed time is ignored
            cube.step(0.0);
        }

        assert_eq!(cube.frames(), 100);
        assert_relative_eq!(cube.rotation().x, rotation_at(100), epsilon = 1e-9);
        assert_relative_eq!(cube.rotation().y, 1.0, epsilon = 1e-9);
        assert_eq!(cube.rotation().z, 0.0);
    }

    #[test]
    fn test_cube_camera() {
        let backend = HeadlessBackend::new(Viewport::new(400, 200).unwrap());
        let mut cube = CubeScene::setup(backend).unwrap();

        assert_eq!(cube.camera().fov_deg(), 75.0);
        assert_relative_eq!(cube.camera().aspect(), 2.0);

        cube.on_resize(300, 600).unwrap();
        assert_relative_eq!(cube.camera().aspect(), 0.5);
        assert!(cube.on_resize(300, 0).is_err());
        assert_eq!(cube.viewport(), Viewport::new(300, 600).unwrap());
    }

    #[test]
    fn test_cube_teardown_releases() {
        let backend = HeadlessBackend::new(Viewport::default());
        let observer = backend.clone();
        let cube = CubeScene::setup(backend).unwrap();

        assert_eq!(observer.live_count(), 3);
        assert_eq!(cube.teardown(), 3);
        assert_eq!(observer.live_count(), 0);
    }

    #[test]
    fn test_cube_requires_surface() {
        let result = CubeScene::setup(HeadlessBackend::detached());
        assert!(matches!(
            result,
            Err(SceneError::Env(EnvError::SurfaceUnavailable(_)))
        ));
    }
}
