//! Neo-Miami procedural city.
//!
//! A wireframe ground grid, a field of pulsing building proxies, a road, a
//! neon path and a slowly turning starfield. Positions are drawn once at
//! setup; every frame after that is a pure function of elapsed time.
//!
//! # Per-frame Rules
//!
//! ```text
//! pulse_i   = sin(2t + 0.4 i) * 0.5 + 0.75
//! scale_i   = (sin(t + i) + 1.5) * 3          y_i = scale_i / 2
//! opacity   = 0.6 + sin(2t) * 0.3
//! star_yaw  = 0.02 t
//! ```

use nalgebra::{Rotation3, Vector3};
use neomiami_env::{RenderBackend, ResourceId, ResourceKind, Viewport};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::animator::{Animator, Camera, FrameSample, ResourceSet, SceneError};

/// Camera vertical field of view in degrees.
pub const CAMERA_FOV_DEG: f64 = 60.0;
pub const CAMERA_NEAR: f64 = 0.1;
pub const CAMERA_FAR: f64 = 1000.0;
pub const CAMERA_POSITION: [f64; 3] = [0.0, 35.0, 60.0];

/// Exponential fog colour and density.
pub const FOG_COLOR: u32 = 0x030016;
pub const FOG_DENSITY: f64 = 0.025;

/// Emissive colour the buildings pulse with.
pub const BUILDING_EMISSIVE: u32 = 0x38E8D0;

/// Endpoints of the neon path, just above the ground.
pub const PATH_ENDPOINTS: [[f64; 3]; 2] = [[-60.0, 0.02, -60.0], [60.0, 0.02, 60.0]];

/// A light in the scene.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Light {
    pub color: u32,
    pub intensity: f64,
    /// `None` for ambient light
    pub position: Option<[f64; 3]>,
    /// Falloff distance; 0 for ambient light
    pub range: f64,
}

/// Ambient teal plus a pink and a teal point light.
pub const LIGHTS: [Light; 3] = [
    Light {
        color: 0x74F1FF,
        intensity: 0.6,
        position: None,
        range: 0.0,
    },
    Light {
        color: 0xFF6EC7,
        intensity: 1.0,
        position: Some([-30.0, 30.0, 20.0]),
        range: 120.0,
    },
    Light {
        color: 0x38E8D0,
        intensity: 1.0,
        position: Some([30.0, 25.0, -10.0]),
        range: 120.0,
    },
];

/// Tunable scene population.
#[derive(Debug, Clone)]
pub struct SceneConfig {
    /// Number of building proxies
    pub building_count: usize,

    /// Number of starfield points
    pub star_count: usize,

    /// Buildings are placed in `[-extent/2, extent/2)` on x and z
    pub city_extent: f64,

    /// Stars are placed in `[-spread/2, spread/2)` on x and z
    pub star_spread: f64,

    /// Lowest star altitude
    pub star_floor: f64,

    /// Altitude band above `star_floor`
    pub star_band: f64,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            building_count: 55,
            star_count: 400,
            city_extent: 80.0,
            star_spread: 200.0,
            star_floor: 20.0,
            star_band: 80.0,
        }
    }
}

impl SceneConfig {
    fn validate(&self) -> Result<(), SceneError> {
        let extents = [
            ("city_extent", self.city_extent),
            ("star_spread", self.star_spread),
            ("star_band", self.star_band),
        ];
        for (name, value) in extents {
            if !value.is_finite() || value < 0.0 {
                return Err(SceneError::Config(format!("{name} must be finite and non-negative, got {value}")));
            }
        }
        if !self.star_floor.is_finite() {
            return Err(SceneError::Config("star_floor must be finite".to_string()));
        }
        Ok(())
    }
}

// =============================================================================
// ELEMENTS
// =============================================================================

/// A building proxy: a 4×8×4 box scaled on y.
#[derive(Debug, Clone, PartialEq)]
pub struct Building {
    pub position: Vector3<f64>,
    pub scale_y: f64,
    /// Emissive intensity
    pub pulse: f64,
    material: ResourceId,
}

impl Building {
    /// True when the box sits on the ground plane (`y == scale / 2`).
    pub fn is_grounded(&self) -> bool {
        self.position.y == self.scale_y / 2.0
    }
}

/// The glowing diagonal line across the city.
#[derive(Debug, Clone, PartialEq)]
pub struct NeonPath {
    pub from: Vector3<f64>,
    pub to: Vector3<f64>,
    pub color: u32,
    pub opacity: f64,
}

/// Static point cloud rotated about the vertical axis.
#[derive(Debug, Clone, PartialEq)]
pub struct Starfield {
    pub points: Vec<Vector3<f64>>,
    pub color: u32,
    pub point_size: f64,
    /// Rotation about +y in radians
    pub yaw: f64,
}

impl Starfield {
    /// Point positions with the current yaw applied.
    pub fn world_points(&self) -> impl Iterator<Item = Vector3<f64>> + '_ {
        let rotation = Rotation3::from_axis_angle(&Vector3::y_axis(), self.yaw);
        self.points.iter().map(move |p| rotation * p)
    }
}

/// 120×120 wireframe ground grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ground {
    pub size: f64,
    pub segments: u32,
    pub color: u32,
    pub opacity: f64,
}

/// Flat road strip.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Road {
    pub width: f64,
    pub depth: f64,
    pub z: f64,
    pub color: u32,
}

// =============================================================================
// FRAME SAMPLE
// =============================================================================

/// Animated values of one building.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BuildingFrame {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub scale_y: f64,
    pub pulse: f64,
}

/// Animated values of the whole city after one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CityFrame {
    pub elapsed: f64,
    pub buildings: Vec<BuildingFrame>,
    pub path_opacity: f64,
    pub starfield_yaw: f64,
}

impl CityFrame {
    /// Mean building height scale, for compact summaries.
    pub fn mean_scale(&self) -> f64 {
        if self.buildings.is_empty() {
            return 0.0;
        }
        self.buildings.iter().map(|b| b.scale_y).sum::<f64>() / self.buildings.len() as f64
    }
}

// =============================================================================
// SCENE STATE
// =============================================================================

/// The Neo-Miami city, owning every resource it rendered with.
pub struct SceneState<B: RenderBackend> {
    elapsed: f64,
    camera: Camera,
    viewport: Viewport,
    ground: Ground,
    road: Road,
    buildings: Vec<Building>,
    path: NeonPath,
    stars: Starfield,
    resources: ResourceSet<B>,
}

impl<B: RenderBackend> SceneState<B> {
    /// Builds the city against `backend`, drawing layout from `rng`.
    ///
    /// Draw order: for each building x, z, scale; then for each star x, y, z.
    ///
    /// # Errors
    /// * `SceneError::Env(SurfaceUnavailable)` - no surface to mount into
    /// * `SceneError::Config` - non-finite or negative extents
    pub fn setup<R: Rng + ?Sized>(backend: B, config: &SceneConfig, rng: &mut R) -> Result<Self, SceneError> {
        config.validate()?;

        let viewport = backend.surface_size()?;
        let mut resources = ResourceSet::new(backend);

        resources.acquire(ResourceKind::Renderer, "renderer")?;
        resources.acquire(ResourceKind::Geometry, "ground")?;
        resources.acquire(ResourceKind::Material, "ground")?;
        resources.acquire(ResourceKind::Geometry, "building")?;

        let mut buildings = Vec::with_capacity(config.building_count);
        for _ in 0..config.building_count {
            let material = resources.acquire(ResourceKind::Material, "building")?;
            let x = (rng.gen::<f64>() - 0.5) * config.city_extent;
            let z = (rng.gen::<f64>() - 0.5) * config.city_extent;
            let scale_y = rng.gen::<f64>() * 6.0 + 1.0;
            buildings.push(Building {
                position: Vector3::new(x, scale_y / 2.0, z),
                scale_y,
                pulse: 1.0,
                material,
            });
        }

        resources.acquire(ResourceKind::Geometry, "road")?;
        resources.acquire(ResourceKind::Material, "road")?;
        resources.acquire(ResourceKind::Geometry, "neon-path")?;
        resources.acquire(ResourceKind::Material, "neon-path")?;

        let mut points = Vec::with_capacity(config.star_count);
        for _ in 0..config.star_count {
            let x = (rng.gen::<f64>() - 0.5) * config.star_spread;
            let y = rng.gen::<f64>() * config.star_band + config.star_floor;
            let z = (rng.gen::<f64>() - 0.5) * config.star_spread;
            points.push(Vector3::new(x, y, z));
        }

        resources.acquire(ResourceKind::Geometry, "starfield")?;
        resources.acquire(ResourceKind::Material, "starfield")?;

        let [from, to] = PATH_ENDPOINTS;
        let camera = Camera::perspective(
            CAMERA_FOV_DEG,
            viewport.aspect(),
            CAMERA_NEAR,
            CAMERA_FAR,
            Vector3::from(CAMERA_POSITION),
        );

        info!(
            buildings = buildings.len(),
            stars = points.len(),
            resources = resources.len(),
            %viewport,
            "city scene ready"
        );

        Ok(Self {
            elapsed: 0.0,
            camera,
            viewport,
            ground: Ground {
                size: 120.0,
                segments: 20,
                color: 0x0A0F2C,
                opacity: 0.35,
            },
            road: Road {
                width: 90.0,
                depth: 6.0,
                z: 10.0,
                color: 0x0D132E,
            },
            buildings,
            path: NeonPath {
                from: Vector3::from(from),
                to: Vector3::from(to),
                color: 0xFF6EC7,
                opacity: 0.8,
            },
            stars: Starfield {
                points,
                color: 0x4FD1C5,
                point_size: 0.6,
                yaw: 0.0,
            },
            resources,
        })
    }

    pub fn buildings(&self) -> &[Building] {
        &self.buildings
    }

    pub fn path(&self) -> &NeonPath {
        &self.path
    }

    pub fn stars(&self) -> &Starfield {
        &self.stars
    }

    pub fn ground(&self) -> &Ground {
        &self.ground
    }

    pub fn road(&self) -> &Road {
        &self.road
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// Number of rendering resources currently held.
    pub fn resource_count(&self) -> usize {
        self.resources.len()
    }

    /// Material handle of building `index`.
    pub fn building_material(&self, index: usize) -> Option<ResourceId> {
        self.buildings.get(index).map(|b| b.material)
    }
}

impl<B: RenderBackend> Animator for SceneState<B> {
    fn step(&mut self, elapsed_secs: f64) {
        let t = elapsed_secs;
        for (idx, building) in self.buildings.iter_mut().enumerate() {
            let i = idx as f64;
            building.pulse = (t * 2.0 + i * 0.4).sin() * 0.5 + 0.75;
            building.scale_y = ((t + i).sin() + 1.5) * 3.0;
            building.position.y = building.scale_y / 2.0;
        }

        self.path.opacity = 0.6 + (t * 2.0).sin() * 0.3;
        self.stars.yaw = t * 0.02;
        self.elapsed = t;
    }

    fn on_resize(&mut self, width: u32, height: u32) -> Result<(), SceneError> {
        let viewport = Viewport::new(width, height)?;
        self.resources.backend_mut().set_output_size(viewport);
        self.camera.set_aspect(viewport.aspect());
        self.viewport = viewport;
        debug!(%viewport, "city scene resized");
        Ok(())
    }

    fn camera(&self) -> &Camera {
        &self.camera
    }

    fn sample(&self) -> FrameSample {
        FrameSample::City(CityFrame {
            elapsed: self.elapsed,
            buildings: self
                .buildings
                .iter()
                .map(|b| BuildingFrame {
                    x: b.position.x,
                    y: b.position.y,
                    z: b.position.z,
                    scale_y: b.scale_y,
                    pulse: b.pulse,
                })
                .collect(),
            path_opacity: self.path.opacity,
            starfield_yaw: self.stars.yaw,
        })
    }

    fn teardown(mut self) -> usize {
        let released = self.resources.release_all();
        info!(released, "city scene torn down");
        released
    }
}
