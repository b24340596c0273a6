//! Rerun bridge for the digital twin.
//!
//! Streams the city (or cube) and the telemetry to a Rerun viewer. Available
//! with the `visualization` feature; without it every call is a no-op.
//!
//! # What Gets Logged
//!
//! - Buildings as boxes, scaled and positioned per frame
//! - The starfield as points once, then a per-frame yaw transform
//! - The neon path as a line strip
//! - Every metric and the online sensor count as scalar timelines

#[cfg(feature = "visualization")]
use rerun::{
    Angle, Boxes3D, Color, LineStrips3D, Points3D, Position3D, Radius, RecordingStream,
    RotationAxisAngle, Transform3D,
};

use crate::animator::FrameSample;
use crate::scene::Starfield;
use crate::telemetry::Snapshot;

/// Axis and angle of the starfield's rotation for a frame, if it has one.
#[cfg_attr(not(feature = "visualization"), allow(dead_code))]
fn starfield_rotation(frame: &FrameSample) -> Option<([f32; 3], f32)> {
    match frame {
        FrameSample::City(city) => Some(([0.0, 1.0, 0.0], city.starfield_yaw as f32)),
        FrameSample::Cube(_) => None,
    }
}

/// Rerun logger for the twin.
pub struct TwinViewer {
    #[cfg(feature = "visualization")]
    rec: Option<RecordingStream>,

    /// Whether visualization is enabled
    enabled: bool,
}

impl TwinViewer {
    /// Creates a viewer with visualization disabled.
    pub fn disabled() -> Self {
        Self {
            #[cfg(feature = "visualization")]
            rec: None,
            enabled: false,
        }
    }

    /// Spawns a Rerun viewer and connects to it.
    #[cfg(feature = "visualization")]
    pub fn new(name: &str) -> Self {
        match rerun::RecordingStreamBuilder::new(name).spawn() {
            Ok(rec) => {
                tracing::info!("Rerun visualization enabled - open Rerun Viewer to see the twin");
                Self {
                    rec: Some(rec),
                    enabled: true,
                }
            }
            Err(e) => {
                tracing::warn!("Failed to initialize Rerun: {:?}", e);
                Self::disabled()
            }
        }
    }

    /// Returns a disabled viewer when the feature is off.
    #[cfg(not(feature = "visualization"))]
    pub fn new(_name: &str) -> Self {
        tracing::info!("Rerun visualization not available (compile with --features visualization)");
        Self::disabled()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Sets the animation time for subsequent logs.
    #[cfg(feature = "visualization")]
    pub fn set_time(&self, seconds: f64) {
        if let Some(ref rec) = self.rec {
            rec.set_time_seconds("twin_time", seconds);
        }
    }

    #[cfg(not(feature = "visualization"))]
    pub fn set_time(&self, _seconds: f64) {}

    /// Logs one frame sample.
    #[cfg(feature = "visualization")]
    pub fn log_frame(&self, frame: &FrameSample) {
        let Some(ref rec) = self.rec else { return };

        match frame {
            FrameSample::City(city) => {
                rec.set_time_seconds("twin_time", city.elapsed);

                let centers: Vec<[f32; 3]> = city
                    .buildings
                    .iter()
                    .map(|b| [b.x as f32, b.y as f32, b.z as f32])
                    .collect();
                // 4×8×4 box scaled on y
                let half_sizes: Vec<[f32; 3]> = city
                    .buildings
                    .iter()
                    .map(|b| [2.0, 4.0 * b.scale_y as f32, 2.0])
                    .collect();
                let colors: Vec<Color> = city
                    .buildings
                    .iter()
                    .map(|b| {
                        let glow = (b.pulse.clamp(0.0, 1.25) / 1.25 * 255.0) as u8;
                        Color::from_rgb(0x38, glow.max(0x5C), 0xD0)
                    })
                    .collect();

                let _ = rec.log(
                    "twin/buildings",
                    &Boxes3D::from_centers_and_half_sizes(centers, half_sizes).with_colors(colors),
                );

                let alpha = (city.path_opacity.clamp(0.0, 1.0) * 255.0) as u8;
                let [from, to] = crate::scene::PATH_ENDPOINTS;
                let _ = rec.log(
                    "twin/neon_path",
                    &LineStrips3D::new([[
                        [from[0] as f32, from[1] as f32, from[2] as f32],
                        [to[0] as f32, to[1] as f32, to[2] as f32],
                    ]])
                    .with_colors([Color::from_unmultiplied_rgba(0xFF, 0x6E, 0xC7, alpha)]),
                );

                if let Some((axis, yaw)) = starfield_rotation(frame) {
                    let _ = rec.log(
                        "twin/starfield",
                        &Transform3D::from_rotation(RotationAxisAngle::new(
                            axis,
                            Angle::from_radians(yaw),
                        )),
                    );
                }
            }
            FrameSample::Cube(cube) => {
                let _ = rec.log(
                    "twin/cube/rotation",
                    &rerun::Scalar::new(cube.rotation_y),
                );
            }
        }
    }

    #[cfg(not(feature = "visualization"))]
    pub fn log_frame(&self, _frame: &FrameSample) {}

    /// Logs the starfield points in their unrotated frame.
    ///
    /// The yaw arrives per frame as a transform on the same entity.
    #[cfg(feature = "visualization")]
    pub fn log_starfield(&self, stars: &Starfield) {
        if let Some(ref rec) = self.rec {
            let points: Vec<Position3D> = stars
                .points
                .iter()
                .map(|p| Position3D::new(p.x as f32, p.y as f32, p.z as f32))
                .collect();

            let _ = rec.log(
                "twin/starfield",
                &Points3D::new(points)
                    .with_colors([Color::from_rgb(0x4F, 0xD1, 0xC5)])
                    .with_radii([Radius::new_scene_units(stars.point_size as f32)]),
            );
        }
    }

    #[cfg(not(feature = "visualization"))]
    pub fn log_starfield(&self, _stars: &Starfield) {}

    /// Logs every metric and the online count as scalars.
    #[cfg(feature = "visualization")]
    pub fn log_snapshot(&self, snapshot: &Snapshot) {
        if let Some(ref rec) = self.rec {
            for metric in &snapshot.metrics {
                let _ = rec.log(
                    format!("telemetry/{:?}", metric.kind).to_lowercase(),
                    &rerun::Scalar::new(metric.value),
                );
            }
            let _ = rec.log(
                "telemetry/sensors_online",
                &rerun::Scalar::new(snapshot.online_count() as f64),
            );
        }
    }

    #[cfg(not(feature = "visualization"))]
    pub fn log_snapshot(&self, _snapshot: &Snapshot) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::TelemetrySimulator;

    #[test]
    fn test_disabled_viewer() {
        let viewer = TwinViewer::disabled();
        assert!(!viewer.is_enabled());

        // These should be no-ops
        viewer.set_time(1.0);
        viewer.log_snapshot(TelemetrySimulator::new(1).snapshot());
        viewer.log_frame(&FrameSample::Cube(crate::cube::CubeFrame {
            frame: 1,
            rotation_x: 0.01,
            rotation_y: 0.01,
        }));
    }

    #[test]
    fn test_starfield_rotation_follows_yaw() {
        let city = FrameSample::City(crate::scene::CityFrame {
            elapsed: 50.0,
            buildings: Vec::new(),
            path_opacity: 0.6,
            starfield_yaw: 1.0,
        });
        assert_eq!(starfield_rotation(&city), Some(([0.0, 1.0, 0.0], 1.0)));

        let cube = FrameSample::Cube(crate::cube::CubeFrame {
            frame: 1,
            rotation_x: 0.01,
            rotation_y: 0.01,
        });
        assert_eq!(starfield_rotation(&cube), None);

        // Logging a city frame without a viewer is a no-op
        TwinViewer::disabled().log_frame(&city);
    }
}
