//! JSON recorder for harness runs.
//!
//! A recording holds every telemetry snapshot and a thinned sequence of frame
//! samples, so a run can be replayed or charted offline.

use neomiami_core::{FrameSample, Snapshot};
use neomiami_env::Viewport;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::time::Duration;

/// Complete recording of one harness run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recording {
    /// Variant name
    pub variant: String,

    /// Seed used
    pub seed: u64,

    /// Telemetry tick period in milliseconds
    pub tick_period_ms: u64,

    /// Frame rate the animator was stepped at
    pub fps: u32,

    /// Output surface size
    pub viewport: Viewport,

    /// Every snapshot, starting with the initial one
    pub snapshots: Vec<Snapshot>,

    /// Captured frame samples
    pub frames: Vec<FrameSample>,

    /// Final verdict
    pub passed: bool,
}

impl Recording {
    pub fn new(variant: &str, seed: u64, tick_period: Duration, fps: u32, viewport: Viewport) -> Self {
        Self {
            variant: variant.to_string(),
            seed,
            tick_period_ms: tick_period.as_millis() as u64,
            fps,
            viewport,
            snapshots: Vec::new(),
            frames: Vec::new(),
            passed: false,
        }
    }

    pub fn add_snapshot(&mut self, snapshot: Snapshot) {
        self.snapshots.push(snapshot);
    }

    pub fn add_frame(&mut self, frame: FrameSample) {
        self.frames.push(frame);
    }

    pub fn finalize(&mut self, passed: bool) {
        self.passed = passed;
    }

    /// Writes the recording as pretty JSON.
    pub fn write_to_file(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }

    /// Reads a recording back from disk.
    pub fn read_from_file(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use neomiami_core::{CubeFrame, TelemetrySimulator};

    #[test]
    fn test_recording_layout() {
        let mut sim = TelemetrySimulator::new(7);
        let mut recording = Recording::new(
            "cube",
            7,
            Duration::from_millis(3200),
            60,
            Viewport::default(),
        );
        recording.add_snapshot(sim.snapshot().clone());
        recording.add_snapshot(sim.tick().clone());
        recording.add_frame(FrameSample::Cube(CubeFrame {
            frame: 1,
            rotation_x: 0.01,
            rotation_y: 0.01,
        }));
        recording.finalize(true);

        let value = serde_json::to_value(&recording).unwrap();
        assert_eq!(value["variant"], "cube");
        assert_eq!(value["tick_period_ms"], 3200);
        assert_eq!(value["snapshots"].as_array().unwrap().len(), 2);
        assert_eq!(value["frames"][0]["variant"], "cube");
        assert_eq!(value["passed"], true);
    }

    #[test]
    fn test_recording_file_round_trip() {
        let path = std::env::temp_dir().join(format!("neomiami-rec-{}.json", std::process::id()));
        let mut recording = Recording::new("neo_miami", 1, Duration::from_millis(3200), 30, Viewport::default());
        recording.add_snapshot(TelemetrySimulator::new(1).snapshot().clone());

        recording.write_to_file(&path).unwrap();
        let loaded = Recording::read_from_file(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(loaded.seed, 1);
        assert_eq!(loaded.fps, 30);
        assert_eq!(loaded.snapshots, recording.snapshots);
    }

    #[test]
    fn test_recording_with_zero_viewport_is_rejected() {
        let path = std::env::temp_dir().join(format!("neomiami-zero-{}.json", std::process::id()));
        let recording = Recording::new("cube", 2, Duration::from_millis(3200), 60, Viewport::default());
        let mut value = serde_json::to_value(&recording).unwrap();
        value["viewport"] = serde_json::json!({ "width": 0, "height": 0 });
        std::fs::write(&path, value.to_string()).unwrap();

        let result = Recording::read_from_file(&path);
        std::fs::remove_file(&path).ok();

        assert!(result.is_err());
    }
}
