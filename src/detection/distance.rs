// src/detection/distance.rs
use crate::types::SonarConfig;

/// Ultrasonic echo width is measured in clock edges; sound covers one inch
/// of round trip in 147 us.
const US_PER_INCH_ROUND_TRIP: f64 = 147.0;
const CM_PER_INCH: f64 = 2.54;

/// Stop-distance override fed by the sonar.
#[derive(Debug, Clone, Copy)]
pub struct DistanceGuard {
    cm_per_edge: f64,
    stop_distance_cm: f64,
}

impl DistanceGuard {
    pub fn new(config: &SonarConfig) -> Self {
        let us_per_edge = 1_000_000.0 / config.clock_hz;
        Self {
            cm_per_edge: us_per_edge * CM_PER_INCH / US_PER_INCH_ROUND_TRIP,
            stop_distance_cm: config.stop_distance_cm,
        }
    }

    pub fn distance_cm(&self, clock_edges: u32) -> f64 {
        clock_edges as f64 * self.cm_per_edge
    }

    pub fn too_close(&self, distance_cm: f64) -> bool {
        distance_cm < self.stop_distance_cm
    }
}
