use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub frame: FrameConfig,
    pub source: SourceConfig,
    pub steering: SteeringConfig,
    pub scan_rows: ScanRowsConfig,
    pub obstruction: ObstructionConfig,
    pub drive: DriveConfig,
    #[serde(default)]
    pub sonar: Option<SonarConfig>,
    #[serde(rename = "loop")]
    pub control: LoopConfig,
    #[serde(default)]
    pub acquisition: AcquisitionConfig,
    #[serde(default)]
    pub diagnostics: DiagnosticsConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameConfig {
    pub width: usize,
    pub height: usize,
    pub channels: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Raw character device producing `height * width * channels` bytes per read.
    Device,
    /// A single still image served on every acquisition.
    Still,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub kind: SourceKind,
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SteeringConfig {
    pub left_limit: i32,
    pub right_limit: i32,
    pub agreement_threshold: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanRowsConfig {
    pub near: ScanRowConfig,
    pub mid: ScanRowConfig,
    pub far: ScanRowConfig,
}

/// One scan row, expressed the way it is calibrated on the vehicle: the
/// expected lane-edge column on each side plus how far the search band
/// reaches towards the outside of the frame and towards the lane centre.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanRowConfig {
    pub y: usize,
    pub left_mean: i32,
    pub right_mean: i32,
    pub outer_offset: i32,
    pub inner_offset: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObstructionConfig {
    pub sign_min_height: i32,
    pub sign_max_height: i32,
    pub brake_frames: u64,
    #[serde(default)]
    pub apply_braking: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriveConfig {
    pub cruise_speed: u16,
    pub direction: u8,
    pub servo_path: String,
    pub motors_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SonarConfig {
    pub path: String,
    pub clock_hz: f64,
    pub stop_distance_cm: f64,
    #[serde(default)]
    pub apply_stop: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoopConfig {
    /// `None` runs until interrupted.
    #[serde(default)]
    pub iterations: Option<u64>,
    pub shutdown_grace_ms: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AcquisitionConfig {
    #[serde(default)]
    pub threaded: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticsLevel {
    #[default]
    Off,
    /// Per-frame trace lines.
    Text,
    /// Trace lines plus one annotated overlay per frame.
    Image,
    /// Everything, including the edge image and classifier region.
    Full,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticsConfig {
    #[serde(default)]
    pub level: DiagnosticsLevel,
    pub output_dir: String,
    pub queue_depth: usize,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            level: DiagnosticsLevel::Off,
            output_dir: "diagnostics".to_string(),
            queue_depth: 4,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

#[derive(Debug, Clone)]
pub struct Frame {
    pub data: Vec<u8>,
    pub width: usize,
    pub height: usize,
    pub channels: usize,
}

impl Frame {
    pub fn pixel(&self, x: usize, y: usize) -> &[u8] {
        let start = (y * self.width + x) * self.channels;
        &self.data[start..start + self.channels]
    }
}
