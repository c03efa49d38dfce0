use crate::types::{
    AcquisitionConfig, Config, DiagnosticsConfig, DriveConfig, FrameConfig, LoggingConfig,
    LoopConfig, ObstructionConfig, ScanRowConfig, ScanRowsConfig, SourceConfig, SourceKind,
    SteeringConfig,
};
use anyhow::{bail, Context, Result};
use std::fs;

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let contents =
            fs::read_to_string(path).with_context(|| format!("reading config {}", path))?;
        let config: Config =
            serde_yaml::from_str(&contents).with_context(|| format!("parsing config {}", path))?;
        Ok(config)
    }

    /// Rejects configurations the control loop cannot run safely with.
    /// Called once at startup; every failure here is fatal.
    pub fn validate(&self) -> Result<()> {
        let steering = &self.steering;
        if steering.left_limit >= steering.right_limit {
            bail!(
                "steering left_limit ({}) must be below right_limit ({})",
                steering.left_limit,
                steering.right_limit
            );
        }
        if steering.agreement_threshold < 0 {
            bail!("steering agreement_threshold must not be negative");
        }

        if self.drive.direction > 1 {
            bail!("bad direction {}: expected 0 or 1", self.drive.direction);
        }

        if self.frame.width == 0 || self.frame.height == 0 {
            bail!("frame dimensions must be non-zero");
        }
        if !matches!(self.frame.channels, 1 | 3 | 4) {
            bail!("unsupported channel count {}", self.frame.channels);
        }

        for (name, row) in [
            ("near", &self.scan_rows.near),
            ("mid", &self.scan_rows.mid),
            ("far", &self.scan_rows.far),
        ] {
            validate_row(name, row, &self.frame)?;
        }

        let obstruction = &self.obstruction;
        if obstruction.sign_min_height > obstruction.sign_max_height {
            bail!(
                "sign_min_height ({}) exceeds sign_max_height ({})",
                obstruction.sign_min_height,
                obstruction.sign_max_height
            );
        }
        if obstruction.brake_frames == 0 {
            bail!("brake_frames must be at least 1");
        }

        if let Some(sonar) = &self.sonar {
            if sonar.clock_hz <= 0.0 {
                bail!("sonar clock_hz must be positive");
            }
        }

        if self.diagnostics.queue_depth == 0 {
            bail!("diagnostics queue_depth must be at least 1");
        }

        Ok(())
    }
}

fn validate_row(name: &str, row: &ScanRowConfig, frame: &FrameConfig) -> Result<()> {
    if row.y >= frame.height {
        bail!("{} scan row y={} lies outside the frame", name, row.y);
    }
    if row.outer_offset <= 0 || row.inner_offset <= 0 {
        bail!("{} scan row offsets must be positive", name);
    }

    let left_start = row.left_mean - row.outer_offset;
    let left_end = row.left_mean + row.inner_offset;
    let right_start = row.right_mean - row.inner_offset;
    let right_end = row.right_mean + row.outer_offset;

    if left_start < 0 || right_end >= frame.width as i32 {
        bail!(
            "{} scan row bands [{}, {}] / [{}, {}] exceed frame width {}",
            name,
            left_start,
            left_end,
            right_start,
            right_end,
            frame.width
        );
    }
    if left_end >= right_start {
        bail!(
            "{} scan row bands overlap: left ends at {}, right starts at {}",
            name,
            left_end,
            right_start
        );
    }
    Ok(())
}

/// Calibration of the reference vehicle: 1280x720 RGB camera, servo range
/// 220..380, three scan rows tuned on the test track.
impl Default for Config {
    fn default() -> Self {
        Self {
            frame: FrameConfig {
                width: 1280,
                height: 720,
                channels: 3,
            },
            source: SourceConfig {
                kind: SourceKind::Device,
                path: "/dev/video".to_string(),
            },
            steering: SteeringConfig {
                left_limit: 220,
                right_limit: 380,
                agreement_threshold: 15,
            },
            scan_rows: ScanRowsConfig {
                near: ScanRowConfig {
                    y: 560,
                    left_mean: 172,
                    right_mean: 1100,
                    outer_offset: 100,
                    inner_offset: 280,
                },
                mid: ScanRowConfig {
                    y: 440,
                    left_mean: 304,
                    right_mean: 963,
                    outer_offset: 100,
                    inner_offset: 100,
                },
                far: ScanRowConfig {
                    y: 300,
                    left_mean: 481,
                    right_mean: 794,
                    outer_offset: 100,
                    inner_offset: 100,
                },
            },
            obstruction: ObstructionConfig {
                sign_min_height: 150,
                sign_max_height: 200,
                brake_frames: 5,
                apply_braking: false,
            },
            drive: DriveConfig {
                cruise_speed: 0,
                direction: 0,
                servo_path: "/dev/servo".to_string(),
                motors_path: "/dev/motors".to_string(),
            },
            sonar: None,
            control: LoopConfig {
                iterations: Some(1),
                shutdown_grace_ms: 500,
            },
            acquisition: AcquisitionConfig::default(),
            diagnostics: DiagnosticsConfig::default(),
            logging: LoggingConfig {
                level: "info".to_string(),
            },
        }
    }
}
