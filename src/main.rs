// src/main.rs

mod classifier;
mod config;
mod debug;
mod detection;
mod frame_source;
mod hardware;
mod pipeline;
mod preprocessing;
mod types;

use anyhow::{bail, Context, Result};
use clap::Parser;
use classifier::NullClassifier;
use hardware::{DistanceSensor, SonarDevice};
use pipeline::{ControlLoop, LoopParts, ShutdownToken};
use preprocessing::GradientEdgeExtractor;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use types::{Config, DiagnosticsLevel, SourceKind};

/// Exit status after a forced stop on interrupt.
const INTERRUPTED_EXIT: i32 = 130;

#[derive(Debug, Parser)]
#[command(name = "lane-pilot", about = "Camera-guided lane follower")]
struct Cli {
    /// YAML configuration file
    #[arg(long, default_value = "config.yaml")]
    config: String,

    /// Diagnostics: 0 off, 1 text trace, 2 overlay images, 3 everything
    #[arg(long)]
    verbosity: Option<u8>,

    /// Frames to process; 0 runs until interrupted
    #[arg(long)]
    iterations: Option<u64>,

    /// Cruise speed for both wheels
    #[arg(long)]
    speed: Option<u16>,

    /// Drive direction bit (0 or 1)
    #[arg(long)]
    direction: Option<u8>,

    /// Sonar stop distance in centimetres
    #[arg(long)]
    stop_distance: Option<f64>,

    /// Serve this image on every frame instead of reading the camera
    #[arg(long)]
    still_image: Option<String>,
}

impl Cli {
    fn apply(&self, config: &mut Config) -> Result<()> {
        if let Some(verbosity) = self.verbosity {
            config.diagnostics.level = match verbosity {
                0 => DiagnosticsLevel::Off,
                1 => DiagnosticsLevel::Text,
                2 => DiagnosticsLevel::Image,
                _ => DiagnosticsLevel::Full,
            };
        }
        if let Some(iterations) = self.iterations {
            config.control.iterations = (iterations > 0).then_some(iterations);
        }
        if let Some(speed) = self.speed {
            config.drive.cruise_speed = speed;
        }
        if let Some(direction) = self.direction {
            config.drive.direction = direction;
        }
        if let Some(distance) = self.stop_distance {
            match config.sonar.as_mut() {
                Some(sonar) => sonar.stop_distance_cm = distance,
                None => bail!("--stop-distance needs a sonar section in the config"),
            }
        }
        if let Some(path) = &self.still_image {
            config.source.kind = SourceKind::Still;
            config.source.path = path.clone();
        }
        Ok(())
    }
}

/// Filter directive for this crate. Per-frame traces are debug lines, so a
/// text diagnostics level lifts a quieter configured level to debug.
fn log_directive(config: &Config) -> String {
    let level = config.logging.level.to_ascii_lowercase();
    let quieter_than_debug = matches!(level.as_str(), "error" | "warn" | "info");
    if config.diagnostics.level >= DiagnosticsLevel::Text && quieter_than_debug {
        "lane_pilot=debug".to_string()
    } else {
        format!("lane_pilot={}", level)
    }
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_directive(config)));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load(&cli.config)?;
    cli.apply(&mut config)?;
    init_tracing(&config);

    info!("🚗 Lane pilot starting");
    config.validate().context("invalid configuration")?;
    info!("✓ Configuration loaded from {}", cli.config);
    info!(
        "Steering {}..{} (centre {}), cruise speed {}, diagnostics {:?}",
        config.steering.left_limit,
        config.steering.right_limit,
        (config.steering.left_limit + config.steering.right_limit) / 2,
        config.drive.cruise_speed,
        config.diagnostics.level
    );

    // Everything is opened before the first frame; any failure ends here.
    let source = frame_source::open(&config)?;
    info!("✓ Frame source ready ({:?} {})", config.source.kind, config.source.path);

    let sensor = match &config.sonar {
        Some(sonar) => {
            let device = SonarDevice::open(&sonar.path)?;
            info!("✓ Sonar ready (stop below {:.1} cm)", sonar.stop_distance_cm);
            Some(Box::new(device) as Box<dyn DistanceSensor + Send>)
        }
        None => None,
    };

    let session = Arc::new(hardware::open_session(&config)?);
    info!("✓ Actuators ready");

    let parts = LoopParts {
        source,
        extractor: Box::new(GradientEdgeExtractor::default()),
        classifier: Box::new(NullClassifier),
        sensor,
    };
    let mut control = ControlLoop::new(&config, parts, Arc::clone(&session))?;

    let token = ShutdownToken::new();
    {
        let token = token.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    warn!("Interrupt received, stopping");
                    token.request();
                }
                Err(e) => error!("Failed to listen for interrupt: {}", e),
            }
        });
    }

    let loop_token = token.clone();
    let mut handle = tokio::task::spawn_blocking(move || control.run(&loop_token));
    let grace = Duration::from_millis(config.control.shutdown_grace_ms);

    let result = tokio::select! {
        joined = &mut handle => joined.context("control loop thread panicked")?,
        _ = async {
            token.requested().await;
            tokio::time::sleep(grace).await;
        } => {
            error!(
                "Control loop still running {} ms after interrupt; parking actuators",
                grace.as_millis()
            );
            session.shutdown();
            std::process::exit(INTERRUPTED_EXIT);
        }
    };

    match result {
        Ok(summary) => {
            info!("Loop summary: {}", serde_json::to_string(&summary)?);
            Ok(())
        }
        Err(e) => {
            error!("Control loop failed: {:#}", e);
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SonarConfig;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("lane-pilot").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn overrides_replace_config_values() {
        let mut config = Config::default();
        parse(&["--verbosity", "2", "--speed", "35", "--direction", "1", "--iterations", "7"])
            .apply(&mut config)
            .unwrap();

        assert_eq!(config.diagnostics.level, DiagnosticsLevel::Image);
        assert_eq!(config.drive.cruise_speed, 35);
        assert_eq!(config.drive.direction, 1);
        assert_eq!(config.control.iterations, Some(7));
    }

    #[test]
    fn zero_iterations_runs_until_interrupted() {
        let mut config = Config::default();
        parse(&["--iterations", "0"]).apply(&mut config).unwrap();
        assert_eq!(config.control.iterations, None);
    }

    #[test]
    fn still_image_switches_source() {
        let mut config = Config::default();
        parse(&["--still-image", "track.png"]).apply(&mut config).unwrap();
        assert_eq!(config.source.kind, SourceKind::Still);
        assert_eq!(config.source.path, "track.png");
    }

    #[test]
    fn stop_distance_requires_sonar() {
        let mut config = Config::default();
        assert!(parse(&["--stop-distance", "30"]).apply(&mut config).is_err());

        config.sonar = Some(SonarConfig {
            path: "/dev/sonar".to_string(),
            clock_hz: 50e6,
            stop_distance_cm: 20.0,
            apply_stop: false,
        });
        parse(&["--stop-distance", "30"]).apply(&mut config).unwrap();
        assert_eq!(config.sonar.unwrap().stop_distance_cm, 30.0);
    }

    #[test]
    fn text_diagnostics_lift_log_level_to_debug() {
        let mut config = Config::default();
        assert_eq!(log_directive(&config), "lane_pilot=info");

        parse(&["--verbosity", "1"]).apply(&mut config).unwrap();
        assert_eq!(log_directive(&config), "lane_pilot=debug");
        assert_eq!(
            EnvFilter::new(log_directive(&config)).max_level_hint(),
            Some(tracing::level_filters::LevelFilter::DEBUG)
        );

        config.logging.level = "trace".to_string();
        assert_eq!(log_directive(&config), "lane_pilot=trace");
    }

    #[test]
    fn bad_direction_is_caught_by_validation() {
        let mut config = Config::default();
        parse(&["--direction", "2"]).apply(&mut config).unwrap();
        assert!(config.validate().is_err());
    }
}
