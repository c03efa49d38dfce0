// src/pipeline/control_loop.rs
//
// Per-frame control: frame in, {angle, speed} out. Single-threaded; the only
// state carried between frames is the previous command and the brake gate.

use super::frame_context::FrameContext;
use super::metrics::{LoopMetrics, LoopSummary};
use super::shutdown::ShutdownToken;
use crate::classifier::ObstructionClassifier;
use crate::debug::{edges_to_gray, frame_to_rgb, render_overlay, DiagnosticImage, DiagnosticsWriter};
use crate::detection::{
    DistanceGuard, GateDecision, LaneEstimator, ObstructionGate, RowLevel, ScanRows, Side,
    SteeringAngle, SteeringFusion, SteeringLimits, SteeringMapper,
};
use crate::frame_source::FrameSource;
use crate::hardware::{ActuatorSession, DistanceSensor, DriveCommand};
use crate::preprocessing::{classifier_region, EdgeExtractor, SelectionMask};
use crate::types::{Config, DiagnosticsLevel, Frame};
use anyhow::Result;
use image::DynamicImage;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// The pluggable ends of the loop.
pub struct LoopParts {
    pub source: Box<dyn FrameSource + Send>,
    pub extractor: Box<dyn EdgeExtractor + Send>,
    pub classifier: Box<dyn ObstructionClassifier + Send>,
    pub sensor: Option<Box<dyn DistanceSensor + Send>>,
}

pub struct ControlLoop {
    parts: LoopParts,
    actuators: Arc<ActuatorSession>,

    limits: SteeringLimits,
    estimator: LaneEstimator,
    mask: SelectionMask,
    mapper: SteeringMapper,
    fusion: SteeringFusion,
    gate: ObstructionGate,
    distance: Option<DistanceGuard>,

    apply_braking: bool,
    apply_stop: bool,
    cruise: DriveCommand,
    iterations: Option<u64>,

    diagnostics_level: DiagnosticsLevel,
    diagnostics: Option<DiagnosticsWriter>,
    metrics: LoopMetrics,

    previous_angle: SteeringAngle,
    previous_speed: DriveCommand,
}

impl ControlLoop {
    pub fn new(config: &Config, parts: LoopParts, actuators: Arc<ActuatorSession>) -> Result<Self> {
        let limits = SteeringLimits::from_config(&config.steering);
        let rows = ScanRows::from_config(&config.scan_rows);

        let diagnostics = if config.diagnostics.level >= DiagnosticsLevel::Image {
            Some(DiagnosticsWriter::spawn(
                &config.diagnostics.output_dir,
                config.diagnostics.queue_depth,
            )?)
        } else {
            None
        };

        let distance = match (&config.sonar, &parts.sensor) {
            (Some(sonar), Some(_)) => Some(DistanceGuard::new(sonar)),
            _ => None,
        };

        Ok(Self {
            limits,
            estimator: LaneEstimator::new(rows),
            mask: SelectionMask::from_rows(&rows),
            mapper: SteeringMapper::new(limits),
            fusion: SteeringFusion::from_config(&config.steering),
            gate: ObstructionGate::new(&config.obstruction),
            distance,
            apply_braking: config.obstruction.apply_braking,
            apply_stop: config.sonar.as_ref().is_some_and(|s| s.apply_stop),
            cruise: DriveCommand::uniform(config.drive.cruise_speed),
            iterations: config.control.iterations,
            diagnostics_level: config.diagnostics.level,
            diagnostics,
            metrics: LoopMetrics::new(),
            previous_angle: actuators.center(),
            previous_speed: DriveCommand::STOP,
            parts,
            actuators,
        })
    }

    #[cfg(test)]
    pub fn metrics(&self) -> &LoopMetrics {
        &self.metrics
    }

    /// Runs until the iteration limit, a shutdown request, or a frame
    /// acquisition failure. The actuators are parked on every exit path.
    pub fn run(&mut self, shutdown: &ShutdownToken) -> Result<LoopSummary> {
        match self.iterations {
            Some(limit) => info!("🚗 Control loop starting ({} iterations)", limit),
            None => info!("🚗 Control loop starting (until interrupted)"),
        }

        // Wheels straight before the first frame; motors untouched until
        // the first command.
        if let Err(e) = self.actuators.write_steering(self.previous_angle) {
            warn!("Initial centring failed: {:#}", e);
        }

        let outcome = self.drive(shutdown);
        self.actuators.shutdown();

        let summary = self.summary();
        info!(
            "Control loop finished: {} frames, {:.1} fps, {} held",
            summary.total_frames, summary.fps, summary.held_frames
        );
        outcome.map(|()| summary)
    }

    fn drive(&mut self, shutdown: &ShutdownToken) -> Result<()> {
        let mut frame_index = 0u64;
        loop {
            if shutdown.is_requested() {
                info!("Shutdown requested after {} frames", frame_index);
                return Ok(());
            }
            if self.iterations.is_some_and(|limit| frame_index >= limit) {
                return Ok(());
            }

            let frame = self
                .parts
                .source
                .acquire()
                .map_err(|e| e.context(format!("acquiring frame {}", frame_index)))?;

            let started = Instant::now();
            self.step(frame_index, frame);
            self.metrics
                .record_processing(started.elapsed().as_micros() as u64);
            frame_index += 1;
        }
    }

    /// Processes one frame and emits its command. Never fails: missing
    /// estimates fall back, and actuator errors are logged.
    pub fn step(&mut self, frame_index: u64, frame: Frame) -> FrameContext {
        let mut ctx = FrameContext::new(frame_index, frame, self.previous_angle, self.previous_speed);
        self.metrics.inc(&self.metrics.total_frames);

        self.estimate_lane(&mut ctx);
        self.steer(&mut ctx);
        self.check_obstruction(&mut ctx);
        self.check_distance(&mut ctx);
        self.choose_speed(&mut ctx);

        if let Err(e) = self.actuators.emit(ctx.angle, ctx.speed) {
            self.metrics.inc(&self.metrics.actuator_errors);
            warn!("Frame {}: actuator write failed: {:#}", frame_index, e);
        }
        self.previous_angle = ctx.angle;
        self.previous_speed = ctx.speed;

        self.trace(&ctx);
        self.submit_diagnostics(&ctx);
        ctx
    }

    fn estimate_lane(&mut self, ctx: &mut FrameContext) {
        let mut edges = match self.parts.extractor.extract(&ctx.frame) {
            Ok(edges) => edges,
            Err(e) => {
                warn!("Frame {}: edge extraction failed: {:#}", ctx.frame_index, e);
                return;
            }
        };
        self.mask.apply(&mut edges);
        ctx.estimate = Some(self.estimator.estimate(&edges));
        ctx.edges = Some(edges);
    }

    fn steer(&mut self, ctx: &mut FrameContext) {
        if let Some(estimate) = &ctx.estimate {
            let rows = self.estimator.rows();
            ctx.left = self.mapper.contributions(estimate, rows, Side::Left);
            ctx.right = self.mapper.contributions(estimate, rows, Side::Right);
        }
        if ctx.left.near.is_none() {
            self.metrics.inc(&self.metrics.left_near_misses);
        }
        if ctx.right.near.is_none() {
            self.metrics.inc(&self.metrics.right_near_misses);
        }

        ctx.fused = self.fusion.fuse(ctx.left.near, ctx.right.near);
        let raw = ctx.fused.unwrap_or(ctx.previous_angle.get());
        ctx.angle = self.limits.clamp(raw);
        if ctx.held() {
            self.metrics.inc(&self.metrics.held_frames);
        }
        if ctx.clamped() {
            self.metrics.inc(&self.metrics.clamped_frames);
        }
    }

    fn check_obstruction(&mut self, ctx: &mut FrameContext) {
        let region = classifier_region(&ctx.frame);
        ctx.candidates = match self.parts.classifier.detect(&region) {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!("Frame {}: classifier failed: {:#}", ctx.frame_index, e);
                Vec::new()
            }
        };
        ctx.classifier_input = Some(region);

        ctx.obstruction_present = self.gate.detect(&ctx.candidates);
        if ctx.obstruction_present {
            self.metrics.inc(&self.metrics.obstruction_frames);
        }
        ctx.gate = self.gate.update(ctx.frame_index, ctx.obstruction_present);
        if ctx.gate == GateDecision::Engaged {
            self.metrics.inc(&self.metrics.brake_engagements);
        }
    }

    fn check_distance(&mut self, ctx: &mut FrameContext) {
        let (Some(guard), Some(sensor)) = (&self.distance, self.parts.sensor.as_mut()) else {
            return;
        };
        match sensor.read_echo_edges() {
            Ok(edges) => ctx.distance_cm = Some(guard.distance_cm(edges)),
            Err(e) => warn!("Frame {}: sonar read failed: {:#}", ctx.frame_index, e),
        }
    }

    fn choose_speed(&mut self, ctx: &mut FrameContext) {
        let braking = self.apply_braking && ctx.gate.is_braking();
        let too_close = match (&self.distance, ctx.distance_cm) {
            (Some(guard), Some(cm)) => guard.too_close(cm),
            _ => false,
        };
        if too_close {
            self.metrics.inc(&self.metrics.distance_stops);
        }

        ctx.speed = if braking || (self.apply_stop && too_close) {
            DriveCommand::STOP
        } else {
            self.cruise
        };

        if ctx.speed.is_stopped() != ctx.previous_speed.is_stopped() && !self.cruise.is_stopped() {
            if ctx.speed.is_stopped() {
                info!(
                    "Frame {}: stopping (brake {}, too close {})",
                    ctx.frame_index, braking, too_close
                );
            } else {
                info!("Frame {}: cruising at {:?}", ctx.frame_index, ctx.speed);
            }
        }
    }

    fn trace(&self, ctx: &FrameContext) {
        if self.diagnostics_level < DiagnosticsLevel::Text {
            return;
        }
        if let Some(edges) = &ctx.edges {
            debug!("frame {}: {} edge px on scan bands", ctx.frame_index, edges.edge_count());
        }
        if let Some(estimate) = &ctx.estimate {
            for level in RowLevel::ALL {
                let left = estimate.sample(Side::Left, level);
                let right = estimate.sample(Side::Right, level);
                debug!(
                    "frame {} {:?}: left {:?} px {:?} | right {:?} px {:?}",
                    ctx.frame_index, level, left.position, left.hits, right.position, right.hits
                );
            }
        }
        debug!(
            "frame {}: near L {:?} R {:?} (mid {:?}/{:?}, far {:?}/{:?}) fused {:?} -> angle {} (was {}), \
             speed {:?} (was {:?}), gate {:?}, distance {:?}",
            ctx.frame_index,
            ctx.left.near,
            ctx.right.near,
            ctx.left.mid,
            ctx.right.mid,
            ctx.left.far,
            ctx.right.far,
            ctx.fused,
            ctx.angle.get(),
            ctx.previous_angle.get(),
            ctx.speed,
            ctx.previous_speed,
            ctx.gate,
            ctx.distance_cm
        );
    }

    fn submit_diagnostics(&mut self, ctx: &FrameContext) {
        let Some(writer) = self.diagnostics.as_mut() else {
            return;
        };

        if let Some(estimate) = &ctx.estimate {
            let overlay = render_overlay(&ctx.frame, self.estimator.rows(), estimate);
            writer.submit(DiagnosticImage {
                file_name: format!("frame_{:06}_overlay.png", ctx.frame_index),
                image: DynamicImage::ImageRgb8(overlay),
            });
        }

        if self.diagnostics_level < DiagnosticsLevel::Full {
            return;
        }
        if let Some(edges) = &ctx.edges {
            writer.submit(DiagnosticImage {
                file_name: format!("frame_{:06}_edges.png", ctx.frame_index),
                image: DynamicImage::ImageLuma8(edges_to_gray(edges)),
            });
        }
        if let Some(region) = &ctx.classifier_input {
            writer.submit(DiagnosticImage {
                file_name: format!("frame_{:06}_classifier.png", ctx.frame_index),
                image: DynamicImage::ImageRgb8(frame_to_rgb(region)),
            });
        }
    }

    pub fn summary(&self) -> LoopSummary {
        self.metrics.summary(
            self.parts.source.dropped_frames(),
            self.diagnostics.as_ref().map_or(0, |w| w.dropped()),
        )
    }
}
