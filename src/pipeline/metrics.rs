// src/pipeline/metrics.rs
//
// Loop counters. Cloned handles share the same counters, so the summary can
// be read from outside the loop thread.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone)]
pub struct LoopMetrics {
    pub total_frames: Arc<AtomicU64>,
    pub held_frames: Arc<AtomicU64>,
    pub left_near_misses: Arc<AtomicU64>,
    pub right_near_misses: Arc<AtomicU64>,
    pub clamped_frames: Arc<AtomicU64>,
    pub obstruction_frames: Arc<AtomicU64>,
    pub brake_engagements: Arc<AtomicU64>,
    pub distance_stops: Arc<AtomicU64>,
    pub actuator_errors: Arc<AtomicU64>,
    pub processed_frames: Arc<AtomicU64>,
    pub processing_total_us: Arc<AtomicU64>,
    pub started_at: Instant,
}

impl LoopMetrics {
    pub fn new() -> Self {
        Self {
            total_frames: Arc::new(AtomicU64::new(0)),
            held_frames: Arc::new(AtomicU64::new(0)),
            left_near_misses: Arc::new(AtomicU64::new(0)),
            right_near_misses: Arc::new(AtomicU64::new(0)),
            clamped_frames: Arc::new(AtomicU64::new(0)),
            obstruction_frames: Arc::new(AtomicU64::new(0)),
            brake_engagements: Arc::new(AtomicU64::new(0)),
            distance_stops: Arc::new(AtomicU64::new(0)),
            actuator_errors: Arc::new(AtomicU64::new(0)),
            processed_frames: Arc::new(AtomicU64::new(0)),
            processing_total_us: Arc::new(AtomicU64::new(0)),
            started_at: Instant::now(),
        }
    }

    pub fn inc(&self, counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Adds one frame's processing time (acquisition excluded).
    pub fn record_processing(&self, duration_us: u64) {
        self.processing_total_us.fetch_add(duration_us, Ordering::Relaxed);
        self.processed_frames.fetch_add(1, Ordering::Relaxed);
    }

    pub fn avg_processing_us(&self) -> f64 {
        let frames = self.processed_frames.load(Ordering::Relaxed);
        if frames == 0 {
            return 0.0;
        }
        self.processing_total_us.load(Ordering::Relaxed) as f64 / frames as f64
    }

    pub fn fps(&self) -> f64 {
        let elapsed = self.started_at.elapsed().as_secs_f64();
        if elapsed < 0.01 {
            return 0.0;
        }
        self.total_frames.load(Ordering::Relaxed) as f64 / elapsed
    }

    pub fn summary(&self, dropped_frames: u64, dropped_diagnostics: u64) -> LoopSummary {
        LoopSummary {
            total_frames: self.total_frames.load(Ordering::Relaxed),
            fps: self.fps(),
            held_frames: self.held_frames.load(Ordering::Relaxed),
            left_near_misses: self.left_near_misses.load(Ordering::Relaxed),
            right_near_misses: self.right_near_misses.load(Ordering::Relaxed),
            clamped_frames: self.clamped_frames.load(Ordering::Relaxed),
            obstruction_frames: self.obstruction_frames.load(Ordering::Relaxed),
            brake_engagements: self.brake_engagements.load(Ordering::Relaxed),
            distance_stops: self.distance_stops.load(Ordering::Relaxed),
            actuator_errors: self.actuator_errors.load(Ordering::Relaxed),
            avg_processing_us: self.avg_processing_us(),
            dropped_frames,
            dropped_diagnostics,
            elapsed_secs: self.started_at.elapsed().as_secs_f64(),
        }
    }
}

impl Default for LoopMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct LoopSummary {
    pub total_frames: u64,
    pub fps: f64,
    pub held_frames: u64,
    pub left_near_misses: u64,
    pub right_near_misses: u64,
    pub clamped_frames: u64,
    pub obstruction_frames: u64,
    pub brake_engagements: u64,
    pub distance_stops: u64,
    pub actuator_errors: u64,
    pub avg_processing_us: f64,
    pub dropped_frames: u64,
    pub dropped_diagnostics: u64,
    pub elapsed_secs: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn processing_time_is_averaged_over_frames() {
        let metrics = LoopMetrics::new();
        assert_eq!(metrics.avg_processing_us(), 0.0);
        metrics.record_processing(1_000);
        metrics.record_processing(3_000);
        assert_eq!(metrics.avg_processing_us(), 2_000.0);
    }

    #[test]
    fn summary_serializes_counters() {
        let metrics = LoopMetrics::new();
        metrics.inc(&metrics.total_frames);
        metrics.inc(&metrics.held_frames);
        let json = serde_json::to_value(metrics.summary(2, 1)).unwrap();
        assert_eq!(json["total_frames"], 1);
        assert_eq!(json["held_frames"], 1);
        assert_eq!(json["dropped_frames"], 2);
        assert_eq!(json["dropped_diagnostics"], 1);
    }
}
