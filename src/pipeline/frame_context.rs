// src/pipeline/frame_context.rs
//
// Everything computed for one frame. Built fresh every iteration; only the
// previous angle and speed come from the loop's carried state.

use crate::detection::{
    BinaryEdgeImage, BoundingBox, GateDecision, LaneEstimate, SideContributions, SteeringAngle,
};
use crate::hardware::DriveCommand;
use crate::types::Frame;

#[derive(Debug, Clone)]
pub struct FrameContext {
    pub frame_index: u64,
    pub frame: Frame,
    pub previous_angle: SteeringAngle,
    pub previous_speed: DriveCommand,

    // Derived inputs
    pub edges: Option<BinaryEdgeImage>,
    pub classifier_input: Option<Frame>,

    // Lane estimate and steering
    pub estimate: Option<LaneEstimate>,
    pub left: SideContributions,
    pub right: SideContributions,
    pub fused: Option<i32>,
    pub angle: SteeringAngle,

    // Obstruction and speed
    pub candidates: Vec<BoundingBox>,
    pub obstruction_present: bool,
    pub gate: GateDecision,
    pub distance_cm: Option<f64>,
    pub speed: DriveCommand,
}

impl FrameContext {
    pub fn new(
        frame_index: u64,
        frame: Frame,
        previous_angle: SteeringAngle,
        previous_speed: DriveCommand,
    ) -> Self {
        Self {
            frame_index,
            frame,
            previous_angle,
            previous_speed,
            edges: None,
            classifier_input: None,
            estimate: None,
            left: SideContributions::default(),
            right: SideContributions::default(),
            fused: None,
            angle: previous_angle,
            candidates: Vec::new(),
            obstruction_present: false,
            gate: GateDecision::Cruise,
            distance_cm: None,
            speed: previous_speed,
        }
    }

    /// No lane edge on either near band; the command was held.
    pub fn held(&self) -> bool {
        self.fused.is_none()
    }

    /// The fused value fell outside the servo range.
    pub fn clamped(&self) -> bool {
        self.fused.is_some_and(|raw| raw != self.angle.get())
    }
}
