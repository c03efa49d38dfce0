// src/detection/obstruction.rs
use super::types::BoundingBox;
use crate::types::ObstructionConfig;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObstructionState {
    Running,
    Braking { since_frame: u64 },
}

/// What the gate decided for the current frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Cruise,
    /// Rising edge this frame; braking starts now.
    Engaged,
    /// Still inside the braking window.
    Holding,
    /// Braking window elapsed this frame; back to cruise.
    Released,
}

impl GateDecision {
    pub fn is_braking(self) -> bool {
        matches!(self, GateDecision::Engaged | GateDecision::Holding)
    }
}

/// Stop-sign gate: a size band picks boxes at braking distance, then a
/// fixed-length brake window debounces the reaction.
pub struct ObstructionGate {
    min_height: i32,
    max_height: i32,
    brake_frames: u64,
    state: ObstructionState,
    previous_present: bool,
}

impl ObstructionGate {
    pub fn new(config: &ObstructionConfig) -> Self {
        Self {
            min_height: config.sign_min_height,
            max_height: config.sign_max_height,
            brake_frames: config.brake_frames,
            state: ObstructionState::Running,
            previous_present: false,
        }
    }

    #[cfg(test)]
    pub fn state(&self) -> ObstructionState {
        self.state
    }

    pub fn is_obstruction(&self, candidate: &BoundingBox) -> bool {
        (self.min_height..=self.max_height).contains(&candidate.height)
    }

    pub fn detect(&self, candidates: &[BoundingBox]) -> bool {
        candidates.iter().any(|c| self.is_obstruction(c))
    }

    /// Advances the brake state machine by one frame.
    ///
    /// RUNNING goes to BRAKING only on a false→true edge of `present`.
    /// BRAKING returns to RUNNING exactly `brake_frames` frames after the
    /// trigger whatever `present` says, and the release frame cannot
    /// re-trigger.
    pub fn update(&mut self, frame_index: u64, present: bool) -> GateDecision {
        let rising = present && !self.previous_present;
        self.previous_present = present;

        match self.state {
            ObstructionState::Braking { since_frame } => {
                if frame_index >= since_frame + self.brake_frames {
                    self.state = ObstructionState::Running;
                    info!("Obstruction brake window over at frame {}, resuming", frame_index);
                    GateDecision::Released
                } else {
                    GateDecision::Holding
                }
            }
            ObstructionState::Running => {
                if rising {
                    self.state = ObstructionState::Braking {
                        since_frame: frame_index,
                    };
                    info!("Obstruction detected at frame {}, braking", frame_index);
                    GateDecision::Engaged
                } else {
                    GateDecision::Cruise
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Config;

    fn gate() -> ObstructionGate {
        ObstructionGate::new(&Config::default().obstruction)
    }

    fn boxed(height: i32) -> BoundingBox {
        BoundingBox {
            x: 10,
            y: 10,
            width: height,
            height,
        }
    }

    #[test]
    fn size_band_filters_boxes() {
        let gate = gate();
        assert!(gate.detect(&[boxed(175)]));
        assert!(!gate.detect(&[boxed(140)]));
        assert!(!gate.detect(&[boxed(210)]));
        assert!(gate.detect(&[boxed(150)]));
        assert!(gate.detect(&[boxed(200)]));
        assert!(gate.detect(&[boxed(90), boxed(160)]));
        assert!(!gate.detect(&[]));
    }

    #[test]
    fn brakes_for_exactly_the_window() {
        let mut gate = gate();
        let k = 7;
        for frame in 0..k {
            assert_eq!(gate.update(frame, false), GateDecision::Cruise);
        }

        assert_eq!(gate.update(k, true), GateDecision::Engaged);
        for frame in k + 1..k + 5 {
            assert!(gate.update(frame, true).is_braking(), "frame {}", frame);
        }
        // Released at k+5 even though the sign is still in view.
        assert_eq!(gate.update(k + 5, true), GateDecision::Released);
        assert_eq!(gate.state(), ObstructionState::Running);
        // Continuous detection is not a new rising edge.
        assert_eq!(gate.update(k + 6, true), GateDecision::Cruise);
    }

    #[test]
    fn rising_edges_while_braking_do_not_extend_the_window() {
        let mut gate = gate();
        assert_eq!(gate.update(0, true), GateDecision::Engaged);
        assert_eq!(gate.update(1, false), GateDecision::Holding);
        assert_eq!(gate.update(2, true), GateDecision::Holding);
        assert_eq!(gate.update(3, false), GateDecision::Holding);
        assert_eq!(gate.update(4, false), GateDecision::Holding);
        assert_eq!(gate.update(5, false), GateDecision::Released);
    }

    #[test]
    fn release_frame_does_not_retrigger() {
        let mut gate = gate();
        assert_eq!(gate.update(0, true), GateDecision::Engaged);
        for frame in 1..4 {
            gate.update(frame, true);
        }
        gate.update(4, false);
        // Rising edge on the release frame still releases.
        assert_eq!(gate.update(5, true), GateDecision::Released);
        assert_eq!(gate.update(6, true), GateDecision::Cruise);
        assert_eq!(gate.update(7, false), GateDecision::Cruise);
        assert_eq!(gate.update(8, true), GateDecision::Engaged);
    }

    #[test]
    fn sign_present_from_first_frame_triggers() {
        let mut gate = gate();
        assert_eq!(gate.update(0, true), GateDecision::Engaged);
    }
}
