// src/detection/fusion.rs
use super::types::SteeringLimits;
use crate::types::SteeringConfig;

/// Combines the left and right near-row contributions into one command.
pub struct SteeringFusion {
    center: i32,
    agreement_threshold: i32,
}

impl SteeringFusion {
    pub fn new(center: i32, agreement_threshold: i32) -> Self {
        Self {
            center,
            agreement_threshold,
        }
    }

    pub fn from_config(config: &SteeringConfig) -> Self {
        let limits = SteeringLimits::from_config(config);
        Self::new(limits.center(), config.agreement_threshold)
    }

    /// `None` means neither side produced an opinion; the caller holds the
    /// previous command.
    ///
    /// Readings closer than the agreement threshold are averaged. When they
    /// disagree and both point to the same side of centre, the stronger
    /// correction wins (`min` left of centre, `max` right of it); readings
    /// that straddle centre are averaged.
    pub fn fuse(&self, left: Option<i32>, right: Option<i32>) -> Option<i32> {
        match (left, right) {
            (Some(l), Some(r)) => {
                if (r - l).abs() < self.agreement_threshold {
                    Some(average(l, r))
                } else if l < self.center && r < self.center {
                    Some(l.min(r))
                } else if l > self.center && r > self.center {
                    Some(l.max(r))
                } else {
                    Some(average(l, r))
                }
            }
            (Some(value), None) | (None, Some(value)) => Some(value),
            (None, None) => None,
        }
    }
}

fn average(a: i32, b: i32) -> i32 {
    ((a as f64 + b as f64) / 2.0) as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fusion() -> SteeringFusion {
        SteeringFusion::new(300, 15)
    }

    #[test]
    fn agreeing_readings_are_averaged() {
        assert_eq!(fusion().fuse(Some(200), Some(210)), Some(205));
        assert_eq!(fusion().fuse(Some(310), Some(296)), Some(303));
    }

    #[test]
    fn both_left_of_center_takes_minimum() {
        assert_eq!(fusion().fuse(Some(100), Some(120)), Some(100));
        assert_eq!(fusion().fuse(Some(280), Some(240)), Some(240));
    }

    #[test]
    fn both_right_of_center_takes_maximum() {
        assert_eq!(fusion().fuse(Some(350), Some(400)), Some(400));
    }

    #[test]
    fn straddling_readings_are_averaged() {
        assert_eq!(fusion().fuse(Some(260), Some(360)), Some(310));
        // Exactly on centre counts as straddling.
        assert_eq!(fusion().fuse(Some(300), Some(340)), Some(320));
    }

    #[test]
    fn single_side_passes_through_unchanged() {
        assert_eq!(fusion().fuse(None, Some(371)), Some(371));
        assert_eq!(fusion().fuse(Some(233), None), Some(233));
    }

    #[test]
    fn no_sides_is_no_estimate() {
        assert_eq!(fusion().fuse(None, None), None);
    }

    #[test]
    fn threshold_is_strict() {
        // |R-L| == 15 is a disagreement, not an agreement.
        assert_eq!(fusion().fuse(Some(250), Some(265)), Some(250));
    }
}
