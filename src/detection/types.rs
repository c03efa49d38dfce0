// src/detection/types.rs
use crate::types::{ScanRowConfig, ScanRowsConfig, SteeringConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

/// Scan row priority. `Near` is the row closest to the vehicle (bottom of
/// the frame) and the only one that drives the steering output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowLevel {
    Near,
    Mid,
    Far,
}

impl RowLevel {
    pub const ALL: [RowLevel; 3] = [RowLevel::Near, RowLevel::Mid, RowLevel::Far];
}

/// Lane-edge estimate for one side of one scan row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EdgePosition {
    Absent,
    At(f64),
}

impl EdgePosition {
    pub fn value(self) -> Option<f64> {
        match self {
            EdgePosition::Absent => None,
            EdgePosition::At(x) => Some(x),
        }
    }
}

/// A steering command already clamped into the servo's range. The only way
/// to build one is through [`SteeringLimits`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SteeringAngle(i32);

impl SteeringAngle {
    pub fn get(self) -> i32 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SteeringLimits {
    pub left: i32,
    pub right: i32,
}

impl SteeringLimits {
    pub fn from_config(config: &SteeringConfig) -> Self {
        Self {
            left: config.left_limit,
            right: config.right_limit,
        }
    }

    pub fn center(&self) -> i32 {
        self.left + (self.right - self.left) / 2
    }

    pub fn center_angle(&self) -> SteeringAngle {
        SteeringAngle(self.center())
    }

    pub fn clamp(&self, raw: i32) -> SteeringAngle {
        SteeringAngle(raw.clamp(self.left, self.right))
    }
}

/// Inclusive column range searched for one lane boundary, with the column
/// where that boundary sits when the vehicle is centred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanBand {
    pub start: i32,
    pub end: i32,
    pub mean: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanRowSpec {
    pub level: RowLevel,
    pub y: usize,
    pub left: ScanBand,
    pub right: ScanBand,
}

impl ScanRowSpec {
    pub fn from_config(level: RowLevel, row: &ScanRowConfig) -> Self {
        Self {
            level,
            y: row.y,
            left: ScanBand {
                start: row.left_mean - row.outer_offset,
                end: row.left_mean + row.inner_offset,
                mean: row.left_mean,
            },
            right: ScanBand {
                start: row.right_mean - row.inner_offset,
                end: row.right_mean + row.outer_offset,
                mean: row.right_mean,
            },
        }
    }

    pub fn band(&self, side: Side) -> &ScanBand {
        match side {
            Side::Left => &self.left,
            Side::Right => &self.right,
        }
    }
}

/// The three scan rows, derived once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanRows {
    pub near: ScanRowSpec,
    pub mid: ScanRowSpec,
    pub far: ScanRowSpec,
}

impl ScanRows {
    pub fn from_config(config: &ScanRowsConfig) -> Self {
        Self {
            near: ScanRowSpec::from_config(RowLevel::Near, &config.near),
            mid: ScanRowSpec::from_config(RowLevel::Mid, &config.mid),
            far: ScanRowSpec::from_config(RowLevel::Far, &config.far),
        }
    }

    pub fn row(&self, level: RowLevel) -> &ScanRowSpec {
        match level {
            RowLevel::Near => &self.near,
            RowLevel::Mid => &self.mid,
            RowLevel::Far => &self.far,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &ScanRowSpec> {
        [&self.near, &self.mid, &self.far].into_iter()
    }
}

/// Candidate obstruction proposed by the classifier, in classifier-input
/// pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Config;

    #[test]
    fn reference_rows_derive_expected_bands() {
        let rows = ScanRows::from_config(&Config::default().scan_rows);

        assert_eq!(rows.near.left, ScanBand { start: 72, end: 452, mean: 172 });
        assert_eq!(rows.near.right, ScanBand { start: 820, end: 1200, mean: 1100 });
        assert_eq!(rows.mid.left, ScanBand { start: 204, end: 404, mean: 304 });
        assert_eq!(rows.far.right, ScanBand { start: 694, end: 894, mean: 794 });
    }

    #[test]
    fn center_sits_between_limits() {
        let limits = SteeringLimits { left: 220, right: 380 };
        assert_eq!(limits.center(), 300);
        assert_eq!(limits.clamp(1000).get(), 380);
        assert_eq!(limits.clamp(-5).get(), 220);
        assert_eq!(limits.clamp(301).get(), 301);
    }

    #[test]
    fn absent_edge_is_not_zero() {
        assert_eq!(EdgePosition::Absent.value(), None);
        assert_eq!(EdgePosition::At(0.0).value(), Some(0.0));
    }
}
