// src/detection/lane_estimator.rs
use super::edge_image::BinaryEdgeImage;
use super::edge_sampler::{sample_row, RowSample};
use super::types::{EdgePosition, RowLevel, ScanRows, Side};

/// Raw lane-edge evidence for one frame: one sample per side per row.
#[derive(Debug, Clone, PartialEq)]
pub struct LaneEstimate {
    pub left_near: RowSample,
    pub right_near: RowSample,
    pub left_mid: RowSample,
    pub right_mid: RowSample,
    pub left_far: RowSample,
    pub right_far: RowSample,
}

impl LaneEstimate {
    pub fn sample(&self, side: Side, level: RowLevel) -> &RowSample {
        match (side, level) {
            (Side::Left, RowLevel::Near) => &self.left_near,
            (Side::Right, RowLevel::Near) => &self.right_near,
            (Side::Left, RowLevel::Mid) => &self.left_mid,
            (Side::Right, RowLevel::Mid) => &self.right_mid,
            (Side::Left, RowLevel::Far) => &self.left_far,
            (Side::Right, RowLevel::Far) => &self.right_far,
        }
    }

    pub fn position(&self, side: Side, level: RowLevel) -> EdgePosition {
        self.sample(side, level).position
    }
}

pub struct LaneEstimator {
    rows: ScanRows,
}

impl LaneEstimator {
    pub fn new(rows: ScanRows) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &ScanRows {
        &self.rows
    }

    /// Samples all six bands. Rows are independent of each other; the
    /// near/mid/far hierarchy is applied later by the steering mapper.
    pub fn estimate(&self, image: &BinaryEdgeImage) -> LaneEstimate {
        let sample = |side: Side, level: RowLevel| {
            let row = self.rows.row(level);
            sample_row(image, row.y, row.band(side))
        };

        LaneEstimate {
            left_near: sample(Side::Left, RowLevel::Near),
            right_near: sample(Side::Right, RowLevel::Near),
            left_mid: sample(Side::Left, RowLevel::Mid),
            right_mid: sample(Side::Right, RowLevel::Mid),
            left_far: sample(Side::Left, RowLevel::Far),
            right_far: sample(Side::Right, RowLevel::Far),
        }
    }
}
