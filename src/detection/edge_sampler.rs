// src/detection/edge_sampler.rs
use super::edge_image::BinaryEdgeImage;
use super::types::{EdgePosition, ScanBand};

/// Result of scanning one band of one row.
#[derive(Debug, Clone, PartialEq)]
pub struct RowSample {
    pub position: EdgePosition,
    /// Columns of every edge pixel found, for diagnostics overlays.
    pub hits: Vec<usize>,
}

impl RowSample {
    pub fn absent() -> Self {
        Self {
            position: EdgePosition::Absent,
            hits: Vec::new(),
        }
    }
}

/// Centroid of the edge pixels on row `y` between `band.start` and
/// `band.end` inclusive. A thick or noisy edge yields several hits; their
/// mean is the boundary estimate.
pub fn sample_row(image: &BinaryEdgeImage, y: usize, band: &ScanBand) -> RowSample {
    if y >= image.height() || band.end < 0 || band.start > band.end {
        return RowSample::absent();
    }

    let start = band.start.max(0) as usize;
    let end = (band.end as usize).min(image.width().saturating_sub(1));

    let hits: Vec<usize> = (start..=end).filter(|&x| image.get(x, y)).collect();
    if hits.is_empty() {
        return RowSample::absent();
    }

    let sum: f64 = hits.iter().map(|&x| x as f64).sum();
    RowSample {
        position: EdgePosition::At(sum / hits.len() as f64),
        hits,
    }
}
