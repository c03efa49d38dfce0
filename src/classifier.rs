// src/classifier.rs

use crate::detection::BoundingBox;
use crate::types::Frame;
use anyhow::Result;

/// Proposes candidate obstruction regions in a (reduced) frame region.
pub trait ObstructionClassifier {
    fn detect(&mut self, region: &Frame) -> Result<Vec<BoundingBox>>;
}

/// Used when no detector is installed; the gate then never fires.
#[derive(Debug, Default)]
pub struct NullClassifier;

impl ObstructionClassifier for NullClassifier {
    fn detect(&mut self, _region: &Frame) -> Result<Vec<BoundingBox>> {
        Ok(Vec::new())
    }
}
