// src/detection/edge_image.rs
use bitvec::prelude::BitVec;

/// Binary edge map, one bit per pixel, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct BinaryEdgeImage {
    width: usize,
    height: usize,
    bits: BitVec,
}

impl BinaryEdgeImage {
    pub fn new(width: usize, height: usize) -> Self {
        let mut bits = BitVec::with_capacity(width * height);
        bits.resize(width * height, false);
        Self {
            width,
            height,
            bits,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Out-of-range coordinates read as "not edge".
    pub fn get(&self, x: usize, y: usize) -> bool {
        if x >= self.width || y >= self.height {
            return false;
        }
        self.bits[y * self.width + x]
    }

    pub fn set(&mut self, x: usize, y: usize, edge: bool) {
        if x < self.width && y < self.height {
            self.bits.set(y * self.width + x, edge);
        }
    }

    pub fn edge_count(&self) -> usize {
        self.bits.count_ones()
    }

    /// Clears every edge pixel for which `keep` returns false.
    pub fn retain(&mut self, mut keep: impl FnMut(usize, usize) -> bool) {
        for y in 0..self.height {
            for x in 0..self.width {
                let idx = y * self.width + x;
                if self.bits[idx] && !keep(x, y) {
                    self.bits.set(idx, false);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_and_get_round_trip_within_bounds() {
        let mut image = BinaryEdgeImage::new(8, 4);
        image.set(3, 2, true);
        assert!(image.get(3, 2));
        assert!(!image.get(2, 3));
        assert_eq!(image.edge_count(), 1);
    }

    #[test]
    fn out_of_bounds_is_ignored() {
        let mut image = BinaryEdgeImage::new(4, 4);
        image.set(10, 10, true);
        assert_eq!(image.edge_count(), 0);
        assert!(!image.get(10, 0));
    }

    #[test]
    fn retain_clears_rejected_pixels() {
        let mut image = BinaryEdgeImage::new(4, 2);
        image.set(0, 0, true);
        image.set(3, 1, true);
        image.retain(|_, y| y == 1);
        assert!(!image.get(0, 0));
        assert!(image.get(3, 1));
    }
}
