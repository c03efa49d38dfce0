// src/preprocessing.rs

use crate::detection::{BinaryEdgeImage, ScanRows};
use crate::types::Frame;
use anyhow::{bail, Context, Result};
use image::{DynamicImage, GrayImage, RgbImage, RgbaImage};
use imageproc::edges::canny;
use imageproc::filter::gaussian_blur_f32;

/// Turns a camera frame into a binary edge map of the same size.
pub trait EdgeExtractor {
    fn extract(&mut self, frame: &Frame) -> Result<BinaryEdgeImage>;
}

/// Sigma matching a 5x5 Gaussian kernel.
const BLUR_SIGMA_5X5: f32 = 1.1;

/// Canny extractor: grayscale, 5x5-equivalent Gaussian, then `imageproc`'s
/// Sobel, non-maximum suppression and hysteresis.
pub struct GradientEdgeExtractor {
    blur_sigma: f32,
    low_threshold: f32,
    high_threshold: f32,
}

impl GradientEdgeExtractor {
    pub fn new(low_threshold: f32, high_threshold: f32) -> Self {
        Self {
            blur_sigma: BLUR_SIGMA_5X5,
            low_threshold,
            high_threshold,
        }
    }
}

impl Default for GradientEdgeExtractor {
    fn default() -> Self {
        Self::new(50.0, 150.0)
    }
}

impl EdgeExtractor for GradientEdgeExtractor {
    fn extract(&mut self, frame: &Frame) -> Result<BinaryEdgeImage> {
        let (w, h) = (frame.width, frame.height);
        if frame.data.len() != w * h * frame.channels {
            bail!(
                "frame buffer holds {} bytes, expected {}x{}x{}",
                frame.data.len(),
                w,
                h,
                frame.channels
            );
        }

        let gray = to_gray_image(frame)?;
        let blurred = gaussian_blur_f32(&gray, self.blur_sigma);
        let edge_map = canny(&blurred, self.low_threshold, self.high_threshold);

        let mut edges = BinaryEdgeImage::new(w, h);
        for (x, y, px) in edge_map.enumerate_pixels() {
            if px[0] > 0 {
                edges.set(x as usize, y as usize, true);
            }
        }
        Ok(edges)
    }
}

/// Keeps only edge pixels lying on the scan bands (±1 row), so later
/// stages and the diagnostics overlay see exactly what the sampler reads.
pub struct SelectionMask {
    bands: Vec<(usize, i32, i32)>,
    half_thickness: usize,
}

impl SelectionMask {
    pub fn from_rows(rows: &ScanRows) -> Self {
        let bands = rows
            .iter()
            .flat_map(|row| {
                [
                    (row.y, row.left.start, row.left.end),
                    (row.y, row.right.start, row.right.end),
                ]
            })
            .collect();
        Self {
            bands,
            half_thickness: 1,
        }
    }

    pub fn contains(&self, x: usize, y: usize) -> bool {
        let x = x as i32;
        self.bands.iter().any(|&(row_y, start, end)| {
            y.abs_diff(row_y) <= self.half_thickness && x >= start && x <= end
        })
    }

    pub fn apply(&self, edges: &mut BinaryEdgeImage) {
        edges.retain(|x, y| self.contains(x, y));
    }
}

/// Classifier input: right half of the frame at half resolution, where a
/// roadside sign shows up.
pub fn classifier_region(frame: &Frame) -> Frame {
    let left = frame.width / 2;
    let crop_width = frame.width - left;
    let c = frame.channels;

    let mut cropped = Vec::with_capacity(crop_width * frame.height * c);
    for y in 0..frame.height {
        let start = (y * frame.width + left) * c;
        cropped.extend_from_slice(&frame.data[start..start + crop_width * c]);
    }

    let dst_width = (crop_width / 2).max(1);
    let dst_height = (frame.height / 2).max(1);
    Frame {
        data: resize_bilinear(&cropped, crop_width, frame.height, dst_width, dst_height, c),
        width: dst_width,
        height: dst_height,
        channels: c,
    }
}

/// Luma plane of the frame, via the `image` crate's colour conversion.
fn to_gray_image(frame: &Frame) -> Result<GrayImage> {
    let (w, h) = (frame.width as u32, frame.height as u32);
    let data = frame.data.clone();
    let image = match frame.channels {
        1 => GrayImage::from_raw(w, h, data).map(DynamicImage::ImageLuma8),
        3 => RgbImage::from_raw(w, h, data).map(DynamicImage::ImageRgb8),
        4 => RgbaImage::from_raw(w, h, data).map(DynamicImage::ImageRgba8),
        n => bail!("unsupported channel count {}", n),
    }
    .context("frame buffer does not match its geometry")?;
    Ok(image.into_luma8())
}

/// Bilinear image resize
fn resize_bilinear(
    src: &[u8],
    src_w: usize,
    src_h: usize,
    dst_w: usize,
    dst_h: usize,
    channels: usize,
) -> Vec<u8> {
    let mut dst = vec![0u8; dst_h * dst_w * channels];

    let x_ratio = src_w as f32 / dst_w as f32;
    let y_ratio = src_h as f32 / dst_h as f32;

    for dy in 0..dst_h {
        for dx in 0..dst_w {
            let sx = dx as f32 * x_ratio;
            let sy = dy as f32 * y_ratio;

            let sx0 = (sx.floor() as usize).min(src_w - 1);
            let sy0 = (sy.floor() as usize).min(src_h - 1);
            let sx1 = (sx0 + 1).min(src_w - 1);
            let sy1 = (sy0 + 1).min(src_h - 1);

            let fx = sx - sx0 as f32;
            let fy = sy - sy0 as f32;

            for c in 0..channels {
                let p00 = src[(sy0 * src_w + sx0) * channels + c] as f32;
                let p10 = src[(sy0 * src_w + sx1) * channels + c] as f32;
                let p01 = src[(sy1 * src_w + sx0) * channels + c] as f32;
                let p11 = src[(sy1 * src_w + sx1) * channels + c] as f32;

                let val = p00 * (1.0 - fx) * (1.0 - fy)
                    + p10 * fx * (1.0 - fy)
                    + p01 * (1.0 - fx) * fy
                    + p11 * fx * fy;

                dst[(dy * dst_w + dx) * channels + c] = val.round() as u8;
            }
        }
    }

    dst
}
