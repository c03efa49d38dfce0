// src/debug.rs
//
// Diagnostic images. Rendering happens on the loop thread (cheap pixel
// writes); encoding and disk I/O happen on a blocking tokio task fed
// through a bounded queue that drops images instead of blocking the loop.

use crate::detection::{BinaryEdgeImage, LaneEstimate, RowLevel, ScanRows, Side};
use crate::types::Frame;
use anyhow::{Context, Result};
use image::{DynamicImage, GrayImage, Luma, Rgb, RgbImage};
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::rect::Rect;
use std::path::PathBuf;
use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

const LEFT_BAND: Rgb<u8> = Rgb([0, 100, 0]);
const RIGHT_BAND: Rgb<u8> = Rgb([0, 0, 100]);
const MEAN_TICK: Rgb<u8> = Rgb([255, 255, 0]);
const HIT_TICK: Rgb<u8> = Rgb([255, 0, 0]);
const CENTROID_TICK: Rgb<u8> = Rgb([255, 0, 255]);

pub struct DiagnosticImage {
    pub file_name: String,
    pub image: DynamicImage,
}

pub struct DiagnosticsWriter {
    tx: mpsc::Sender<DiagnosticImage>,
    worker: JoinHandle<()>,
    dropped: u64,
}

impl DiagnosticsWriter {
    /// Starts the writer on the blocking pool of the current tokio runtime.
    pub fn spawn(output_dir: &str, queue_depth: usize) -> Result<Self> {
        let dir = PathBuf::from(output_dir);
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("creating diagnostics dir {}", dir.display()))?;
        let runtime = Handle::try_current().context("diagnostics writer needs a tokio runtime")?;

        let (tx, mut rx) = mpsc::channel::<DiagnosticImage>(queue_depth);
        let worker = runtime.spawn_blocking(move || {
            while let Some(item) = rx.blocking_recv() {
                let path = dir.join(&item.file_name);
                match item.image.save(&path) {
                    Ok(()) => debug!("Wrote {}", path.display()),
                    Err(e) => warn!("Failed to write {}: {}", path.display(), e),
                }
            }
        });

        Ok(Self {
            tx,
            worker,
            dropped: 0,
        })
    }

    /// Queues an image without waiting. Returns false if it was dropped.
    pub fn submit(&mut self, item: DiagnosticImage) -> bool {
        match self.tx.try_send(item) {
            Ok(()) => true,
            Err(TrySendError::Full(item)) => {
                self.dropped += 1;
                debug!("Diagnostics queue full, dropped {}", item.file_name);
                false
            }
            Err(TrySendError::Closed(_)) => {
                self.dropped += 1;
                false
            }
        }
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Closes the queue and waits until everything queued is on disk.
    /// Dropping the writer instead lets the worker drain in the background.
    pub async fn close(self) {
        drop(self.tx);
        if let Err(e) = self.worker.await {
            warn!("Diagnostics writer stopped abnormally: {}", e);
        }
    }
}

pub fn frame_to_rgb(frame: &Frame) -> RgbImage {
    RgbImage::from_fn(frame.width as u32, frame.height as u32, |x, y| {
        let px = frame.pixel(x as usize, y as usize);
        match px.len() {
            1 => Rgb([px[0], px[0], px[0]]),
            _ => Rgb([px[0], px[1], px[2]]),
        }
    })
}

pub fn edges_to_gray(edges: &BinaryEdgeImage) -> GrayImage {
    GrayImage::from_fn(edges.width() as u32, edges.height() as u32, |x, y| {
        Luma([if edges.get(x as usize, y as usize) { 255 } else { 0 }])
    })
}

/// Frame with the scan bands, reference columns, every edge hit and the
/// per-band centroids drawn on top.
pub fn render_overlay(frame: &Frame, rows: &ScanRows, estimate: &LaneEstimate) -> RgbImage {
    let mut image = frame_to_rgb(frame);

    for row in rows.iter() {
        let y = row.y as i64;
        for (side, color) in [(Side::Left, LEFT_BAND), (Side::Right, RIGHT_BAND)] {
            let band = row.band(side);
            fill_rect(&mut image, band.start as i64, y - 1, band.end as i64, y + 1, color);
            fill_rect(&mut image, band.mean as i64 - 1, y - 5, band.mean as i64 + 1, y + 5, MEAN_TICK);
        }
    }

    for level in RowLevel::ALL {
        let y = rows.row(level).y as i64;
        for side in [Side::Left, Side::Right] {
            let sample = estimate.sample(side, level);
            for &x in &sample.hits {
                let x = x as i64;
                fill_rect(&mut image, x - 2, y - 7, x + 1, y + 7, HIT_TICK);
            }
            if let Some(centroid) = sample.position.value() {
                let x = centroid.round() as i64;
                fill_rect(&mut image, x - 1, y - 10, x + 1, y + 10, CENTROID_TICK);
            }
        }
    }

    image
}

/// Paints the inclusive rectangle; `imageproc` clips it to the image.
fn fill_rect(image: &mut RgbImage, x0: i64, y0: i64, x1: i64, y1: i64, color: Rgb<u8>) {
    if x1 < x0 || y1 < y0 {
        return;
    }
    let rect = Rect::at(x0 as i32, y0 as i32).of_size((x1 - x0 + 1) as u32, (y1 - y0 + 1) as u32);
    draw_filled_rect_mut(image, rect, color);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::LaneEstimator;
    use crate::types::Config;

    fn black_frame(width: usize, height: usize) -> Frame {
        Frame {
            data: vec![0; width * height * 3],
            width,
            height,
            channels: 3,
        }
    }

    #[test]
    fn overlay_marks_bands_and_centroids() {
        let config = Config::default();
        let rows = ScanRows::from_config(&config.scan_rows);
        let mut edges = BinaryEdgeImage::new(1280, 720);
        edges.set(150, 560, true);
        let estimate = LaneEstimator::new(rows).estimate(&edges);

        let overlay = render_overlay(&black_frame(1280, 720), &rows, &estimate);
        assert_eq!(*overlay.get_pixel(400, 560), LEFT_BAND);
        assert_eq!(*overlay.get_pixel(1000, 440), RIGHT_BAND);
        assert_eq!(*overlay.get_pixel(172, 565), MEAN_TICK);
        assert_eq!(*overlay.get_pixel(150, 570), CENTROID_TICK);
        assert_eq!(*overlay.get_pixel(640, 100), Rgb([0, 0, 0]));
    }

    #[test]
    fn fill_rect_clips_to_image() {
        let mut image = RgbImage::new(4, 4);
        fill_rect(&mut image, -3, -3, 1, 1, HIT_TICK);
        assert_eq!(*image.get_pixel(1, 1), HIT_TICK);
        assert_eq!(*image.get_pixel(2, 2), Rgb([0, 0, 0]));
    }

    fn blank(name: &str) -> DiagnosticImage {
        DiagnosticImage {
            file_name: name.to_string(),
            image: DynamicImage::ImageLuma8(GrayImage::new(3, 3)),
        }
    }

    #[tokio::test]
    async fn writer_saves_queued_images_on_close() {
        let dir = std::env::temp_dir().join(format!("lane-pilot-diag-{}", std::process::id()));
        let mut writer = DiagnosticsWriter::spawn(dir.to_str().unwrap(), 2).unwrap();
        assert!(writer.submit(blank("frame_000000_overlay.png")));
        writer.close().await;

        assert!(dir.join("frame_000000_overlay.png").exists());
        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn writer_needs_a_runtime() {
        let dir = std::env::temp_dir().join(format!("lane-pilot-diag-rt-{}", std::process::id()));
        assert!(DiagnosticsWriter::spawn(dir.to_str().unwrap(), 2).is_err());
        std::fs::remove_dir_all(dir).ok();
    }
}
