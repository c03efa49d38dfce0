// src/frame_source.rs

use crate::pipeline::{FrameSlot, SlotTake};
use crate::types::{Config, Frame, FrameConfig, SourceKind};
use anyhow::{bail, Context, Result};
use std::fs::File;
use std::io::Read;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{error, info, warn};

pub trait FrameSource {
    /// Blocks until the next frame is available. Errors are fatal to the loop.
    fn acquire(&mut self) -> Result<Frame>;

    /// Frames discarded before the loop could use them.
    fn dropped_frames(&self) -> u64 {
        0
    }
}

/// Raw camera character device: every read returns one full frame of
/// `height * width * channels` bytes.
pub struct DeviceFrameSource {
    file: File,
    geometry: FrameConfig,
}

impl DeviceFrameSource {
    pub fn open(path: &str, geometry: FrameConfig) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Failed to open camera {}", path))?;
        info!(
            "Camera {} opened: {}x{}x{}",
            path, geometry.width, geometry.height, geometry.channels
        );
        Ok(Self { file, geometry })
    }
}

impl FrameSource for DeviceFrameSource {
    fn acquire(&mut self) -> Result<Frame> {
        let g = &self.geometry;
        let mut data = vec![0u8; g.width * g.height * g.channels];
        self.file
            .read_exact(&mut data)
            .context("camera read failed")?;
        Ok(Frame {
            data,
            width: g.width,
            height: g.height,
            channels: g.channels,
        })
    }
}

/// Serves the same decoded image on every call. Used to replay a captured
/// frame through the whole pipeline on the bench.
pub struct StillImageSource {
    frame: Frame,
}

impl StillImageSource {
    pub fn open(path: &str, geometry: &FrameConfig) -> Result<Self> {
        let image = image::open(path)
            .with_context(|| format!("Failed to load still image {}", path))?
            .to_rgb8();
        let (width, height) = (image.width() as usize, image.height() as usize);
        if width != geometry.width || height != geometry.height {
            bail!(
                "still image {} is {}x{}, configured frame is {}x{}",
                path,
                width,
                height,
                geometry.width,
                geometry.height
            );
        }
        info!("Still image {} loaded ({}x{})", path, width, height);
        Ok(Self {
            frame: Frame {
                data: image.into_raw(),
                width,
                height,
                channels: 3,
            },
        })
    }
}

impl FrameSource for StillImageSource {
    fn acquire(&mut self) -> Result<Frame> {
        Ok(self.frame.clone())
    }
}

/// Runs another source on its own thread and hands the newest frame to the
/// loop through a [`FrameSlot`], dropping frames the loop was too slow for.
pub struct ThreadedFrameSource {
    slot: Arc<FrameSlot>,
    stop: Arc<AtomicBool>,
}

impl ThreadedFrameSource {
    const POLL: Duration = Duration::from_millis(100);

    pub fn spawn(mut inner: Box<dyn FrameSource + Send>) -> Result<Self> {
        let slot = Arc::new(FrameSlot::new());
        let stop = Arc::new(AtomicBool::new(false));

        let producer_slot = Arc::clone(&slot);
        let producer_stop = Arc::clone(&stop);
        thread::Builder::new()
            .name("frame-acquisition".to_string())
            .spawn(move || {
                while !producer_stop.load(Ordering::Relaxed) {
                    match inner.acquire() {
                        Ok(frame) => {
                            producer_slot.publish(frame);
                        }
                        Err(e) => {
                            error!("Acquisition thread stopping: {:#}", e);
                            producer_slot.fail(format!("{:#}", e));
                            break;
                        }
                    }
                }
            })
            .context("spawning acquisition thread")?;

        Ok(Self { slot, stop })
    }
}

impl FrameSource for ThreadedFrameSource {
    fn acquire(&mut self) -> Result<Frame> {
        loop {
            match self.slot.take(Self::POLL) {
                SlotTake::Frame(frame) => return Ok(frame),
                SlotTake::Failed(reason) => bail!("frame acquisition failed: {}", reason),
                SlotTake::TimedOut => continue,
            }
        }
    }

    fn dropped_frames(&self) -> u64 {
        self.slot.dropped()
    }
}

impl Drop for ThreadedFrameSource {
    fn drop(&mut self) {
        // The producer may be parked in a device read; it exits after that read.
        self.stop.store(true, Ordering::Relaxed);
    }
}

/// Still images are served inline; only a device gets a producer thread.
fn runs_threaded(config: &Config) -> bool {
    config.acquisition.threaded && config.source.kind == SourceKind::Device
}

pub fn open(config: &Config) -> Result<Box<dyn FrameSource + Send>> {
    let source: Box<dyn FrameSource + Send> = match config.source.kind {
        SourceKind::Device => Box::new(DeviceFrameSource::open(
            &config.source.path,
            config.frame.clone(),
        )?),
        SourceKind::Still => Box::new(StillImageSource::open(&config.source.path, &config.frame)?),
    };

    if config.acquisition.threaded && !runs_threaded(config) {
        warn!("Threaded acquisition ignored for a still image source");
    }
    if runs_threaded(config) {
        info!("Acquisition runs on a separate thread (latest-frame handoff)");
        return Ok(Box::new(ThreadedFrameSource::spawn(source)?));
    }
    Ok(source)
}
