// src/hardware/sonar.rs

use anyhow::{Context, Result};
use std::fs::File;
use std::io::Read;

/// Source of ultrasonic echo widths, in clock edges.
pub trait DistanceSensor {
    fn read_echo_edges(&mut self) -> Result<u32>;
}

pub struct SonarDevice {
    file: File,
}

impl SonarDevice {
    pub fn open(path: &str) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Failed to open sonar {}", path))?;
        Ok(Self { file })
    }
}

impl DistanceSensor for SonarDevice {
    fn read_echo_edges(&mut self) -> Result<u32> {
        let mut word = [0u8; 4];
        self.file
            .read_exact(&mut word)
            .context("sonar read failed")?;
        Ok(u32::from_le_bytes(word))
    }
}
