//! In-memory capture for tests and demos

use image::{Rgb, RgbImage};

use crate::capture::source::{Capture, CaptureProperty};
use crate::{HighlightError, Result};

/// Plays back a fixed list of images held in memory
pub struct MemoryCapture {
    frames: Vec<RgbImage>,
    fps: f64,
    position: usize,
    opened: bool,
}

impl MemoryCapture {
    pub fn new(frames: Vec<RgbImage>) -> Self {
        Self {
            frames,
            fps: 30.0,
            position: 0,
            opened: false,
        }
    }

    /// `count` frames whose every pixel is `[index, 0, 0]`, so the index can
    /// be recovered from any pixel that no overlay touched
    pub fn numbered(count: usize, width: u32, height: u32) -> Self {
        let frames = (0..count)
            .map(|i| RgbImage::from_pixel(width, height, Rgb([i as u8, 0, 0])))
            .collect();
        Self::new(frames)
    }
}

impl Capture for MemoryCapture {
    fn open(&mut self, source: &str) -> Result<()> {
        if self.frames.is_empty() {
            return Err(HighlightError::capture_open(format!("{}: no frames", source)));
        }
        self.position = 0;
        self.opened = true;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.opened
    }

    fn read(&mut self) -> Option<RgbImage> {
        if !self.opened {
            return None;
        }
        let image = self.frames.get(self.position)?.clone();
        self.position += 1;
        Some(image)
    }

    fn get(&self, property: CaptureProperty) -> f64 {
        if !self.opened {
            return 0.0;
        }
        let (width, height) = self.frames.first().map(|f| f.dimensions()).unwrap_or((0, 0));
        match property {
            CaptureProperty::PosFrames => self.position as f64,
            CaptureProperty::Fps => self.fps,
            CaptureProperty::FrameCount => self.frames.len() as f64,
            CaptureProperty::FrameWidth => width as f64,
            CaptureProperty::FrameHeight => height as f64,
        }
    }

    fn set(&mut self, property: CaptureProperty, value: f64) -> bool {
        if !self.opened || !value.is_finite() {
            return false;
        }
        match property {
            CaptureProperty::PosFrames => {
                self.position = (value.max(0.0) as usize).min(self.frames.len());
                true
            }
            CaptureProperty::Fps if value > 0.0 => {
                self.fps = value;
                true
            }
            _ => false,
        }
    }

    fn release(&mut self) {
        self.position = 0;
        self.opened = false;
    }
}
