//! Image-sequence capture: a directory of numbered frame files played as video

use std::path::{Path, PathBuf};

use image::RgbImage;
use tracing::{info, instrument, warn};

use crate::capture::decoder::{decode_frame, is_frame_file};
use crate::capture::source::{Capture, CaptureProperty};
use crate::{CaptureConfig, HighlightError, Result};

/// Plays back the PNG/JPEG files of a directory in file-name order
pub struct ImageSequenceCapture {
    config: CaptureConfig,
    frames: Vec<PathBuf>,
    position: usize,
    width: u32,
    height: u32,
    opened: bool,
}

impl ImageSequenceCapture {
    pub fn new(config: CaptureConfig) -> Self {
        Self {
            config,
            frames: Vec::new(),
            position: 0,
            width: 0,
            height: 0,
            opened: false,
        }
    }

    fn list_frames(dir: &Path) -> Result<Vec<PathBuf>> {
        let mut frames = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_file() && is_frame_file(&path) {
                frames.push(path);
            }
        }
        frames.sort();
        Ok(frames)
    }
}

impl Capture for ImageSequenceCapture {
    #[instrument(skip(self))]
    fn open(&mut self, source: &str) -> Result<()> {
        let dir = Path::new(source);
        if !dir.is_dir() {
            return Err(HighlightError::capture_open(format!(
                "{} is not a directory of frames",
                source
            )));
        }

        let frames = Self::list_frames(dir)?;
        let first = frames
            .first()
            .ok_or_else(|| HighlightError::capture_open(format!("{} has no frames", source)))?;
        let (width, height) = decode_frame(first)?.dimensions();

        info!("Opened {} frames of {}x{} from {}", frames.len(), width, height, source);

        self.frames = frames;
        self.position = 0;
        self.width = width;
        self.height = height;
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

        let path = self.frames.get(self.position)?;
        match decode_frame(path) {
            Ok(image) => {
                self.position += 1;
                Some(image)
            }
            Err(e) => {
                warn!("Failed to decode {}: {}", path.display(), e);
                None
            }
        }
    }

    fn get(&self, property: CaptureProperty) -> f64 {
        if !self.opened {
            return 0.0;
        }

        match property {
            CaptureProperty::PosFrames => self.position as f64,
            CaptureProperty::Fps => self.config.fps,
            CaptureProperty::FrameCount => self.frames.len() as f64,
            CaptureProperty::FrameWidth => self.width as f64,
            CaptureProperty::FrameHeight => self.height as f64,
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
            _ => false,
        }
    }

    fn release(&mut self) {
        self.frames.clear();
        self.position = 0;
        self.opened = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn write_frames(dir: &Path, count: u8) {
        for i in 0..count {
            let image = RgbImage::from_pixel(6, 4, Rgb([i * 10, 0, 0]));
            image.save(dir.join(format!("frame_{:04}.png", i))).unwrap();
        }
        std::fs::write(dir.join("notes.txt"), "not a frame").unwrap();
    }

    #[test]
    fn reads_frames_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        write_frames(dir.path(), 3);

        let mut capture = ImageSequenceCapture::new(CaptureConfig::default());
        capture.open(dir.path().to_str().unwrap()).unwrap();

        assert_eq!(capture.get(CaptureProperty::FrameCount), 3.0);
        assert_eq!(capture.get(CaptureProperty::FrameWidth), 6.0);
        for i in 0..3u8 {
            let image = capture.read().unwrap();
            assert_eq!(image.get_pixel(0, 0)[0], i * 10);
        }
        assert!(capture.read().is_none());
    }

    #[test]
    fn seek_moves_next_read() {
        let dir = tempfile::tempdir().unwrap();
        write_frames(dir.path(), 3);

        let mut capture = ImageSequenceCapture::new(CaptureConfig::default());
        capture.open(dir.path().to_str().unwrap()).unwrap();

        assert!(capture.set(CaptureProperty::PosFrames, 2.0));
        assert_eq!(capture.read().unwrap().get_pixel(0, 0)[0], 20);
        assert!(!capture.set(CaptureProperty::Fps, 60.0));
    }

    #[test]
    fn open_empty_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut capture = ImageSequenceCapture::new(CaptureConfig::default());
        assert!(capture.open(dir.path().to_str().unwrap()).is_err());
        assert!(!capture.is_open());
    }
}
