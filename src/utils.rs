use std::fmt;

use serde::{Deserialize, Serialize};

/// Summary of an opened capture
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VideoInfo {
    pub fps: f64,
    pub frame_count: u64,
    pub width: u32,
    pub height: u32,
}

impl VideoInfo {
    /// Whole seconds of playback, 0 when the frame rate is unknown
    pub fn duration_secs(&self) -> u64 {
        if self.fps > 0.0 {
            (self.frame_count as f64 / self.fps) as u64
        } else {
            0
        }
    }
}

impl fmt::Display for VideoInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "FPS: {}", self.fps.round() as i64)?;
        writeln!(f, "Frame count: {}", self.frame_count)?;
        writeln!(f, "Duration: {}s", self.duration_secs())?;
        write!(f, "Resolution: {} x {}", self.width, self.height)
    }
}
