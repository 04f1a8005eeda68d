//! Display, input and recording capabilities used by the sink stage

#[cfg(feature = "sdl-display")]
pub mod display;
pub mod output;

use std::path::PathBuf;
use std::time::Duration;

use image::RgbImage;

use crate::{Rect, Result};

#[cfg(feature = "sdl-display")]
pub use display::Sdl2Display;
pub use output::{ImageSequenceWriter, ImageSequenceWriterFactory, OutputFormat};

/// Discrete operator commands decoded from input events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Quit,
    /// Hold the current frame until the next command
    Pause,
    RewindToStart,
    /// Jump back by the configured interval
    RewindInterval,
    SelectObjects,
    ToggleRecording,
    /// Save the current highlighted frame as an image
    Snapshot,
}

/// Windowed output plus operator input.
///
/// Not `Send`: windowing toolkits usually bind to the thread that created
/// them, so the sink builds its display on its own thread.
pub trait Display {
    fn show(&mut self, window: &str, image: &RgbImage) -> Result<()>;

    /// Next command, waiting at most `timeout`
    fn poll_input(&mut self, timeout: Duration) -> Option<Command>;

    /// Let the operator draw regions on `image`; blocks until confirmed.
    /// An empty list means the selection was cancelled.
    fn select_regions(&mut self, window: &str, image: &RgbImage) -> Result<Vec<Rect>>;

    fn close_window(&mut self, window: &str);
}

/// Where and how recorded frames are written
#[derive(Debug, Clone, PartialEq)]
pub struct WriterSettings {
    pub path: PathBuf,
    pub format: String,
    pub fps: f64,
    pub width: u32,
    pub height: u32,
}

/// Sink for recorded frames
pub trait FrameWriter: Send {
    fn write(&mut self, image: &RgbImage) -> Result<()>;

    /// Flush whatever the writer buffers; called when recording stops
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Opens a fresh writer each time recording starts
pub trait WriterFactory: Send {
    fn open(&mut self, settings: &WriterSettings) -> Result<Box<dyn FrameWriter>>;
}
