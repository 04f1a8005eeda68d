//! Capture capability consumed by the control authority

use image::RgbImage;

use crate::Result;

/// Properties a capture exposes, modelled on the usual video-capture knobs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureProperty {
    /// 0-based index of the next frame to be read
    PosFrames,
    Fps,
    FrameCount,
    FrameWidth,
    FrameHeight,
}

/// Anything that yields decoded frames in order and can seek.
///
/// Implementations are owned by the [`ControlAuthority`] and only ever
/// touched under its capture lock.
///
/// [`ControlAuthority`]: crate::pipeline::ControlAuthority
pub trait Capture: Send {
    fn open(&mut self, source: &str) -> Result<()>;

    fn is_open(&self) -> bool;

    /// Next frame, `None` at end of stream or when closed
    fn read(&mut self) -> Option<RgbImage>;

    /// Property value, 0.0 when unknown or closed
    fn get(&self, property: CaptureProperty) -> f64;

    /// Returns whether the property was accepted
    fn set(&mut self, property: CaptureProperty, value: f64) -> bool;

    fn release(&mut self);
}
