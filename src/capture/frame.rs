use image::RgbImage;
use serde::{Deserialize, Serialize};

/// Index carried by the end-of-stream sentinel
pub const END_OF_STREAM: i64 = -1;

/// One decoded unit of video travelling through the pipeline.
///
/// Frames move between stages by value; a stage that pops a frame owns it
/// exclusively until it forwards or drops it.
#[derive(Debug, Clone)]
pub struct Frame {
    /// 0-based position in the source, or [`END_OF_STREAM`]
    pub index: i64,
    /// Authority generation at the moment the frame was read
    pub generation: u64,
    pub image: RgbImage,
}

impl Frame {
    pub fn new(index: i64, generation: u64, image: RgbImage) -> Self {
        Self {
            index,
            generation,
            image,
        }
    }

    /// Sentinel emitted once the capture has no more frames
    pub fn end_of_stream(generation: u64) -> Self {
        Self {
            index: END_OF_STREAM,
            generation,
            image: RgbImage::new(0, 0),
        }
    }

    pub fn is_end_of_stream(&self) -> bool {
        self.index == END_OF_STREAM
    }
}

/// Axis-aligned rectangle in pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Rectangle spanned by two corner points in any order
    pub fn from_corners(a: (i32, i32), b: (i32, i32)) -> Self {
        let (x0, x1) = (a.0.min(b.0), a.0.max(b.0));
        let (y0, y1) = (a.1.min(b.1), a.1.max(b.1));
        Self::new(x0, y0, (x1 - x0) as u32, (y1 - y0) as u32)
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Intersection with a `width` x `height` image, `None` if nothing is left
    pub fn clamp_to(&self, width: u32, height: u32) -> Option<Rect> {
        let x0 = self.x.max(0) as i64;
        let y0 = self.y.max(0) as i64;
        let x1 = (self.x as i64 + self.width as i64).min(width as i64);
        let y1 = (self.y as i64 + self.height as i64).min(height as i64);

        if x1 <= x0 || y1 <= y0 {
            return None;
        }

        Some(Rect::new(
            x0 as i32,
            y0 as i32,
            (x1 - x0) as u32,
            (y1 - y0) as u32,
        ))
    }

    /// True when the whole rectangle lies inside a `width` x `height` image
    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        self.clamp_to(width, height) == Some(*self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinel_has_negative_index_and_empty_image() {
        let frame = Frame::end_of_stream(7);
        assert!(frame.is_end_of_stream());
        assert_eq!(frame.generation, 7);
        assert_eq!(frame.image.dimensions(), (0, 0));
        assert!(!Frame::new(0, 7, RgbImage::new(1, 1)).is_end_of_stream());
    }

    #[test]
    fn from_corners_normalizes_order() {
        let rect = Rect::from_corners((10, 20), (4, 2));
        assert_eq!(rect, Rect::new(4, 2, 6, 18));
    }

    #[test]
    fn clamp_trims_overhanging_edges() {
        let rect = Rect::new(-5, 8, 20, 10);
        assert_eq!(rect.clamp_to(12, 12), Some(Rect::new(0, 8, 12, 4)));
        assert!(!rect.fits_within(12, 12));
        assert!(Rect::new(1, 1, 4, 4).fits_within(12, 12));
    }

    #[test]
    fn clamp_outside_image_is_none() {
        assert_eq!(Rect::new(50, 50, 4, 4).clamp_to(10, 10), None);
        assert_eq!(Rect::new(2, 2, 0, 4).clamp_to(10, 10), None);
    }
}
