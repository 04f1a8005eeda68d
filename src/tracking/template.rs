//! Template-matching tracker.
//!
//! Keeps a luma patch of the target and searches a square window around
//! the previous position for the offset with the lowest mean absolute
//! difference. A coarse pass on a 2-pixel grid is refined at 1 pixel.

use image::RgbImage;

use crate::tracking::Tracker;
use crate::Rect;

/// Default search radius in pixels
pub const DEFAULT_SEARCH_RADIUS: i32 = 16;
/// Default mean absolute luma difference above which the target is lost
pub const DEFAULT_MAX_DIFFERENCE: f32 = 40.0;

pub struct TemplateTracker {
    search_radius: i32,
    max_difference: f32,
    template: Vec<u8>,
    width: u32,
    height: u32,
}

impl Default for TemplateTracker {
    fn default() -> Self {
        Self::new(DEFAULT_SEARCH_RADIUS, DEFAULT_MAX_DIFFERENCE)
    }
}

impl TemplateTracker {
    pub fn new(search_radius: i32, max_difference: f32) -> Self {
        Self {
            search_radius: search_radius.max(1),
            max_difference,
            template: Vec::new(),
            width: 0,
            height: 0,
        }
    }

    fn luma(image: &RgbImage, x: u32, y: u32) -> u8 {
        let p = image.get_pixel(x, y);
        ((p[0] as u32 * 299 + p[1] as u32 * 587 + p[2] as u32 * 114) / 1000) as u8
    }

    /// Mean absolute difference of the template placed at (x, y), sampling
    /// every `step`th pixel. `None` when the placement leaves the image.
    fn score(&self, image: &RgbImage, x: i32, y: i32, step: u32) -> Option<f32> {
        let candidate = Rect::new(x, y, self.width, self.height);
        if !candidate.fits_within(image.width(), image.height()) {
            return None;
        }

        let mut total = 0u64;
        let mut samples = 0u64;
        for ty in (0..self.height).step_by(step as usize) {
            for tx in (0..self.width).step_by(step as usize) {
                let reference = self.template[(ty * self.width + tx) as usize];
                let actual = Self::luma(image, x as u32 + tx, y as u32 + ty);
                total += reference.abs_diff(actual) as u64;
                samples += 1;
            }
        }

        (samples > 0).then(|| total as f32 / samples as f32)
    }

    fn best_in(
        &self,
        image: &RgbImage,
        center: (i32, i32),
        radius: i32,
        stride: i32,
        step: u32,
    ) -> Option<(i32, i32, f32)> {
        let mut best: Option<(i32, i32, f32)> = None;
        let mut dy = -radius;
        while dy <= radius {
            let mut dx = -radius;
            while dx <= radius {
                let (x, y) = (center.0 + dx, center.1 + dy);
                if let Some(score) = self.score(image, x, y, step) {
                    if best.map_or(true, |(_, _, b)| score < b) {
                        best = Some((x, y, score));
                    }
                }
                dx += stride;
            }
            dy += stride;
        }
        best
    }
}

impl Tracker for TemplateTracker {
    fn init(&mut self, image: &RgbImage, bbox: Rect) {
        self.template.clear();
        self.width = 0;
        self.height = 0;

        let Some(region) = bbox.clamp_to(image.width(), image.height()) else {
            return;
        };

        self.width = region.width;
        self.height = region.height;
        self.template.reserve(region.area() as usize);
        for y in 0..region.height {
            for x in 0..region.width {
                self.template
                    .push(Self::luma(image, region.x as u32 + x, region.y as u32 + y));
            }
        }
    }

    fn update(&mut self, image: &RgbImage, bbox: &mut Rect) -> bool {
        if self.template.is_empty() {
            return false;
        }

        let origin = (bbox.x, bbox.y);
        let Some((cx, cy, _)) = self.best_in(image, origin, self.search_radius, 2, 2) else {
            return false;
        };
        let Some((x, y, score)) = self.best_in(image, (cx, cy), 1, 1, 1) else {
            return false;
        };

        if score > self.max_difference {
            return false;
        }

        *bbox = Rect::new(x, y, self.width, self.height);
        true
    }
}
