//! Tracker capability and the per-object state owned by the control authority

pub mod overlay;
pub mod template;

use image::RgbImage;

use crate::Rect;

pub use overlay::highlight;
pub use template::TemplateTracker;

/// A single-object visual tracker
pub trait Tracker: Send {
    /// Learn the target inside `bbox` of `image`
    fn init(&mut self, image: &RgbImage, bbox: Rect);

    /// Locate the target in `image`, moving `bbox` on success
    fn update(&mut self, image: &RgbImage, bbox: &mut Rect) -> bool;
}

/// Creates fresh, uninitialised trackers for newly selected regions
pub trait TrackerFactory: Send + Sync {
    fn create(&self) -> Box<dyn Tracker>;
}

impl<F> TrackerFactory for F
where
    F: Fn() -> Box<dyn Tracker> + Send + Sync,
{
    fn create(&self) -> Box<dyn Tracker> {
        self()
    }
}

/// An operator-selected region and the tracker following it
pub struct TrackedObject {
    pub tracker: Box<dyn Tracker>,
    pub bbox: Rect,
    pub active: bool,
}

impl TrackedObject {
    pub fn new(tracker: Box<dyn Tracker>, bbox: Rect) -> Self {
        Self {
            tracker,
            bbox,
            active: true,
        }
    }

    /// Create a tracker from `factory` and initialise it on `image`
    pub fn start(factory: &dyn TrackerFactory, image: &RgbImage, bbox: Rect) -> Self {
        let mut tracker = factory.create();
        tracker.init(image, bbox);
        Self::new(tracker, bbox)
    }

    /// Run one tracker step; returns the box to highlight, if any
    pub fn update(&mut self, image: &RgbImage) -> Option<Rect> {
        if !self.active {
            return None;
        }
        if self.tracker.update(image, &mut self.bbox) {
            Some(self.bbox)
        } else {
            None
        }
    }
}

impl std::fmt::Debug for TrackedObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackedObject")
            .field("bbox", &self.bbox)
            .field("active", &self.active)
            .finish_non_exhaustive()
    }
}
