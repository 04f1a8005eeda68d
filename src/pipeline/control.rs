//! The control authority: single owner of the capture, the tracked objects,
//! the record toggle and the generation counter every stage checks against.

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use image::RgbImage;
use parking_lot::{Condvar, Mutex};
use tracing::{debug, info, warn};

use crate::capture::{Capture, CaptureProperty, Frame};
use crate::pipeline::cancel::{CancelToken, Wake};
use crate::pipeline::pool::WorkerPool;
use crate::tracking::{highlight, TrackedObject};
use crate::utils::VideoInfo;
use crate::{metric_names, PipelineConfig, Result};

/// Monotonic version of the authority state, with a condvar for waiters
#[derive(Default)]
struct GenerationSignal {
    value: AtomicU64,
    lock: Mutex<()>,
    changed: Condvar,
}

impl GenerationSignal {
    fn bump(&self) -> u64 {
        let _guard = self.lock.lock();
        let next = self.value.fetch_add(1, Ordering::SeqCst) + 1;
        self.changed.notify_all();
        next
    }
}

impl Wake for GenerationSignal {
    fn wake(&self) {
        let _guard = self.lock.lock();
        self.changed.notify_all();
    }
}

/// A tracked object plus a flag that is set while one of its updates is
/// queued or running on the pool
struct TrackerSlot {
    busy: AtomicBool,
    object: Mutex<TrackedObject>,
}

impl TrackerSlot {
    fn new(object: TrackedObject) -> Self {
        Self {
            busy: AtomicBool::new(false),
            object: Mutex::new(object),
        }
    }

    /// Claim the slot for one update; false if an earlier update is still in flight
    fn try_claim(&self) -> bool {
        !self.busy.swap(true, Ordering::AcqRel)
    }
}

/// Releases a claimed slot when the update job ends, panics included
struct ClaimGuard<'a>(&'a TrackerSlot);

impl Drop for ClaimGuard<'_> {
    fn drop(&mut self) {
        self.0.busy.store(false, Ordering::Release);
    }
}

type SharedObject = Arc<TrackerSlot>;

/// Shared capture/tracking state.
///
/// Two locks guard the state: one for the capture, one for the tracked
/// objects. Operations that touch both take the capture lock first. Every
/// state change that can invalidate in-flight frames bumps the generation
/// while the relevant locks are still held.
pub struct ControlAuthority {
    capture: Mutex<Box<dyn Capture>>,
    trackers: Mutex<Vec<SharedObject>>,
    generation: Arc<GenerationSignal>,
    recording: AtomicBool,
    return_index: AtomicI64,
    pool: WorkerPool,
    tracker_timeout: Duration,
}

impl ControlAuthority {
    pub fn new(capture: Box<dyn Capture>, config: &PipelineConfig) -> Self {
        let pool = if config.pin_workers {
            WorkerPool::pinned(config.tracker_threads)
        } else {
            WorkerPool::new(config.tracker_threads)
        };
        Self::with_pool(
            capture,
            pool,
            Duration::from_millis(config.tracker_timeout_ms),
        )
    }

    pub fn with_pool(capture: Box<dyn Capture>, pool: WorkerPool, tracker_timeout: Duration) -> Self {
        Self {
            capture: Mutex::new(capture),
            trackers: Mutex::new(Vec::new()),
            generation: Arc::new(GenerationSignal::default()),
            recording: AtomicBool::new(false),
            return_index: AtomicI64::new(0),
            pool,
            tracker_timeout,
        }
    }

    // Generation

    pub fn generation(&self) -> u64 {
        self.generation.value.load(Ordering::SeqCst)
    }

    /// Block until the generation differs from `last_seen` or `cancel` fires.
    /// Returns the generation observed on wakeup.
    pub fn generation_wait(&self, last_seen: u64, cancel: &CancelToken) -> u64 {
        let _registration = cancel.register(self.generation.clone());
        let mut guard = self.generation.lock.lock();
        while self.generation() == last_seen && !cancel.is_cancelled() {
            self.generation.changed.wait(&mut guard);
        }
        self.generation()
    }

    fn bump_generation(&self) -> u64 {
        let generation = self.generation.bump();
        debug!("Generation advanced to {}", generation);
        generation
    }

    // Capture

    /// Open `source`. Failure leaves the authority untouched.
    pub fn open(&self, source: &str) -> Result<()> {
        let mut capture = self.capture.lock();
        capture.open(source)?;
        self.bump_generation();
        info!("Capture opened: {}", source);
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.capture.lock().is_open()
    }

    pub fn release(&self) {
        let mut capture = self.capture.lock();
        capture.release();
        self.bump_generation();
        info!("Capture released");
    }

    /// Read the next frame stamped with the current generation, or the
    /// end-of-stream sentinel
    pub fn read_next(&self) -> Frame {
        let mut capture = self.capture.lock();
        let generation = self.generation();

        match capture.read() {
            Some(image) => {
                let index = capture.get(CaptureProperty::PosFrames) as i64 - 1;
                metrics::counter!(metric_names::FRAMES_READ).increment(1);
                Frame::new(index, generation, image)
            }
            None => Frame::end_of_stream(generation),
        }
    }

    pub fn property(&self, property: CaptureProperty) -> f64 {
        self.capture.lock().get(property)
    }

    /// Write a capture property; an accepted write invalidates in-flight frames
    pub fn set_property(&self, property: CaptureProperty, value: f64) -> bool {
        let mut capture = self.capture.lock();
        let ok = capture.set(property, value);
        if ok {
            self.bump_generation();
        }
        ok
    }

    /// Seek so that the next read returns frame `index`
    pub fn set_position(&self, index: i64) -> bool {
        self.set_property(CaptureProperty::PosFrames, index.max(0) as f64)
    }

    /// Index of the next frame to be read
    pub fn position(&self) -> i64 {
        self.property(CaptureProperty::PosFrames) as i64
    }

    pub fn video_info(&self) -> Option<VideoInfo> {
        let capture = self.capture.lock();
        if !capture.is_open() {
            return None;
        }
        Some(VideoInfo {
            fps: capture.get(CaptureProperty::Fps),
            frame_count: capture.get(CaptureProperty::FrameCount) as u64,
            width: capture.get(CaptureProperty::FrameWidth) as u32,
            height: capture.get(CaptureProperty::FrameHeight) as u32,
        })
    }

    // Trackers

    /// Append `objects` and seek to `rewind_index` as one state change
    pub fn add_trackers_and_rewind(&self, objects: Vec<TrackedObject>, rewind_index: i64) {
        let mut capture = self.capture.lock();
        let mut trackers = self.trackers.lock();

        let added = objects.len();
        trackers.extend(objects.into_iter().map(|o| Arc::new(TrackerSlot::new(o))));
        capture.set(CaptureProperty::PosFrames, rewind_index.max(0) as f64);

        let generation = self.bump_generation();
        info!(
            "Tracking {} objects (+{}), rewound to frame {} at generation {}",
            trackers.len(),
            added,
            rewind_index,
            generation
        );
    }

    pub fn clear_trackers(&self) {
        let mut trackers = self.trackers.lock();
        trackers.clear();
        self.bump_generation();
    }

    pub fn tracker_count(&self) -> usize {
        self.trackers.lock().len()
    }

    /// Generation and tracker count read together under the tracker lock
    pub fn tracker_state(&self) -> (u64, usize) {
        let trackers = self.trackers.lock();
        (self.generation(), trackers.len())
    }

    /// Update every tracked object on `frame` and highlight the ones found.
    ///
    /// Returns false, without touching any tracker, when the frame is stale.
    /// Objects whose update does not finish within the tracker timeout are
    /// left undrawn on this frame and keep updating in the background. While
    /// such an update is in flight the object is skipped, so each object has
    /// at most one job on the pool.
    pub fn update_and_draw_trackers(&self, frame: &mut Frame) -> bool {
        let objects = {
            let trackers = self.trackers.lock();
            if self.generation() != frame.generation {
                return false;
            }
            trackers.clone()
        };

        if objects.is_empty() || frame.is_end_of_stream() {
            return true;
        }

        let image = Arc::new(std::mem::replace(&mut frame.image, RgbImage::new(0, 0)));
        let (tx, rx) = flume::unbounded();

        let mut skipped = 0;
        for slot in objects {
            if !slot.try_claim() {
                skipped += 1;
                continue;
            }
            let image = image.clone();
            let tx = tx.clone();
            self.pool.submit(move || {
                let _claim = ClaimGuard(&slot);
                let start = Instant::now();
                let found = slot.object.lock().update(&image);
                metrics::histogram!(metric_names::TRACKER_UPDATE_US)
                    .record(start.elapsed().as_micros() as f64);
                if let Some(bbox) = found {
                    let _ = tx.send(bbox);
                }
            });
        }
        drop(tx);
        if skipped > 0 {
            debug!(
                "{} objects still busy with an earlier frame, skipped on frame {}",
                skipped, frame.index
            );
        }

        if !self.pool.wait_all(self.tracker_timeout) {
            metrics::counter!(metric_names::TRACKER_TIMEOUTS).increment(1);
            warn!(
                "Not all tracker updates completed within {:?} on frame {}",
                self.tracker_timeout, frame.index
            );
        }

        frame.image = Arc::try_unwrap(image).unwrap_or_else(|shared| (*shared).clone());
        for bbox in rx.try_iter() {
            highlight(&mut frame.image, bbox);
        }

        true
    }

    // Recording

    /// Start or stop recording.
    ///
    /// Starting remembers `return_index` (0 if absent) and seeks to the first
    /// frame. Stopping seeks to `return_index` if given, else to the position
    /// remembered at start. Requesting the current state does nothing.
    pub fn set_recording(&self, on: bool, return_index: Option<i64>) {
        let mut capture = self.capture.lock();
        let _trackers = self.trackers.lock();

        if self.recording.load(Ordering::SeqCst) == on {
            return;
        }

        let target = if on {
            self.return_index
                .store(return_index.unwrap_or(0), Ordering::SeqCst);
            0
        } else {
            return_index.unwrap_or_else(|| self.return_index.load(Ordering::SeqCst))
        };
        capture.set(CaptureProperty::PosFrames, target.max(0) as f64);

        self.recording.store(on, Ordering::SeqCst);
        let generation = self.bump_generation();
        info!(
            "Recording {} at generation {}, next frame {}",
            if on { "started" } else { "stopped" },
            generation,
            target
        );
    }

    pub fn is_recording(&self) -> bool {
        self.recording.load(Ordering::SeqCst)
    }
}
