//! Generic stage abstraction and the thread that drives it

use std::sync::Arc;
use std::thread;

use tracing::{debug, error, info};

use crate::capture::Frame;
use crate::pipeline::cancel::CancelToken;
use crate::pipeline::control::ControlAuthority;
use crate::{metric_names, HighlightError, Result};

/// Verdict of [`Stage::transform`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transform {
    Forward,
    Discard,
}

/// One pipeline phase: pull a frame, work on it, hand it on.
///
/// The runner drops frames whose generation is stale before `transform`
/// and `forward` ever see them.
pub trait Stage {
    fn name(&self) -> &'static str;

    /// Next unit of work; `None` when cancelled or when the input was cleared
    fn acquire(&mut self, cancel: &CancelToken) -> Option<Frame>;

    fn transform(&mut self, _frame: &mut Frame) -> Transform {
        Transform::Forward
    }

    /// An error here is fatal and shuts the whole pipeline down
    fn forward(&mut self, frame: Frame, cancel: &CancelToken) -> Result<()>;
}

/// Raises the signal when a stage thread ends for any reason, panics included
struct CancelOnExit(CancelToken);

impl Drop for CancelOnExit {
    fn drop(&mut self) {
        self.0.cancel();
    }
}

/// A stage running on its own OS thread
pub struct StageRunner {
    name: &'static str,
    handle: thread::JoinHandle<Result<()>>,
}

impl StageRunner {
    /// Build a stage on a new thread and run it until `cancel` fires.
    ///
    /// The stage is constructed on its thread, so stages holding
    /// thread-bound resources need not be `Send`.
    pub fn spawn<S, F>(
        name: &'static str,
        authority: Arc<ControlAuthority>,
        cancel: CancelToken,
        build: F,
    ) -> Result<Self>
    where
        S: Stage,
        F: FnOnce() -> Result<S> + Send + 'static,
    {
        let handle = thread::Builder::new()
            .name(format!("{}-stage", name))
            .spawn(move || {
                let _guard = CancelOnExit(cancel.clone());
                let stage = build().map_err(|e| {
                    error!("Failed to start {} stage: {}", name, e);
                    e
                })?;
                run(stage, &authority, &cancel)
            })?;

        Ok(Self { name, handle })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Wait for the thread; surfaces the error that stopped the stage, if any
    pub fn join(self) -> Result<()> {
        self.handle.join().unwrap_or_else(|_| {
            error!("{} stage panicked", self.name);
            Err(HighlightError::StagePanicked(self.name))
        })
    }
}

/// The loop shared by every stage. A forward error cancels the pipeline
/// and is returned.
pub fn run<S: Stage>(mut stage: S, authority: &ControlAuthority, cancel: &CancelToken) -> Result<()> {
    info!("{} stage started", stage.name());

    while !cancel.is_cancelled() {
        let Some(mut frame) = stage.acquire(cancel) else {
            continue;
        };

        if frame.generation != authority.generation() {
            metrics::counter!(metric_names::FRAMES_STALE_DROPPED, "stage" => stage.name())
                .increment(1);
            debug!(
                "{} dropped stale frame {} (generation {})",
                stage.name(),
                frame.index,
                frame.generation
            );
            continue;
        }

        if stage.transform(&mut frame) == Transform::Discard {
            continue;
        }

        if let Err(e) = stage.forward(frame, cancel) {
            error!("{} stage failed: {}", stage.name(), e);
            cancel.cancel();
            return Err(e);
        }
    }

    info!("{} stage stopped", stage.name());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::MemoryCapture;
    use crate::pipeline::pool::WorkerPool;
    use image::RgbImage;
    use std::collections::VecDeque;
    use std::time::Duration;

    struct Scripted {
        frames: VecDeque<Frame>,
        forwarded: Arc<parking_lot::Mutex<Vec<i64>>>,
    }

    impl Stage for Scripted {
        fn name(&self) -> &'static str {
            "scripted"
        }

        fn acquire(&mut self, cancel: &CancelToken) -> Option<Frame> {
            let next = self.frames.pop_front();
            if next.is_none() {
                cancel.cancel();
            }
            next
        }

        fn transform(&mut self, frame: &mut Frame) -> Transform {
            if frame.index == 3 {
                Transform::Discard
            } else {
                Transform::Forward
            }
        }

        fn forward(&mut self, frame: Frame, _cancel: &CancelToken) -> Result<()> {
            self.forwarded.lock().push(frame.index);
            Ok(())
        }
    }

    fn frame(index: i64, generation: u64) -> Frame {
        Frame::new(index, generation, RgbImage::new(1, 1))
    }

    #[test]
    fn runner_skips_stale_and_discarded_frames() {
        let authority = ControlAuthority::with_pool(
            Box::new(MemoryCapture::numbered(1, 1, 1)),
            WorkerPool::new(1),
            Duration::from_millis(10),
        );
        authority.open("memory").unwrap();

        let forwarded = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let stage = Scripted {
            frames: [frame(0, 1), frame(1, 0), frame(2, 1), frame(3, 1), frame(4, 2)].into(),
            forwarded: forwarded.clone(),
        };

        run(stage, &authority, &CancelToken::new()).unwrap();
        assert_eq!(*forwarded.lock(), vec![0, 2]);
    }

    #[test]
    fn failed_build_cancels_pipeline() {
        let authority = Arc::new(ControlAuthority::with_pool(
            Box::new(MemoryCapture::numbered(1, 1, 1)),
            WorkerPool::new(1),
            Duration::from_millis(10),
        ));
        let cancel = CancelToken::new();

        let runner = StageRunner::spawn("broken", authority, cancel.clone(), || {
            Err::<Scripted, _>(crate::HighlightError::display("no screen"))
        })
        .unwrap();

        assert!(cancel.wait_timeout(Duration::from_secs(5)));
        assert!(matches!(runner.join(), Err(HighlightError::Display(_))));
    }
}
