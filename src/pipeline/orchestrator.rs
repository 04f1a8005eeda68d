//! Wires the queues and the three stages together and waits for shutdown

use std::sync::Arc;

use tracing::{info, instrument};

use crate::capture::Frame;
use crate::display::{Display, WriterFactory};
use crate::pipeline::cancel::CancelToken;
use crate::pipeline::control::ControlAuthority;
use crate::pipeline::queue::{BoundedQueue, QueueStats};
use crate::pipeline::sink::{SinkSettings, SinkStage};
use crate::pipeline::source::SourceStage;
use crate::pipeline::stage::StageRunner;
use crate::pipeline::track::TrackStage;
use crate::tracking::TrackerFactory;
use crate::{HighlightError, PipelineConfig, Result};

/// Builds the display on the sink thread
pub type DisplayBuilder = Box<dyn FnOnce() -> Result<Box<dyn Display>> + Send>;

/// External capabilities handed to the sink
pub struct Collaborators {
    pub display: DisplayBuilder,
    pub writers: Box<dyn WriterFactory>,
    pub trackers: Arc<dyn TrackerFactory>,
}

/// Final state of a pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineReport {
    pub track_queue: QueueStats,
    pub sink_queue: QueueStats,
    pub generation: u64,
}

pub struct Pipeline {
    authority: Arc<ControlAuthority>,
    cancel: CancelToken,
    queue_capacity: usize,
}

impl Pipeline {
    pub fn new(authority: Arc<ControlAuthority>, config: &PipelineConfig) -> Self {
        Self {
            authority,
            cancel: CancelToken::new(),
            queue_capacity: config.queue_capacity,
        }
    }

    /// Handle that stops the pipeline from outside, e.g. on Ctrl-C
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Start source, track and sink threads and block until the pipeline is
    /// cancelled by the operator, by the end of the video or by a fatal error.
    /// The first stage error, if any, is returned once every thread has
    /// stopped.
    #[instrument(skip_all)]
    pub fn run(self, settings: SinkSettings, collaborators: Collaborators) -> Result<PipelineReport> {
        if !self.authority.is_open() {
            return Err(HighlightError::capture_open("no video loaded"));
        }

        let track_queue = Arc::new(BoundedQueue::<Frame>::new(self.queue_capacity));
        let sink_queue = Arc::new(BoundedQueue::<Frame>::new(self.queue_capacity));

        let mut runners = Vec::with_capacity(3);
        let spawned = self.spawn_all(
            &mut runners,
            &track_queue,
            &sink_queue,
            settings,
            collaborators,
        );

        if spawned.is_ok() {
            self.cancel.wait();
        } else {
            self.cancel.cancel();
        }

        let mut failure = spawned.err();
        for runner in runners {
            let name = runner.name();
            if let Err(e) = runner.join() {
                failure.get_or_insert(e);
            }
            info!("{} stage joined", name);
        }
        if let Some(e) = failure {
            return Err(e);
        }

        let report = PipelineReport {
            track_queue: track_queue.stats(),
            sink_queue: sink_queue.stats(),
            generation: self.authority.generation(),
        };
        info!(?report, "Pipeline stopped");
        Ok(report)
    }

    fn spawn_all(
        &self,
        runners: &mut Vec<StageRunner>,
        track_queue: &Arc<BoundedQueue<Frame>>,
        sink_queue: &Arc<BoundedQueue<Frame>>,
        settings: SinkSettings,
        collaborators: Collaborators,
    ) -> Result<()> {
        let source = {
            let authority = self.authority.clone();
            let output = track_queue.clone();
            StageRunner::spawn("source", self.authority.clone(), self.cancel.clone(), move || {
                Ok(SourceStage::new(authority, output))
            })?
        };
        runners.push(source);

        let track = {
            let authority = self.authority.clone();
            let input = track_queue.clone();
            let output = sink_queue.clone();
            StageRunner::spawn("track", self.authority.clone(), self.cancel.clone(), move || {
                Ok(TrackStage::new(authority, input, output))
            })?
        };
        runners.push(track);

        let sink = {
            let authority = self.authority.clone();
            let input = sink_queue.clone();
            let Collaborators {
                display,
                writers,
                trackers,
            } = collaborators;
            StageRunner::spawn("sink", self.authority.clone(), self.cancel.clone(), move || {
                let display = display()?;
                Ok(SinkStage::new(
                    authority, input, settings, display, writers, trackers,
                ))
            })?
        };
        runners.push(sink);

        Ok(())
    }
}
