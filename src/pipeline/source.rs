use std::sync::Arc;

use tracing::debug;

use crate::capture::Frame;
use crate::pipeline::cancel::CancelToken;
use crate::pipeline::control::ControlAuthority;
use crate::pipeline::queue::BoundedQueue;
use crate::pipeline::stage::Stage;
use crate::Result;

/// Reads frames from the authority's capture into the track queue.
///
/// After forwarding the end-of-stream sentinel it parks until the
/// generation moves (a rewind, a recording toggle, a release).
pub struct SourceStage {
    authority: Arc<ControlAuthority>,
    output: Arc<BoundedQueue<Frame>>,
}

impl SourceStage {
    pub fn new(authority: Arc<ControlAuthority>, output: Arc<BoundedQueue<Frame>>) -> Self {
        Self { authority, output }
    }
}

impl Stage for SourceStage {
    fn name(&self) -> &'static str {
        "source"
    }

    fn acquire(&mut self, _cancel: &CancelToken) -> Option<Frame> {
        Some(self.authority.read_next())
    }

    fn forward(&mut self, frame: Frame, cancel: &CancelToken) -> Result<()> {
        let parked_at = frame.is_end_of_stream().then_some(frame.generation);
        self.output.push(frame, cancel);

        if let Some(generation) = parked_at {
            debug!("End of stream at generation {}, waiting", generation);
            self.authority.generation_wait(generation, cancel);
        }
        Ok(())
    }
}
