use std::sync::Arc;

use crate::capture::Frame;
use crate::pipeline::cancel::CancelToken;
use crate::pipeline::control::ControlAuthority;
use crate::pipeline::queue::BoundedQueue;
use crate::pipeline::stage::{Stage, Transform};
use crate::Result;

/// Draws tracker overlays onto frames between the source and the sink
pub struct TrackStage {
    authority: Arc<ControlAuthority>,
    input: Arc<BoundedQueue<Frame>>,
    output: Arc<BoundedQueue<Frame>>,
}

impl TrackStage {
    pub fn new(
        authority: Arc<ControlAuthority>,
        input: Arc<BoundedQueue<Frame>>,
        output: Arc<BoundedQueue<Frame>>,
    ) -> Self {
        Self {
            authority,
            input,
            output,
        }
    }
}

impl Stage for TrackStage {
    fn name(&self) -> &'static str {
        "track"
    }

    fn acquire(&mut self, cancel: &CancelToken) -> Option<Frame> {
        self.input.wait_and_pop(cancel)
    }

    fn transform(&mut self, frame: &mut Frame) -> Transform {
        if self.authority.update_and_draw_trackers(frame) {
            Transform::Forward
        } else {
            // Generation moved: whatever we already passed on is stale too
            self.output.clear();
            Transform::Discard
        }
    }

    fn forward(&mut self, frame: Frame, cancel: &CancelToken) -> Result<()> {
        self.output.push(frame, cancel);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::MemoryCapture;
    use crate::pipeline::pool::WorkerPool;
    use image::RgbImage;
    use std::time::Duration;

    fn stage() -> (TrackStage, Arc<ControlAuthority>, Arc<BoundedQueue<Frame>>) {
        let authority = Arc::new(ControlAuthority::with_pool(
            Box::new(MemoryCapture::numbered(4, 4, 4)),
            WorkerPool::new(1),
            Duration::from_millis(50),
        ));
        authority.open("memory").unwrap();
        let input = Arc::new(BoundedQueue::new(4));
        let output = Arc::new(BoundedQueue::new(4));
        let stage = TrackStage::new(authority.clone(), input, output.clone());
        (stage, authority, output)
    }

    #[test]
    fn stale_frame_clears_downstream_and_is_discarded() {
        let (mut stage, authority, output) = stage();
        let cancel = CancelToken::new();
        let old = authority.generation();
        output.push(Frame::new(0, old, RgbImage::new(4, 4)), &cancel);
        output.push(Frame::new(1, old, RgbImage::new(4, 4)), &cancel);

        authority.set_position(0);

        let mut frame = Frame::new(2, old, RgbImage::new(4, 4));
        assert_eq!(stage.transform(&mut frame), Transform::Discard);
        assert!(output.is_empty());
        assert_eq!(output.stats().dropped, 2);
    }

    #[test]
    fn current_frame_is_forwarded() {
        let (mut stage, authority, output) = stage();
        let cancel = CancelToken::new();

        let mut frame = authority.read_next();
        assert_eq!(stage.transform(&mut frame), Transform::Forward);
        stage.forward(frame, &cancel).unwrap();

        assert_eq!(output.len(), 1);
        assert_eq!(output.wait_and_pop(&cancel).map(|f| f.index), Some(0));
    }
}
