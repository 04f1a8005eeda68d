//! Sink stage: shows or records frames and turns operator commands into
//! control-authority mutations

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, instrument, warn};

use crate::capture::Frame;
use crate::display::{
    Command, Display, FrameWriter, OutputFormat, WriterFactory, WriterSettings,
};
use crate::pipeline::cancel::CancelToken;
use crate::pipeline::control::ControlAuthority;
use crate::pipeline::queue::BoundedQueue;
use crate::pipeline::stage::Stage;
use crate::tracking::{TrackedObject, TrackerFactory};
use crate::{metric_names, Config, Result};

/// How long each shown frame waits for input
const INPUT_POLL: Duration = Duration::from_millis(1);
/// Input poll granularity while paused
const PAUSE_POLL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone)]
pub struct SinkSettings {
    pub window: String,
    pub saving_window: String,
    pub output_path: PathBuf,
    pub output_format: String,
    pub rewind_frames: i64,
    pub snapshot_dir: PathBuf,
}

impl SinkSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            window: config.display.window_title.clone(),
            saving_window: config.display.saving_window_title.clone(),
            output_path: PathBuf::from(&config.output.path),
            output_format: config.output.format.clone(),
            rewind_frames: config.display.rewind_frames,
            snapshot_dir: PathBuf::from("."),
        }
    }
}

pub struct SinkStage {
    authority: Arc<ControlAuthority>,
    input: Arc<BoundedQueue<Frame>>,
    settings: SinkSettings,
    display: Box<dyn Display>,
    writers: Box<dyn WriterFactory>,
    trackers: Arc<dyn TrackerFactory>,
    writer: Option<Box<dyn FrameWriter>>,
}

impl SinkStage {
    #[instrument(skip_all, fields(window = %settings.window))]
    pub fn new(
        authority: Arc<ControlAuthority>,
        input: Arc<BoundedQueue<Frame>>,
        settings: SinkSettings,
        display: Box<dyn Display>,
        writers: Box<dyn WriterFactory>,
        trackers: Arc<dyn TrackerFactory>,
    ) -> Self {
        info!("Sink ready, recording to {}", settings.output_path.display());
        Self {
            authority,
            input,
            settings,
            display,
            writers,
            trackers,
            writer: None,
        }
    }

    fn shutdown(&mut self, cancel: &CancelToken) {
        cancel.cancel();
        self.authority.release();
    }

    fn record(&mut self, frame: Frame, cancel: &CancelToken) -> Result<()> {
        if frame.is_end_of_stream() {
            info!("Recording reached the end of the video");
            self.stop_recording(None);
            return Ok(());
        }

        self.display.show(&self.settings.saving_window, &frame.image)?;

        let written = match self.writer.as_mut() {
            Some(writer) => writer.write(&frame.image),
            None => Ok(()),
        };
        if let Err(e) = written {
            error!("Failed to record frame {}: {}", frame.index, e);
            self.stop_recording(None);
            return Ok(());
        }
        metrics::counter!(metric_names::FRAMES_RECORDED).increment(1);

        match self.display.poll_input(INPUT_POLL) {
            Some(Command::ToggleRecording) => self.stop_recording(Some(frame.index + 1)),
            Some(Command::Quit) => {
                self.stop_recording(None);
                self.shutdown(cancel);
            }
            _ => {}
        }
        Ok(())
    }

    fn start_recording(&mut self, frame: &Frame) {
        let Some(info) = self.authority.video_info() else {
            warn!("Cannot start recording at frame {}: no video loaded", frame.index);
            return;
        };

        let settings = WriterSettings {
            path: self.settings.output_path.clone(),
            format: self.settings.output_format.clone(),
            fps: info.fps,
            width: info.width,
            height: info.height,
        };

        match self.writers.open(&settings) {
            Ok(writer) => {
                self.writer = Some(writer);
                self.authority.set_recording(true, Some(frame.index));
            }
            Err(e) => error!(
                "Could not open video writer {} with format {}: {}",
                settings.path.display(),
                settings.format,
                e
            ),
        }
    }

    fn stop_recording(&mut self, return_index: Option<i64>) {
        if let Some(mut writer) = self.writer.take() {
            if let Err(e) = writer.finish() {
                warn!("Failed to finish recording: {}", e);
            }
        }
        self.authority.set_recording(false, return_index);
        self.display.close_window(&self.settings.saving_window);
    }

    fn select_objects(&mut self, frame: &Frame) -> Result<()> {
        if !self.authority.is_open() {
            return Ok(());
        }

        let regions = self
            .display
            .select_regions(&self.settings.window, &frame.image)?;
        if regions.is_empty() {
            return Ok(());
        }

        let objects = regions
            .into_iter()
            .map(|bbox| TrackedObject::start(self.trackers.as_ref(), &frame.image, bbox))
            .collect();
        self.authority.add_trackers_and_rewind(objects, frame.index);
        Ok(())
    }

    fn rewind(&mut self, frames: Option<i64>, frame: &Frame) {
        if !self.authority.is_open() {
            return;
        }
        let target = match frames {
            None => 0,
            Some(frames) => (frame.index - frames).max(0),
        };
        self.authority.set_position(target);
    }

    fn snapshot(&self, frame: &Frame) {
        let format = OutputFormat::parse_or_default(&self.settings.output_format);
        let path = self
            .settings
            .snapshot_dir
            .join(format!("frame_{}.{}", frame.index, format.extension()));
        match frame.image.save(&path) {
            Ok(()) => info!("Saved snapshot {}", path.display()),
            Err(e) => warn!("Failed to save snapshot {}: {}", path.display(), e),
        }
    }

    fn pause(&mut self, frame: &Frame, cancel: &CancelToken) -> Result<()> {
        info!("Paused at frame {}", frame.index);
        while !cancel.is_cancelled() {
            match self.display.poll_input(PAUSE_POLL) {
                Some(Command::Pause) => break,
                Some(command) => return self.handle(command, frame, cancel),
                None => {}
            }
        }
        Ok(())
    }

    fn handle(&mut self, command: Command, frame: &Frame, cancel: &CancelToken) -> Result<()> {
        match command {
            Command::Quit => {
                info!("Quit requested");
                self.shutdown(cancel);
            }
            Command::Pause => self.pause(frame, cancel)?,
            Command::RewindToStart => self.rewind(None, frame),
            Command::RewindInterval => self.rewind(Some(self.settings.rewind_frames), frame),
            Command::SelectObjects => self.select_objects(frame)?,
            Command::ToggleRecording => self.start_recording(frame),
            Command::Snapshot => self.snapshot(frame),
        }
        Ok(())
    }
}

impl Stage for SinkStage {
    fn name(&self) -> &'static str {
        "sink"
    }

    fn acquire(&mut self, cancel: &CancelToken) -> Option<Frame> {
        self.input.wait_and_pop(cancel)
    }

    fn forward(&mut self, frame: Frame, cancel: &CancelToken) -> Result<()> {
        if self.authority.is_recording() {
            return self.record(frame, cancel);
        }

        if frame.is_end_of_stream() {
            info!("End of video");
            self.shutdown(cancel);
            return Ok(());
        }

        self.display.show(&self.settings.window, &frame.image)?;
        metrics::counter!(metric_names::FRAMES_DISPLAYED).increment(1);

        if let Some(command) = self.display.poll_input(INPUT_POLL) {
            self.handle(command, &frame, cancel)?;
        }
        Ok(())
    }
}
