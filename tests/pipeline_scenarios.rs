//! End-to-end runs of the three-stage pipeline with a scripted operator

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use image::RgbImage;
use parking_lot::Mutex;

use highlighter::capture::MemoryCapture;
use highlighter::display::{Command, Display, FrameWriter, WriterFactory, WriterSettings};
use highlighter::pipeline::{
    Collaborators, ControlAuthority, Pipeline, PipelineReport, SinkSettings, WorkerPool,
};
use highlighter::tracking::Tracker;
use highlighter::{PipelineConfig, Rect, Result};

const MAIN: &str = "main";
const SAVING: &str = "saving";
const SELECTION: Rect = Rect::new(4, 4, 4, 4);

#[derive(Debug, Clone, PartialEq, Eq)]
struct Shown {
    window: String,
    index: i64,
    highlighted: bool,
}

/// Plays the operator: answers `poll_input` with the command scripted for
/// the window and frame index last shown, once per script entry
struct ScriptedDisplay {
    shown: Arc<Mutex<Vec<Shown>>>,
    script: Vec<(&'static str, i64, Command)>,
    last: Option<(String, i64)>,
}

impl Display for ScriptedDisplay {
    fn show(&mut self, window: &str, image: &RgbImage) -> Result<()> {
        let index = image.get_pixel(0, 0)[0] as i64;
        let highlighted = image.get_pixel(5, 5)[1] > 0;
        self.shown.lock().push(Shown {
            window: window.to_string(),
            index,
            highlighted,
        });
        self.last = Some((window.to_string(), index));
        Ok(())
    }

    fn poll_input(&mut self, timeout: Duration) -> Option<Command> {
        let (window, index) = self.last.clone()?;
        let found = self
            .script
            .iter()
            .position(|(w, i, _)| *w == window && *i == index);
        match found {
            Some(pos) => Some(self.script.remove(pos).2),
            None => {
                thread::sleep(timeout.min(Duration::from_millis(5)));
                None
            }
        }
    }

    fn select_regions(&mut self, _window: &str, _image: &RgbImage) -> Result<Vec<Rect>> {
        Ok(vec![SELECTION])
    }

    fn close_window(&mut self, _window: &str) {}
}

struct MemoryWriter(Arc<Mutex<Vec<i64>>>);

impl FrameWriter for MemoryWriter {
    fn write(&mut self, image: &RgbImage) -> Result<()> {
        self.0.lock().push(image.get_pixel(0, 0)[0] as i64);
        Ok(())
    }
}

struct MemoryWriterFactory(Arc<Mutex<Vec<i64>>>);

impl WriterFactory for MemoryWriterFactory {
    fn open(&mut self, _settings: &WriterSettings) -> Result<Box<dyn FrameWriter>> {
        Ok(Box::new(MemoryWriter(self.0.clone())))
    }
}

/// Reports the target where it was selected
struct StillTracker;

impl Tracker for StillTracker {
    fn init(&mut self, _image: &RgbImage, _bbox: Rect) {}

    fn update(&mut self, _image: &RgbImage, _bbox: &mut Rect) -> bool {
        true
    }
}

struct Harness {
    authority: Arc<ControlAuthority>,
    pipeline: Pipeline,
    shown: Arc<Mutex<Vec<Shown>>>,
    recorded: Arc<Mutex<Vec<i64>>>,
    dir: tempfile::TempDir,
}

impl Harness {
    fn new(frames: usize) -> Self {
        let authority = Arc::new(ControlAuthority::with_pool(
            Box::new(MemoryCapture::numbered(frames, 16, 16)),
            WorkerPool::new(2),
            Duration::from_millis(500),
        ));
        authority.open("memory").unwrap();

        let config = PipelineConfig {
            queue_capacity: 2,
            ..PipelineConfig::default()
        };
        let pipeline = Pipeline::new(authority.clone(), &config);

        Self {
            authority,
            pipeline,
            shown: Arc::default(),
            recorded: Arc::default(),
            dir: tempfile::tempdir().unwrap(),
        }
    }

    fn run(self, script: Vec<(&'static str, i64, Command)>) -> Outcome {
        let settings = SinkSettings {
            window: MAIN.into(),
            saving_window: SAVING.into(),
            output_path: self.dir.path().join("recording"),
            output_format: "png".into(),
            rewind_frames: 300,
            snapshot_dir: self.dir.path().to_path_buf(),
        };

        let shown = self.shown.clone();
        let collaborators = Collaborators {
            display: Box::new(move || -> Result<Box<dyn Display>> {
                Ok(Box::new(ScriptedDisplay {
                    shown,
                    script,
                    last: None,
                }) as Box<dyn Display>)
            }),
            writers: Box::new(MemoryWriterFactory(self.recorded.clone())),
            trackers: Arc::new(|| Box::new(StillTracker) as Box<dyn Tracker>),
        };

        let report = self.pipeline.run(settings, collaborators).unwrap();
        let shown = self.shown.lock().clone();
        let recorded = self.recorded.lock().clone();
        Outcome {
            authority: self.authority,
            report,
            shown,
            recorded,
        }
    }
}

struct Outcome {
    authority: Arc<ControlAuthority>,
    report: PipelineReport,
    shown: Vec<Shown>,
    recorded: Vec<i64>,
}

impl Outcome {
    fn indices(&self, window: &str) -> Vec<i64> {
        self.shown
            .iter()
            .filter(|s| s.window == window)
            .map(|s| s.index)
            .collect()
    }
}

#[test]
fn plays_every_frame_in_order_then_stops() {
    let outcome = Harness::new(10).run(Vec::new());

    assert_eq!(outcome.indices(MAIN), (0..10).collect::<Vec<_>>());
    assert!(outcome.shown.iter().all(|s| !s.highlighted));
    assert!(outcome.recorded.is_empty());

    // opened, then released at the end of the video
    assert_eq!(outcome.report.generation, 2);
    assert!(!outcome.authority.is_open());
    assert_eq!(outcome.report.track_queue.popped, outcome.report.track_queue.pushed);
}

#[test]
fn selecting_an_object_replays_the_current_frame_highlighted() {
    let outcome = Harness::new(10).run(vec![(MAIN, 3, Command::SelectObjects)]);

    let expected: Vec<i64> = vec![0, 1, 2, 3, 3, 4, 5, 6, 7, 8, 9];
    assert_eq!(outcome.indices(MAIN), expected);

    let highlighted: Vec<bool> = outcome.shown.iter().map(|s| s.highlighted).collect();
    assert_eq!(&highlighted[..4], &[false; 4]);
    assert!(highlighted[4..].iter().all(|h| *h));

    assert_eq!(outcome.authority.tracker_count(), 1);
    // open, selection, release
    assert_eq!(outcome.report.generation, 3);
}

#[test]
fn recording_writes_from_the_start_and_resumes_after_the_last_saved_frame() {
    let outcome = Harness::new(10).run(vec![
        (MAIN, 5, Command::ToggleRecording),
        (SAVING, 8, Command::ToggleRecording),
    ]);

    assert_eq!(outcome.recorded, (0..=8).collect::<Vec<_>>());
    assert_eq!(outcome.indices(SAVING), (0..=8).collect::<Vec<_>>());
    assert_eq!(outcome.indices(MAIN), vec![0, 1, 2, 3, 4, 5, 9]);
    assert!(!outcome.authority.is_recording());

    // open, start, stop, release
    assert_eq!(outcome.report.generation, 4);
}

#[test]
fn recording_stops_at_end_of_video() {
    let outcome = Harness::new(6).run(vec![(MAIN, 4, Command::ToggleRecording)]);

    assert_eq!(outcome.recorded, (0..6).collect::<Vec<_>>());
    // back to where recording started, then on to the end
    assert_eq!(outcome.indices(MAIN), vec![0, 1, 2, 3, 4, 4, 5]);
    assert!(!outcome.authority.is_recording());
}

#[test]
fn rewind_to_start_replays_from_frame_zero() {
    let outcome = Harness::new(5).run(vec![(MAIN, 2, Command::RewindToStart)]);

    assert_eq!(outcome.indices(MAIN), vec![0, 1, 2, 0, 1, 2, 3, 4]);
}

#[test]
fn quit_stops_the_pipeline_early() {
    let outcome = Harness::new(50).run(vec![(MAIN, 1, Command::Quit)]);

    assert_eq!(outcome.indices(MAIN), vec![0, 1]);
    assert!(!outcome.authority.is_open());
}

#[test]
fn external_cancel_unblocks_a_paused_pipeline() {
    let harness = Harness::new(10);
    let cancel = harness.pipeline.cancel_token();

    let canceller = thread::spawn(move || {
        thread::sleep(Duration::from_millis(100));
        cancel.cancel();
    });

    let start = Instant::now();
    let outcome = harness.run(vec![(MAIN, 0, Command::Pause)]);
    canceller.join().unwrap();

    assert!(start.elapsed() < Duration::from_secs(5));
    assert_eq!(outcome.indices(MAIN), vec![0]);
    // cancelled from outside: the capture stays open
    assert_eq!(outcome.report.generation, 1);
    assert!(outcome.authority.is_open());
}

#[test]
fn display_failure_is_reported_and_stops_every_stage() {
    let harness = Harness::new(10);
    let settings = SinkSettings::from_config(&highlighter::Config::default());
    let collaborators = Collaborators {
        display: Box::new(|| -> Result<Box<dyn Display>> {
            Err(highlighter::HighlightError::display("no screen"))
        }),
        writers: Box::new(MemoryWriterFactory(harness.recorded.clone())),
        trackers: Arc::new(|| Box::new(StillTracker) as Box<dyn Tracker>),
    };

    let result = harness.pipeline.run(settings, collaborators);
    assert!(matches!(
        result,
        Err(highlighter::HighlightError::Display(_))
    ));
}
