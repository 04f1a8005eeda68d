pub mod capture;
pub mod display;
pub mod error;
pub mod pipeline;
pub mod tracking;
pub mod utils;

use std::path::Path;

use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};

pub use capture::{Frame, Rect};
pub use error::{HighlightError, Result};

/// Global configuration that can be atomically swapped at runtime
pub static CONFIG: once_cell::sync::Lazy<ArcSwap<Config>> =
    once_cell::sync::Lazy::new(|| ArcSwap::from_pointee(Config::default()));

/// Prefix for environment overrides, e.g. `HIGHLIGHTER__PIPELINE__QUEUE_CAPACITY=4`
const ENV_PREFIX: &str = "HIGHLIGHTER";

/// System configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub capture: CaptureConfig,
    pub pipeline: PipelineConfig,
    pub display: DisplayConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Frame rate reported for image sequences, which carry no timing
    pub fps: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub queue_capacity: usize,
    pub tracker_threads: usize,
    /// Upper bound on the per-frame wait for tracker updates
    pub tracker_timeout_ms: u64,
    pub pin_workers: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub window_title: String,
    pub saving_window_title: String,
    /// Frames skipped backwards by the rewind-by-interval command
    pub rewind_frames: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub path: String,
    pub format: String,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self { fps: 30.0 }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 8,
            tracker_threads: 4,
            tracker_timeout_ms: 100,
            pin_workers: false,
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            window_title: "Object Highlighter".into(),
            saving_window_title: "Saving...".into(),
            // 10 seconds at 30 fps
            rewind_frames: 10 * 30,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: "output".into(),
            format: "png".into(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            capture: CaptureConfig::default(),
            pipeline: PipelineConfig::default(),
            display: DisplayConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

impl Config {
    /// Layer an optional TOML file and `HIGHLIGHTER__*` environment
    /// variables over the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder()
            .add_source(config::Config::try_from(&Config::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let settings = builder
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}

/// Metric names recorded throughout the pipeline
pub mod metric_names {
    pub const FRAMES_READ: &str = "frames_read";
    pub const FRAMES_STALE_DROPPED: &str = "frames_stale_dropped";
    pub const FRAMES_DISPLAYED: &str = "frames_displayed";
    pub const FRAMES_RECORDED: &str = "frames_recorded";
    pub const TRACKER_TIMEOUTS: &str = "tracker_timeouts";
    pub const TRACKER_UPDATE_US: &str = "tracker_update_us";
}
