//! Object Highlighter: play a video, track selected objects and record the result

use std::path::PathBuf;
use std::sync::Arc;

use clap::{CommandFactory, Parser};
use color_eyre::{eyre::eyre, Result};
use tracing::info;

use highlighter::capture::ImageSequenceCapture;
use highlighter::display::{Display, ImageSequenceWriterFactory};
use highlighter::pipeline::{Collaborators, ControlAuthority, Pipeline, SinkSettings};
use highlighter::tracking::{TemplateTracker, Tracker};
use highlighter::{Config, CONFIG};

#[derive(Parser, Debug)]
#[command(name = "highlighter", version, about = "Track and highlight objects in a video")]
struct Cli {
    /// Video to play: a directory of numbered image frames
    video: Option<PathBuf>,

    /// Where recordings are written
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Image format of recorded frames (png or jpg)
    #[arg(short, long)]
    format: Option<String>,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("highlighter=info"));

    #[cfg(feature = "profiling")]
    {
        use tracing_subscriber::layer::SubscriberExt;
        use tracing_subscriber::util::SubscriberInitExt;

        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_timer(tracing_subscriber::fmt::time::uptime()))
            .with(tracing_tracy::TracyLayer::default())
            .init();
    }

    #[cfg(not(feature = "profiling"))]
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(tracing_subscriber::fmt::time::uptime())
        .init();
}

#[cfg(feature = "sdl-display")]
fn open_display() -> highlighter::Result<Box<dyn Display>> {
    Ok(Box::new(highlighter::display::Sdl2Display::new()?))
}

#[cfg(not(feature = "sdl-display"))]
fn open_display() -> highlighter::Result<Box<dyn Display>> {
    Err(highlighter::HighlightError::display(
        "built without a display backend",
    ))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let Some(video) = cli.video.clone() else {
        Cli::command().print_help()?;
        println!();
        return Ok(());
    };

    color_eyre::install()?;
    init_tracing();

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(output) = &cli.output {
        config.output.path = output.to_string_lossy().into_owned();
    }
    if let Some(format) = &cli.format {
        config.output.format = format.clone();
    }
    CONFIG.store(Arc::new(config.clone()));

    info!("Object Highlighter launching...");

    let capture = ImageSequenceCapture::new(config.capture.clone());
    let authority = Arc::new(ControlAuthority::new(Box::new(capture), &config.pipeline));

    let source = video.to_string_lossy();
    authority
        .open(&source)
        .map_err(|e| eyre!("Could not open video {}: {}", source, e))?;

    if let Some(info) = authority.video_info() {
        println!("{}", info);
    }

    let collaborators = Collaborators {
        display: Box::new(open_display),
        writers: Box::new(ImageSequenceWriterFactory),
        trackers: Arc::new(|| Box::new(TemplateTracker::default()) as Box<dyn Tracker>),
    };
    let settings = SinkSettings::from_config(&CONFIG.load());

    let pipeline = Pipeline::new(authority, &config.pipeline);
    let cancel = pipeline.cancel_token();
    let mut run = tokio::task::spawn_blocking(move || pipeline.run(settings, collaborators));

    let report = tokio::select! {
        joined = &mut run => joined?,
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, shutting down");
            cancel.cancel();
            run.await?
        }
    }?;

    info!(
        "Done: {} frames through tracking, {} stale frames dropped before display",
        report.track_queue.popped, report.sink_queue.dropped
    );
    Ok(())
}
