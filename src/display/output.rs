//! Recording output as a numbered image sequence

use std::path::PathBuf;
use std::str::FromStr;

use image::RgbImage;
use tracing::{info, warn};

use crate::display::{FrameWriter, WriterFactory, WriterSettings};
use crate::{HighlightError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Png,
    Jpeg,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Png => "png",
            OutputFormat::Jpeg => "jpg",
        }
    }

    /// Parse `name`, falling back to PNG with a warning
    pub fn parse_or_default(name: &str) -> Self {
        name.parse().unwrap_or_else(|_| {
            warn!("Unknown output format {:?}, using png", name);
            OutputFormat::Png
        })
    }
}

impl FromStr for OutputFormat {
    type Err = HighlightError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "png" => Ok(OutputFormat::Png),
            "jpg" | "jpeg" => Ok(OutputFormat::Jpeg),
            other => Err(HighlightError::writer_open(format!(
                "unsupported format {}",
                other
            ))),
        }
    }
}

/// Writes `frame_000000.<ext>`, `frame_000001.<ext>`, ... into a directory
pub struct ImageSequenceWriter {
    dir: PathBuf,
    format: OutputFormat,
    next: u64,
}

impl ImageSequenceWriter {
    pub fn create(dir: PathBuf, format: OutputFormat) -> Result<Self> {
        std::fs::create_dir_all(&dir)
            .map_err(|e| HighlightError::writer_open(format!("{}: {}", dir.display(), e)))?;
        info!("Recording {} frames into {}", format.extension(), dir.display());
        Ok(Self {
            dir,
            format,
            next: 0,
        })
    }

    pub fn frames_written(&self) -> u64 {
        self.next
    }
}

impl FrameWriter for ImageSequenceWriter {
    fn write(&mut self, image: &RgbImage) -> Result<()> {
        let path = self
            .dir
            .join(format!("frame_{:06}.{}", self.next, self.format.extension()));
        image.save(&path)?;
        self.next += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        info!("Recorded {} frames into {}", self.next, self.dir.display());
        Ok(())
    }
}

/// Opens an [`ImageSequenceWriter`] at the configured output path
#[derive(Debug, Default)]
pub struct ImageSequenceWriterFactory;

impl WriterFactory for ImageSequenceWriterFactory {
    fn open(&mut self, settings: &WriterSettings) -> Result<Box<dyn FrameWriter>> {
        if settings.path.as_os_str().is_empty() {
            return Err(HighlightError::writer_open("no output path configured"));
        }
        let format = OutputFormat::parse_or_default(&settings.format);
        Ok(Box::new(ImageSequenceWriter::create(
            settings.path.clone(),
            format,
        )?))
    }
}
