//! Error types for the highlighter library

use thiserror::Error;

/// Result type alias for the highlighter library
pub type Result<T> = std::result::Result<T, HighlightError>;

/// Errors that can surface from capabilities and configuration.
///
/// Staleness, end of stream and cancellation are not errors and never
/// appear here.
#[derive(Error, Debug)]
pub enum HighlightError {
    #[error("Could not open capture source: {0}")]
    CaptureOpen(String),

    #[error("Could not open frame writer: {0}")]
    WriterOpen(String),

    #[error("Display error: {0}")]
    Display(String),

    #[error("{0} stage panicked")]
    StagePanicked(&'static str),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),
}

impl HighlightError {
    pub fn capture_open<S: Into<String>>(msg: S) -> Self {
        Self::CaptureOpen(msg.into())
    }

    pub fn writer_open<S: Into<String>>(msg: S) -> Self {
        Self::WriterOpen(msg.into())
    }

    pub fn display<S: Into<String>>(msg: S) -> Self {
        Self::Display(msg.into())
    }
}
