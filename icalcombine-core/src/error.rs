//! Error types for icalcombine.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while acquiring or merging calendars.
#[derive(Error, Debug)]
pub enum CombineError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Directory {} not writable or doesn't exist", .0.display())]
    DirectoryNotWritable(PathBuf),

    #[error("Browser error: {0}")]
    Browser(String),

    #[error(
        "No Chromium or Chrome binary found. Install one or set browser.executable in the config"
    )]
    BrowserNotInstalled,

    /// The frame's document was replaced while it was being driven.
    #[error("Frame context went away: {0}")]
    StaleContext(String),

    #[error("Timed out after {secs}s waiting for {what}")]
    Timeout { what: String, secs: u64 },

    #[error("Interrupted")]
    Interrupted,

    #[error("ICS parse error: {0}")]
    IcsParse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for icalcombine operations.
pub type CombineResult<T> = Result<T, CombineError>;
