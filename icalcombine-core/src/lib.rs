//! Core pipeline for icalcombine.
//!
//! Two stages run one after the other:
//! - acquisition: a headless browser exports one `.ics` file per configured
//!   source into the download directory ([`acquire`], [`download`])
//! - merge: every file in the download directory is absorbed into a single
//!   `calendar.ics` in the export directory ([`merge`], [`ics`])

pub mod acquire;
pub mod browser;
pub mod config;
pub mod directory;
pub mod download;
pub mod error;
pub mod ics;
pub mod interrupt;
pub mod merge;
pub mod wait;

pub use acquire::{ExportSequence, SourceAcquirer};
pub use browser::Locator;
pub use config::{CombineConfig, FailedFilePolicy};
pub use download::{BatchDownloader, BatchReport, SourceOutcome};
pub use error::{CombineError, CombineResult};
pub use interrupt::InterruptSignal;
pub use merge::{CalendarMerger, MergeOutcome};
