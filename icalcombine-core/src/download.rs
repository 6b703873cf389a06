//! Batch Downloader: one acquisition attempt per configured source.

use std::path::PathBuf;

use tracing::{debug, error, info, warn};

use crate::acquire::SourceAcquirer;
use crate::browser::BrowserLauncher;
use crate::directory::{display_names, list_files};
use crate::error::CombineError;

/// What happened to one source.
#[derive(Debug)]
pub enum SourceOutcome {
    Downloaded(PathBuf),
    Failed(CombineError),
    /// The user interrupted this acquisition; the batch moved on.
    Interrupted,
}

#[derive(Debug)]
pub struct SourceReport {
    pub url: String,
    pub outcome: SourceOutcome,
}

/// Result of a whole batch, in source order.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub sources: Vec<SourceReport>,
    /// Download directory contents after the batch.
    pub files: Vec<PathBuf>,
}

impl BatchReport {
    pub fn succeeded(&self) -> impl Iterator<Item = &str> {
        self.sources
            .iter()
            .filter(|s| matches!(s.outcome, SourceOutcome::Downloaded(_)))
            .map(|s| s.url.as_str())
    }

    pub fn failed_count(&self) -> usize {
        self.sources
            .iter()
            .filter(|s| !matches!(s.outcome, SourceOutcome::Downloaded(_)))
            .count()
    }
}

pub struct BatchDownloader<L: BrowserLauncher> {
    acquirer: SourceAcquirer<L>,
}

impl<L: BrowserLauncher> BatchDownloader<L> {
    pub fn new(acquirer: SourceAcquirer<L>) -> Self {
        BatchDownloader { acquirer }
    }

    /// Attempt every source exactly once, in order, continuing past
    /// failures. Zero successes is not an error; the merge reports the
    /// empty directory itself.
    pub async fn run(&self, urls: &[String]) -> BatchReport {
        let mut report = BatchReport::default();

        for url in urls {
            let outcome = match self.acquirer.acquire(url).await {
                Ok(path) => {
                    info!("Downloaded .ics from {url}");
                    self.log_listing(tracing::Level::DEBUG);
                    SourceOutcome::Downloaded(path)
                }
                Err(CombineError::Interrupted) => {
                    debug!("Ctrl+C detected, skipping URL {url}");
                    SourceOutcome::Interrupted
                }
                Err(e) => {
                    error!("Something went wrong downloading the ics file from {url}: {e}");
                    SourceOutcome::Failed(e)
                }
            };
            report.sources.push(SourceReport {
                url: url.clone(),
                outcome,
            });
        }

        report.files = self.log_listing(tracing::Level::INFO);
        report
    }

    fn log_listing(&self, level: tracing::Level) -> Vec<PathBuf> {
        let dir = self.acquirer.download_dir();
        match list_files(dir) {
            Ok(files) => {
                let names = display_names(&files);
                if level == tracing::Level::INFO {
                    info!("All files in {}: {names:?}", dir.display());
                } else {
                    debug!("Files in download dir: {names:?}");
                }
                files
            }
            Err(e) => {
                warn!("Could not list {}: {e}", dir.display());
                Vec::new()
            }
        }
    }
}
