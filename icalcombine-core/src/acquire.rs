//! Source Acquirer: exports one hosted calendar into the download directory.
//!
//! Every acquisition runs in its own freshly launched browser session, so
//! nothing carries over between sources; state is still cleared before
//! navigating. The session is closed on every path out of [`SourceAcquirer::acquire`],
//! including timeouts and user interruption.

use std::collections::HashSet;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, error, info};

use crate::browser::{BrowserLauncher, BrowserSession, Locator};
use crate::config::BrowserSettings;
use crate::directory::list_files;
use crate::error::{CombineError, CombineResult};
use crate::interrupt::InterruptSignal;
use crate::wait::Wait;

/// Suffix Chromium uses for downloads still in progress.
const PARTIAL_DOWNLOAD_SUFFIX: &str = ".crdownload";

/// The UI path from a loaded page to a finished export download.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ExportSequence {
    /// Frame hosting the calendar UI.
    pub frame: Locator,
    /// Controls clicked in order inside the frame.
    pub steps: Vec<ExportStep>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ExportStep {
    pub name: String,
    pub locator: Locator,
}

impl Default for ExportSequence {
    /// CryptPad calendar: options menu, "Export", then the dialog's download button.
    fn default() -> Self {
        let step = |name: &str, xpath: &str| ExportStep {
            name: name.to_string(),
            locator: Locator::XPath(xpath.to_string()),
        };

        ExportSequence {
            frame: Locator::Id("sbox-iframe".to_string()),
            steps: vec![
                step(
                    "calendar options",
                    r#"//*[@id="cp-sidebarlayout-leftside"]/div/div[2]/span[3]/button"#,
                ),
                step(
                    "export",
                    r#"//*[@id="cp-sidebarlayout-leftside"]/div/div[2]/span[3]/div/ul/li[3]/a"#,
                ),
                step("download", "/html/body/div[5]/div/div/nav/button[2]"),
            ],
        }
    }
}

pub struct SourceAcquirer<L: BrowserLauncher> {
    launcher: L,
    download_dir: PathBuf,
    sequence: ExportSequence,
    element_wait: Wait,
    download_wait: Wait,
    interrupt: InterruptSignal,
}

impl<L: BrowserLauncher> SourceAcquirer<L> {
    pub fn new(
        launcher: L,
        download_dir: PathBuf,
        sequence: ExportSequence,
        settings: &BrowserSettings,
    ) -> Self {
        SourceAcquirer {
            launcher,
            download_dir,
            sequence,
            element_wait: Wait::new(settings.element_timeout(), settings.poll_interval()),
            download_wait: Wait::new(settings.download_timeout(), settings.poll_interval()),
            interrupt: InterruptSignal::new(),
        }
    }

    pub fn with_interrupt(mut self, interrupt: InterruptSignal) -> Self {
        self.interrupt = interrupt;
        self
    }

    pub fn download_dir(&self) -> &Path {
        &self.download_dir
    }

    /// Export `url` into the download directory and return the new file.
    ///
    /// Failures are logged here and returned as values; nothing escapes
    /// past this boundary as a panic.
    pub async fn acquire(&self, url: &str) -> CombineResult<PathBuf> {
        let mut interrupted = self.interrupt.subscribe();

        let result: CombineResult<PathBuf> = async {
            let mut session = self.launcher.launch(&self.download_dir).await?;

            let result = tokio::select! {
                result = self.drive(&mut session, url) => result,
                _ = interrupted.requested() => Err(CombineError::Interrupted),
            };

            if let Err(e) = session.close().await {
                error!("Failed to close browser session for {url}: {e}");
            }
            result
        }
        .await;

        match &result {
            Ok(path) => debug!("Export of {url} saved as {}", path.display()),
            Err(CombineError::Interrupted) => {}
            Err(e) => error!("Error during download of {url}: {e}"),
        }
        result
    }

    async fn drive(&self, session: &mut L::Session, url: &str) -> CombineResult<PathBuf> {
        let existing = self.completed_downloads()?;

        session.clear_state().await?;
        session.navigate(url).await?;
        info!("Loading {url}");

        let frame = &self.sequence.frame;
        self.element_wait
            .within(&format!("frame {frame}"), async {
                while !not_yet_on_stale(session.enter_frame(frame).await)? {
                    self.element_wait.pause().await;
                }
                Ok(())
            })
            .await?;

        for step in &self.sequence.steps {
            let what = format!("{} control ({})", step.name, step.locator);
            self.element_wait
                .within(&what, async {
                    while !not_yet_on_stale(session.click(&step.locator).await)? {
                        self.element_wait.pause().await;
                    }
                    Ok(())
                })
                .await?;
            debug!("Clicked {} control", step.name);
        }

        let existing = &existing;
        self.download_wait
            .until("download to finish", || async move {
                let current = self.completed_downloads()?;
                Ok(current
                    .into_iter()
                    .find(|name| !existing.contains(name))
                    .map(|name| self.download_dir.join(name)))
            })
            .await
    }

    /// Names of finished downloads currently in the download directory.
    fn completed_downloads(&self) -> CombineResult<HashSet<OsString>> {
        Ok(list_files(&self.download_dir)?
            .into_iter()
            .filter_map(|path| path.file_name().map(|name| name.to_os_string()))
            .filter(|name| !name.to_string_lossy().ends_with(PARTIAL_DOWNLOAD_SUFFIX))
            .collect())
    }
}

/// A frame that navigated between polls is not ready yet; the next poll
/// looks it up again.
fn not_yet_on_stale(polled: CombineResult<bool>) -> CombineResult<bool> {
    match polled {
        Err(CombineError::StaleContext(e)) => {
            debug!("Retrying after frame change: {e}");
            Ok(false)
        }
        other => other,
    }
}
