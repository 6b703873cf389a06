//! Chromium-driven browser sessions using chromiumoxide.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::browser::{
    SetDownloadBehaviorBehavior, SetDownloadBehaviorParams,
};
use chromiumoxide::cdp::browser_protocol::dom::DescribeNodeParams;
use chromiumoxide::cdp::browser_protocol::network::{
    ClearBrowserCacheParams, ClearBrowserCookiesParams,
};
use chromiumoxide::cdp::browser_protocol::page::FrameId;
use chromiumoxide::cdp::browser_protocol::storage::ClearDataForOriginParams;
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use chromiumoxide::page::Page;
use futures::StreamExt;
use tempfile::TempDir;
use tokio::task::JoinHandle;
use tracing::instrument::WithSubscriber;
use tracing::{debug, warn};

use super::{BrowserLauncher, BrowserSession, Locator};
use crate::error::{CombineError, CombineResult};

const CHROMIUM_PATH_ENV: &str = "ICALCOMBINE_CHROMIUM_PATH";

/// Find a Chromium or Chrome binary.
pub fn find_chromium() -> Option<PathBuf> {
    if let Ok(p) = std::env::var(CHROMIUM_PATH_ENV) {
        let path = PathBuf::from(&p);
        if path.exists() {
            return Some(path);
        }
    }

    ["google-chrome", "chromium", "chromium-browser", "google-chrome-stable"]
        .iter()
        .find_map(|name| which::which(name).ok())
}

fn cdp_error(e: impl std::fmt::Display) -> CombineError {
    CombineError::Browser(e.to_string())
}

/// Evaluating against a context that was torn down by a frame navigation
/// fails with one of these messages.
const STALE_CONTEXT_MESSAGES: [&str; 2] = ["Cannot find context", "context was destroyed"];

fn evaluate_error(e: impl std::fmt::Display) -> CombineError {
    let message = e.to_string();
    if STALE_CONTEXT_MESSAGES.iter().any(|m| message.contains(m)) {
        CombineError::StaleContext(message)
    } else {
        CombineError::Browser(message)
    }
}

/// Launches one Chromium process per session, each with a throwaway profile.
#[derive(Debug, Clone)]
pub struct ChromiumLauncher {
    executable: Option<PathBuf>,
    headless: bool,
}

impl ChromiumLauncher {
    pub fn new(executable: Option<PathBuf>, headless: bool) -> Self {
        ChromiumLauncher {
            executable,
            headless,
        }
    }
}

#[async_trait]
impl BrowserLauncher for ChromiumLauncher {
    type Session = ChromiumSession;

    async fn launch(&self, download_dir: &Path) -> CombineResult<ChromiumSession> {
        let executable = self
            .executable
            .clone()
            .or_else(find_chromium)
            .ok_or(CombineError::BrowserNotInstalled)?;

        let profile = tempfile::Builder::new()
            .prefix("icalcombine-profile-")
            .tempdir()?;

        let mut builder = BrowserConfig::builder()
            .chrome_executable(executable)
            .user_data_dir(profile.path())
            .no_sandbox()
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            // keep the cross-origin sandbox frame in-process so its
            // execution context is reachable from this page
            .arg("--disable-site-isolation-trials")
            .arg("--disable-features=IsolateOrigins,site-per-process");
        builder = if self.headless {
            builder.new_headless_mode()
        } else {
            builder.with_head()
        };
        let config = builder
            .build()
            .map_err(|e| CombineError::Browser(format!("failed to build browser config: {e}")))?;

        let (browser, mut handler) = Browser::launch(config).await.map_err(cdp_error)?;

        let handler = tokio::spawn(
            async move {
                while let Some(event) = handler.next().await {
                    if let Err(e) = event {
                        debug!("Browser handler: {e}");
                    }
                }
            }
            .with_current_subscriber(),
        );

        let mut session = ChromiumSession {
            browser,
            page: None,
            handler,
            frame: None,
            _profile: profile,
        };

        // From here on the process must be shut down on any error
        match session.open_page(download_dir).await {
            Ok(()) => Ok(session),
            Err(e) => {
                let _ = session.close().await;
                Err(e)
            }
        }
    }
}

/// A running Chromium process with one page.
pub struct ChromiumSession {
    browser: Browser,
    page: Option<Page>,
    handler: JoinHandle<()>,
    /// Frame entered last; `None` is the top page. Its execution context is
    /// looked up on every evaluation because the frame may navigate.
    frame: Option<FrameId>,
    _profile: TempDir,
}

impl ChromiumSession {
    async fn open_page(&mut self, download_dir: &Path) -> CombineResult<()> {
        let behavior = SetDownloadBehaviorParams::builder()
            .behavior(SetDownloadBehaviorBehavior::Allow)
            .download_path(download_dir.to_string_lossy())
            .build()
            .map_err(CombineError::Browser)?;
        self.browser.execute(behavior).await.map_err(cdp_error)?;

        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(cdp_error)?;
        self.page = Some(page);
        Ok(())
    }

    fn page(&self) -> CombineResult<&Page> {
        self.page
            .as_ref()
            .ok_or_else(|| CombineError::Browser("no page open".into()))
    }

    async fn evaluate(&self, script: String) -> CombineResult<serde_json::Value> {
        let page = self.page()?;
        let mut params = EvaluateParams::builder()
            .expression(script)
            .return_by_value(true);
        if let Some(frame) = &self.frame {
            let context = page
                .frame_execution_context(frame.clone())
                .await
                .map_err(cdp_error)?
                .ok_or_else(|| {
                    CombineError::StaleContext("frame has no execution context yet".into())
                })?;
            params = params.context_id(context);
        }
        let params = params.build().map_err(CombineError::Browser)?;

        page.evaluate_expression(params)
            .await
            .map_err(evaluate_error)?
            .into_value()
            .map_err(cdp_error)
    }
}

#[async_trait]
impl BrowserSession for ChromiumSession {
    async fn clear_state(&mut self) -> CombineResult<()> {
        let page = self.page()?;
        page.execute(ClearBrowserCacheParams::default())
            .await
            .map_err(cdp_error)?;
        page.execute(ClearBrowserCookiesParams::default())
            .await
            .map_err(cdp_error)?;
        // Not every Chromium build accepts the wildcard origin
        if let Err(e) = page.execute(ClearDataForOriginParams::new("*", "all")).await {
            debug!("Storage clear skipped: {e}");
        }
        Ok(())
    }

    async fn navigate(&mut self, url: &str) -> CombineResult<()> {
        self.frame = None;
        self.page()?.goto(url).await.map_err(cdp_error)?;
        Ok(())
    }

    async fn enter_frame(&mut self, frame: &Locator) -> CombineResult<bool> {
        let selector = frame.css().ok_or_else(|| {
            CombineError::Browser(format!("frame locator must be CSS or id: {frame}"))
        })?;
        let page = self.page()?;

        let Ok(element) = page.find_element(selector).await else {
            return Ok(false);
        };

        let described = page
            .execute(
                DescribeNodeParams::builder()
                    .backend_node_id(element.backend_node_id)
                    .build(),
            )
            .await
            .map_err(cdp_error)?;
        let Some(frame_id) = described.result.node.frame_id.clone() else {
            return Ok(false);
        };

        let ready = page
            .frame_execution_context(frame_id.clone())
            .await
            .map_err(cdp_error)?
            .is_some();
        if ready {
            self.frame = Some(frame_id);
        }
        Ok(ready)
    }

    async fn click(&mut self, target: &Locator) -> CombineResult<bool> {
        let script = format!(
            "(() => {{ \
                const el = {}; \
                if (!el || el.disabled || el.getClientRects().length === 0) return false; \
                el.click(); \
                return true; \
            }})()",
            target.js_lookup()
        );

        let clicked = self.evaluate(script).await?;
        Ok(clicked.as_bool().unwrap_or(false))
    }

    async fn close(&mut self) -> CombineResult<()> {
        if let Some(page) = self.page.take() {
            let _ = page.close().await;
        }

        if let Err(e) = self.browser.close().await {
            warn!("Browser did not close cleanly, killing it: {e}");
            if let Some(Err(e)) = self.browser.kill().await {
                warn!("Failed to kill browser: {e}");
            }
        }
        let _ = self.browser.wait().await;
        self.handler.abort();
        Ok(())
    }
}
