//! Browser abstraction used by the Source Acquirer.
//!
//! Defines the `BrowserLauncher` and `BrowserSession` traits that abstract
//! over the browser engine (currently Chromium via chromiumoxide), so the
//! export sequence can be driven against a fake session in tests.

pub mod chromium;

use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::CombineResult;

/// Structural locator for an element, independent of visible text.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase", tag = "by", content = "value")]
pub enum Locator {
    Id(String),
    Css(String),
    XPath(String),
}

impl Locator {
    /// CSS selector equivalent, when one exists.
    pub fn css(&self) -> Option<String> {
        match self {
            Locator::Id(id) => Some(format!("#{id}")),
            Locator::Css(selector) => Some(selector.clone()),
            Locator::XPath(_) => None,
        }
    }

    /// JavaScript expression evaluating to the element or `null`.
    pub fn js_lookup(&self) -> String {
        // serde_json gives us a correctly escaped JS string literal
        let quoted = |s: &str| serde_json::Value::from(s).to_string();
        const FIRST_NODE: &str = "XPathResult.FIRST_ORDERED_NODE_TYPE";
        match self {
            Locator::Id(id) => format!("document.getElementById({})", quoted(id)),
            Locator::Css(selector) => format!("document.querySelector({})", quoted(selector)),
            Locator::XPath(xpath) => format!(
                "document.evaluate({}, document, null, {FIRST_NODE}, null).singleNodeValue",
                quoted(xpath)
            ),
        }
    }
}

impl std::fmt::Display for Locator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Locator::Id(id) => write!(f, "id={id}"),
            Locator::Css(selector) => write!(f, "css={selector}"),
            Locator::XPath(xpath) => write!(f, "xpath={xpath}"),
        }
    }
}

/// Starts isolated browser sessions.
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    type Session: BrowserSession;

    /// Launch a fresh session that saves downloads into `download_dir`
    /// without prompting.
    async fn launch(&self, download_dir: &Path) -> CombineResult<Self::Session>;
}

/// One running browser with a single page.
///
/// Lookups return `Ok(false)` while their target is not ready, so callers
/// can poll them.
#[async_trait]
pub trait BrowserSession: Send {
    /// Clear cache, storage and cookies.
    async fn clear_state(&mut self) -> CombineResult<()>;

    async fn navigate(&mut self, url: &str) -> CombineResult<()>;

    /// Switch the interaction context into the frame owned by `frame`.
    async fn enter_frame(&mut self, frame: &Locator) -> CombineResult<bool>;

    /// Click `target` in the current context once it is visible and enabled.
    async fn click(&mut self, target: &Locator) -> CombineResult<bool>;

    /// Terminate the browser process.
    async fn close(&mut self) -> CombineResult<()>;
}
