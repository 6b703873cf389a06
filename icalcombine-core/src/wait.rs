//! Condition-based waits with an explicit timeout.

use std::future::Future;
use std::time::Duration;

use tokio::time::{sleep, timeout};

use crate::error::{CombineError, CombineResult};

/// Polls a probe until it yields a value or the timeout elapses.
#[derive(Debug, Clone, Copy)]
pub struct Wait {
    timeout: Duration,
    interval: Duration,
}

impl Wait {
    pub fn new(timeout: Duration, interval: Duration) -> Self {
        Wait { timeout, interval }
    }

    /// Run `probe` until it returns `Ok(Some(_))`.
    ///
    /// `Ok(None)` means "not ready yet". An `Err` from the probe ends the
    /// wait immediately. `what` names the condition in the timeout error.
    pub async fn until<T, F, Fut>(&self, what: &str, mut probe: F) -> CombineResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = CombineResult<Option<T>>>,
    {
        self.within(what, async {
            loop {
                if let Some(value) = probe().await? {
                    return Ok(value);
                }
                self.pause().await;
            }
        })
        .await
    }

    /// Bound a hand-written polling loop by this wait's timeout.
    ///
    /// Loops that need `&mut` access between polls use this together with
    /// [`Wait::pause`] instead of [`Wait::until`].
    pub async fn within<T, Fut>(&self, what: &str, poll: Fut) -> CombineResult<T>
    where
        Fut: Future<Output = CombineResult<T>>,
    {
        timeout(self.timeout, poll)
            .await
            .map_err(|_| CombineError::Timeout {
                what: what.to_string(),
                secs: self.timeout.as_secs(),
            })?
    }

    /// Sleep for one polling interval.
    pub async fn pause(&self) {
        sleep(self.interval).await;
    }
}
