//! User interruption (Ctrl+C) during acquisition.
//!
//! An interruption abandons only the acquisition that is running when it
//! arrives; the batch moves on to the next source.

use std::sync::Arc;

use tokio::sync::watch;

/// Cloneable trigger shared between the Ctrl+C listener and the acquirer.
#[derive(Clone, Debug)]
pub struct InterruptSignal {
    tx: Arc<watch::Sender<u64>>,
}

/// Observes interruptions raised after it was created.
#[derive(Debug)]
pub struct InterruptListener {
    rx: watch::Receiver<u64>,
}

impl InterruptSignal {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(0);
        InterruptSignal { tx: Arc::new(tx) }
    }

    pub fn trigger(&self) {
        self.tx.send_modify(|count| *count += 1);
    }

    pub fn subscribe(&self) -> InterruptListener {
        InterruptListener {
            rx: self.tx.subscribe(),
        }
    }

    /// Trigger on every Ctrl+C until the returned task is aborted.
    pub fn listen_for_ctrl_c(&self) -> tokio::task::JoinHandle<()> {
        let signal = self.clone();
        tokio::spawn(async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                signal.trigger();
            }
        })
    }
}

impl Default for InterruptSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl InterruptListener {
    /// Resolves once an interruption arrives. Never resolves if the signal
    /// has been dropped.
    pub async fn requested(&mut self) {
        if self.rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_listener_ignores_earlier_interrupts() {
        let signal = InterruptSignal::new();
        signal.trigger();

        let mut listener = signal.subscribe();
        let waited =
            tokio::time::timeout(Duration::from_millis(50), listener.requested()).await;
        assert!(waited.is_err(), "press before subscribing must not count");

        signal.trigger();
        tokio::time::timeout(Duration::from_millis(50), listener.requested())
            .await
            .expect("press after subscribing is observed");
    }
}
