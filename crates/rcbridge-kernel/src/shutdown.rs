//! [`ShutdownSignal`] – session-wide stop flag.
//!
//! Set by the `stop` command, by Ctrl-C, or by the session itself.  Background
//! loops poll [`is_triggered`][ShutdownSignal::is_triggered] or `select!` on
//! [`wait`][ShutdownSignal::wait] so they exit within one iteration.
//! Triggering is idempotent and cannot be undone.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::info;

/// Cloneable handle to one stop flag.
#[derive(Clone, Debug)]
pub struct ShutdownSignal {
    tx: Arc<watch::Sender<bool>>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Raise the flag.  Returns `true` if this call raised it.
    pub fn trigger(&self, reason: &str) -> bool {
        let already = self.tx.send_replace(true);
        if !already {
            info!(reason, "shutdown requested");
        }
        !already
    }

    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolve once the flag is raised.  Returns immediately if it already is.
    pub async fn wait(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in `self`, so the channel cannot close here.
        let _ = rx.wait_for(|stopped| *stopped).await;
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn starts_untriggered() {
        let signal = ShutdownSignal::new();
        assert!(!signal.is_triggered());
    }

    #[test]
    fn trigger_is_idempotent() {
        let signal = ShutdownSignal::new();
        assert!(signal.trigger("test"));
        assert!(!signal.trigger("again"));
        assert!(signal.is_triggered());
    }

    #[test]
    fn clones_share_the_flag() {
        let signal = ShutdownSignal::new();
        let other = signal.clone();
        other.trigger("clone");
        assert!(signal.is_triggered());
    }

    #[tokio::test]
    async fn wait_returns_immediately_when_triggered() {
        let signal = ShutdownSignal::new();
        signal.trigger("early");
        tokio::time::timeout(Duration::from_millis(50), signal.wait())
            .await
            .expect("wait must not block once triggered");
    }

    #[tokio::test]
    async fn wait_wakes_on_trigger() {
        let signal = ShutdownSignal::new();
        let waiter = {
            let signal = signal.clone();
            tokio::spawn(async move { signal.wait().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!waiter.is_finished());

        signal.trigger("test");
        tokio::time::timeout(Duration::from_millis(200), waiter)
            .await
            .expect("waiter must wake")
            .unwrap();
    }
}
