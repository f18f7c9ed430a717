//! [`CameraPoller`] – keeps the state store's frame fresh.
//!
//! Every interval the poller fires one capture request and moves on; it does
//! not wait for the previous capture to finish.  Each request runs in its own
//! task, bounded by the capture timeout, and installs its frame with a single
//! store write when it completes.  Failed or late captures are dropped and the
//! previous frame stays in place.
//!
//! The loop checks the [`ShutdownSignal`] before every request and sleeps in a
//! `select!` against it, so it exits within one interval of shutdown.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use rcbridge_kernel::{ShutdownSignal, StateStore};
use rcbridge_middleware::DeviceLink;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Default time between capture requests.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(30);

/// Counters shared between the poller and its capture tasks.
#[derive(Debug, Default)]
pub struct PollerStats {
    requested: AtomicU64,
    installed: AtomicU64,
    failed: AtomicU64,
    timed_out: AtomicU64,
}

impl PollerStats {
    pub fn requested(&self) -> u64 {
        self.requested.load(Ordering::Relaxed)
    }

    pub fn installed(&self) -> u64 {
        self.installed.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    pub fn timed_out(&self) -> u64 {
        self.timed_out.load(Ordering::Relaxed)
    }
}

/// Periodic fire-and-forget camera capture.
pub struct CameraPoller {
    link: Arc<dyn DeviceLink>,
    store: Arc<StateStore>,
    interval: Duration,
    capture_timeout: Duration,
    stats: Arc<PollerStats>,
}

impl CameraPoller {
    pub fn new(link: Arc<dyn DeviceLink>, store: Arc<StateStore>) -> Self {
        Self {
            link,
            store,
            interval: DEFAULT_POLL_INTERVAL,
            capture_timeout: crate::dispatcher::DEFAULT_CAPTURE_TIMEOUT,
            stats: Arc::new(PollerStats::default()),
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_capture_timeout(mut self, timeout: Duration) -> Self {
        self.capture_timeout = timeout;
        self
    }

    /// Handle to the poller's counters.  Valid after the poller is spawned.
    pub fn stats(&self) -> Arc<PollerStats> {
        Arc::clone(&self.stats)
    }

    /// Run the loop on a new task.
    pub fn spawn(self, shutdown: ShutdownSignal) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }

    /// Poll until `shutdown` is raised.
    pub async fn run(self, shutdown: ShutdownSignal) {
        info!(interval_ms = self.interval.as_millis() as u64, "camera poller started");
        while !shutdown.is_triggered() {
            self.request_capture();
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = shutdown.wait() => break,
            }
        }
        info!(requested = self.stats.requested(), "camera poller stopped");
    }

    fn request_capture(&self) {
        self.stats.requested.fetch_add(1, Ordering::Relaxed);
        let link = Arc::clone(&self.link);
        let store = Arc::clone(&self.store);
        let stats = Arc::clone(&self.stats);
        let timeout = self.capture_timeout;

        tokio::spawn(async move {
            match tokio::time::timeout(timeout, link.capture_frame()).await {
                Ok(Ok(frame)) => {
                    store.put_frame(frame);
                    stats.installed.fetch_add(1, Ordering::Relaxed);
                }
                Ok(Err(e)) => {
                    stats.failed.fetch_add(1, Ordering::Relaxed);
                    debug!(error = %e, "camera capture failed");
                }
                Err(_) => {
                    stats.timed_out.fetch_add(1, Ordering::Relaxed);
                    debug!(timeout_ms = timeout.as_millis() as u64, "camera capture timed out");
                }
            }
        });
    }
}
