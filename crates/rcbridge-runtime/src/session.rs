//! [`Session`] – one connected robot, from start-up to disconnect.
//!
//! A session owns the [`StateStore`], the [`ShutdownSignal`], the
//! [`CommandDispatcher`], and the two background tasks (the [`EventPump`]
//! and the [`CameraPoller`]).
//!
//! # Start-up
//!
//! 1. Start draining device events into the store.
//! 2. Enable the device camera (greyscale).  Failure aborts start-up.
//! 3. Raise the head to a fixed fraction of its travel.
//! 4. Wait for the image to settle.
//! 5. Capture one frame and take one still image.  Both are best effort.
//! 6. Start the camera poller.
//!
//! # Shutdown
//!
//! [`Session::stop`] raises the signal, halts every motor, waits briefly for
//! the background tasks, and disconnects the link.

use std::sync::Arc;
use std::time::Duration;

use rcbridge_hal::{FaceRenderer, MotionTranslator, StillCamera};
use rcbridge_kernel::{ShutdownSignal, StateStore};
use rcbridge_middleware::{DeviceLink, EventBus};
use rcbridge_types::{BridgeError, MAX_HEAD_ANGLE_RAD, MIN_HEAD_ANGLE_RAD};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::camera_poller::{CameraPoller, DEFAULT_POLL_INTERVAL, PollerStats};
use crate::dispatcher::{CommandDispatcher, DEFAULT_CAPTURE_TIMEOUT};
use crate::event_pump::EventPump;

/// How long [`Session::stop`] waits for each background task.
const TASK_JOIN_TIMEOUT: Duration = Duration::from_secs(2);

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Timing and start-up settings for a [`Session`].
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub camera_poll_interval: Duration,
    pub capture_timeout: Duration,
    /// Pause between enabling the camera and the first capture.
    pub camera_warmup: Duration,
    /// Start-up head position as a fraction of the head's travel range.
    pub initial_head_fraction: f32,
    pub color_camera: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            camera_poll_interval: DEFAULT_POLL_INTERVAL,
            capture_timeout: DEFAULT_CAPTURE_TIMEOUT,
            camera_warmup: Duration::from_millis(1000),
            initial_head_fraction: 0.1,
            color_camera: false,
        }
    }
}

impl SessionConfig {
    /// Head angle commanded at start-up.
    pub fn initial_head_angle(&self) -> f32 {
        (MAX_HEAD_ANGLE_RAD - MIN_HEAD_ANGLE_RAD) * self.initial_head_fraction
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Session
// ─────────────────────────────────────────────────────────────────────────────

pub struct Session {
    link: Arc<dyn DeviceLink>,
    store: Arc<StateStore>,
    motion: Arc<MotionTranslator>,
    dispatcher: Arc<CommandDispatcher>,
    still: Arc<dyn StillCamera>,
    shutdown: ShutdownSignal,
    config: SessionConfig,
    pump: Option<EventPump>,
    poller_stats: Option<Arc<PollerStats>>,
    tasks: Vec<JoinHandle<()>>,
}

impl Session {
    /// Wire up a session around a connected `link`.  Nothing is sent to the
    /// device until [`start`][Session::start].
    pub fn new(
        link: Arc<dyn DeviceLink>,
        bus: &EventBus,
        still: Arc<dyn StillCamera>,
        faces: Arc<dyn FaceRenderer>,
        config: SessionConfig,
    ) -> Self {
        let store = Arc::new(StateStore::new());
        let shutdown = ShutdownSignal::new();
        let motion = Arc::new(MotionTranslator::new(Arc::clone(&link)));
        let dispatcher = Arc::new(
            CommandDispatcher::new(
                Arc::clone(&motion),
                Arc::clone(&link),
                Arc::clone(&store),
                Arc::clone(&still),
                faces,
                shutdown.clone(),
            )
            .with_capture_timeout(config.capture_timeout),
        );
        let pump = EventPump::new(bus, Arc::clone(&store));

        Self {
            link,
            store,
            motion,
            dispatcher,
            still,
            shutdown,
            config,
            pump: Some(pump),
            poller_stats: None,
            tasks: Vec::new(),
        }
    }

    pub fn store(&self) -> Arc<StateStore> {
        Arc::clone(&self.store)
    }

    pub fn dispatcher(&self) -> Arc<CommandDispatcher> {
        Arc::clone(&self.dispatcher)
    }

    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown.clone()
    }

    /// Camera poller counters, once the poller is running.
    pub fn poller_stats(&self) -> Option<Arc<PollerStats>> {
        self.poller_stats.clone()
    }

    /// Run the start-up sequence and launch the background tasks.
    ///
    /// # Errors
    ///
    /// Returns the device error if the camera cannot be enabled.  The event
    /// pump is already running in that case; call [`stop`][Session::stop].
    pub async fn start(&mut self) -> Result<(), BridgeError> {
        if let Some(pump) = self.pump.take() {
            self.tasks.push(pump.spawn(self.shutdown.clone()));
        }

        self.link.enable_camera(self.config.color_camera).await?;

        let angle = self.config.initial_head_angle();
        if let Err(e) = self.link.set_head_angle(angle).await {
            warn!(angle, error = %e, "failed to set initial head angle");
        }

        tokio::select! {
            _ = tokio::time::sleep(self.config.camera_warmup) => {}
            _ = self.shutdown.wait() => {
                info!("shutdown during camera warm-up");
                return Ok(());
            }
        }

        match tokio::time::timeout(self.config.capture_timeout, self.link.capture_frame()).await {
            Ok(Ok(frame)) => self.store.put_frame(frame),
            Ok(Err(e)) => warn!(error = %e, "initial frame capture failed"),
            Err(_) => warn!("initial frame capture timed out"),
        }
        match self.still.capture_still().await {
            Ok(path) => info!(path = %path.display(), "initial still image captured"),
            Err(e) => warn!(error = %e, "initial still image failed"),
        }

        let poller = CameraPoller::new(Arc::clone(&self.link), Arc::clone(&self.store))
            .with_interval(self.config.camera_poll_interval)
            .with_capture_timeout(self.config.capture_timeout);
        self.poller_stats = Some(poller.stats());
        self.tasks.push(poller.spawn(self.shutdown.clone()));

        info!("session started");
        Ok(())
    }

    /// Stop motors, end the background tasks, and disconnect.
    pub async fn stop(mut self) {
        self.shutdown.trigger("session stop");

        if let Err(e) = self.motion.stop_all_motors().await {
            warn!(error = %e, "failed to stop motors");
        }

        for mut task in self.tasks.drain(..) {
            if tokio::time::timeout(TASK_JOIN_TIMEOUT, &mut task).await.is_err() {
                debug!("background task did not stop in time; aborting");
                task.abort();
            }
        }

        if let Err(e) = self.link.disconnect().await {
            warn!(error = %e, "disconnect failed");
        }
        info!("session stopped");
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
