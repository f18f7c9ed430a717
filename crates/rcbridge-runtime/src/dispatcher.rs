//! [`CommandDispatcher`] – applies decoded [`Command`]s to the robot.
//!
//! | Command | Effect |
//! |---|---|
//! | `stop` | raise the session [`ShutdownSignal`] |
//! | `lift` / `head` | move the joint at +/-0.8 or stop it |
//! | `turn` | left wheel = v/100, right wheel = -v/100 |
//! | `move` | both wheels = v/100 |
//! | `leftw` / `rightw` | one wheel, the other keeps its value |
//! | `motor_stop` | zero the drive state and halt every motor |
//! | `camera` | one on-demand capture into the store, or one still image |
//! | `face` | render, keep even rows, push to the display |
//! | `animation` | play a named animation |
//! | `nop` and unknown names | nothing |
//!
//! Device failures are not request failures: they are logged at `warn` and
//! reported as [`DispatchOutcome::DeviceFailed`], and the HTTP layer still
//! answers 200.

use std::sync::Arc;
use std::time::Duration;

use rcbridge_hal::{FaceRenderer, MotionTranslator, StillCamera};
use rcbridge_kernel::{ShutdownSignal, StateStore};
use rcbridge_middleware::DeviceLink;
use rcbridge_types::BridgeError;
use tracing::{debug, info, instrument, warn};

use crate::command::{CameraSource, Command};

/// Default bound on a single on-demand capture.
pub const DEFAULT_CAPTURE_TIMEOUT: Duration = Duration::from_millis(1000);

/// What happened to a dispatched command.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    /// The command reached the device (or changed session state).
    Applied,
    /// The command was understood but has no effect (`nop`, unknown names,
    /// unknown camera sources).
    Ignored,
    /// The device or an auxiliary tool failed.  Already logged.
    DeviceFailed(BridgeError),
}

/// Routes commands to the motion translator, the device link, the still
/// camera, and the face renderer.
pub struct CommandDispatcher {
    motion: Arc<MotionTranslator>,
    link: Arc<dyn DeviceLink>,
    store: Arc<StateStore>,
    still: Arc<dyn StillCamera>,
    faces: Arc<dyn FaceRenderer>,
    shutdown: ShutdownSignal,
    capture_timeout: Duration,
}

impl CommandDispatcher {
    pub fn new(
        motion: Arc<MotionTranslator>,
        link: Arc<dyn DeviceLink>,
        store: Arc<StateStore>,
        still: Arc<dyn StillCamera>,
        faces: Arc<dyn FaceRenderer>,
        shutdown: ShutdownSignal,
    ) -> Self {
        Self {
            motion,
            link,
            store,
            still,
            faces,
            shutdown,
            capture_timeout: DEFAULT_CAPTURE_TIMEOUT,
        }
    }

    /// Override the on-demand capture timeout.
    pub fn with_capture_timeout(mut self, timeout: Duration) -> Self {
        self.capture_timeout = timeout;
        self
    }

    pub fn store(&self) -> &Arc<StateStore> {
        &self.store
    }

    /// Apply one command.  Never fails: device errors become
    /// [`DispatchOutcome::DeviceFailed`].
    #[instrument(skip(self, command), fields(command = command.name()))]
    pub async fn dispatch(&self, command: Command) -> DispatchOutcome {
        let result = match &command {
            Command::Stop => {
                self.shutdown.trigger("stop command");
                Ok(true)
            }
            Command::Lift(speed) => self.motion.drive_lift(*speed).await.map(|_| true),
            Command::Head(speed) => self.motion.drive_head(*speed).await.map(|_| true),
            Command::Turn { left } => self.motion.drive_wheels(*left, -*left).await.map(|_| true),
            Command::Move { fraction } => self
                .motion
                .drive_wheels(*fraction, *fraction)
                .await
                .map(|_| true),
            Command::LeftWheel { fraction } => self.motion.drive_left(*fraction).await.map(|_| true),
            Command::RightWheel { fraction } => {
                self.motion.drive_right(*fraction).await.map(|_| true)
            }
            Command::MotorStop => self.motion.stop_all_motors().await.map(|_| true),
            Command::Camera(Some(CameraSource::Device)) => self.capture_now().await.map(|_| true),
            Command::Camera(Some(CameraSource::Still)) => self
                .still
                .capture_still()
                .await
                .map(|path| {
                    info!(path = %path.display(), "still image captured");
                    true
                }),
            Command::Camera(None) => Ok(false),
            Command::Face(expression) => self.show_face(*expression).await.map(|_| true),
            Command::Animation(name) => self.link.play_animation(name).await.map(|_| true),
            Command::Nop => Ok(false),
            Command::Unrecognized(name) => {
                debug!(name = %name, "ignoring unrecognized command");
                Ok(false)
            }
        };

        match result {
            Ok(true) => DispatchOutcome::Applied,
            Ok(false) => DispatchOutcome::Ignored,
            Err(e) => {
                warn!(command = command.name(), error = %e, "command failed on device");
                DispatchOutcome::DeviceFailed(e)
            }
        }
    }

    /// One capture, bounded by the capture timeout, installed in the store.
    async fn capture_now(&self) -> Result<(), BridgeError> {
        let frame = tokio::time::timeout(self.capture_timeout, self.link.capture_frame())
            .await
            .map_err(|_| BridgeError::CaptureTimeout(self.capture_timeout.as_millis() as u64))??;
        self.store.put_frame(frame);
        Ok(())
    }

    async fn show_face(&self, expression: rcbridge_hal::FaceExpression) -> Result<(), BridgeError> {
        let face = self.faces.render(expression)?;
        self.link.display_image(&face.even_rows()).await
    }
}
