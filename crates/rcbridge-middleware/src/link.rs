//! The device link seam.
//!
//! The core never speaks the robot's wire protocol.  It issues commands
//! through a [`DeviceLink`] and receives asynchronous state through the
//! [`EventBus`][crate::bus::EventBus] that the link publishes into.
//!
//! `rcbridge-hal` provides `SimDeviceLink`, an in-process simulated robot
//! used for headless runs and tests.

use async_trait::async_trait;
use rcbridge_types::{BridgeError, CameraFrame, FaceImage};

/// Every robot connection must implement this trait.
///
/// # Contract
///
/// * Command methods send one encoded instruction and return once the link
///   has accepted it.  They must not wait for the robot to finish moving.
/// * [`capture_frame`][DeviceLink::capture_frame] requests exactly one fresh
///   frame and resolves when it arrives.  Callers bound it with their own
///   timeout.
/// * Telemetry and interaction events are published on the event bus the
///   link was constructed with; they are not returned from any method here.
#[async_trait]
pub trait DeviceLink: Send + Sync {
    /// Set both wheel speeds, in device units (mm/s).
    async fn drive_wheels(&self, lwheel_mmps: i32, rwheel_mmps: i32) -> Result<(), BridgeError>;

    /// Move the head at a normalised speed in `[-1.0, 1.0]`.
    async fn move_head(&self, speed: f32) -> Result<(), BridgeError>;

    /// Move the lift at a normalised speed in `[-1.0, 1.0]`.
    async fn move_lift(&self, speed: f32) -> Result<(), BridgeError>;

    /// Halt wheels, head and lift.
    async fn stop_all_motors(&self) -> Result<(), BridgeError>;

    /// Drive the head to an absolute angle.
    async fn set_head_angle(&self, angle_rad: f32) -> Result<(), BridgeError>;

    /// Turn on image streaming from the on-board camera.
    async fn enable_camera(&self, color: bool) -> Result<(), BridgeError>;

    /// Request one fresh camera frame.
    async fn capture_frame(&self) -> Result<CameraFrame, BridgeError>;

    /// Start playback of a named animation stored on the robot.
    async fn play_animation(&self, name: &str) -> Result<(), BridgeError>;

    /// Show an image on the face display.
    async fn display_image(&self, image: &FaceImage) -> Result<(), BridgeError>;

    /// Close the connection.  Further commands may fail.
    async fn disconnect(&self) -> Result<(), BridgeError>;
}
