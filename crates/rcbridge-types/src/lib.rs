//! `rcbridge-types` – Shared value types
//!
//! Plain data passed between the bridge's crates: the telemetry snapshot, the
//! camera frame, face bitmaps, bus events, and [`BridgeError`].  Nothing here
//! does I/O.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Maximum wheel speed the device accepts, in millimetres per second.
pub const MAX_WHEEL_SPEED_MMPS: f32 = 200.0;

/// Lowest reachable head angle (-25°).
pub const MIN_HEAD_ANGLE_RAD: f32 = -0.436_332_3;

/// Highest reachable head angle (44.5°).
pub const MAX_HEAD_ANGLE_RAD: f32 = 0.776_671_5;

/// One robot-state update as delivered by the device link.
///
/// Field names match the telemetry JSON served to polling clients, so the
/// struct serialises directly into the response body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    pub timestamp: u32,
    pub pose_frame_id: u32,
    pub pose_origin_id: u32,
    pub pose_x: f32,
    pub pose_y: f32,
    pub pose_z: f32,
    pub pose_angle_rad: f32,
    pub pose_pitch_rad: f32,
    pub lwheel_speed_mmps: f32,
    pub rwheel_speed_mmps: f32,
    pub head_angle_rad: f32,
    pub lift_height_mm: f32,
    pub accel_x: f32,
    pub accel_y: f32,
    pub accel_z: f32,
    pub gyro_x: f32,
    pub gyro_y: f32,
    pub gyro_z: f32,
    pub battery_voltage: f32,
    pub status: u32,
    pub cliff_data_raw: u16,
    pub backpack_touch_sensor_raw: u16,
    pub curr_path_segment: i8,
}

/// An encoded (JPEG) camera image together with its capture time.
#[derive(Debug, Clone, PartialEq)]
pub struct CameraFrame {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Encoded image bytes, served verbatim.
    pub data: Vec<u8>,
    pub captured_at: DateTime<Utc>,
}

impl CameraFrame {
    /// Wrap freshly captured bytes, stamping them with the current time.
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            data,
            captured_at: Utc::now(),
        }
    }
}

/// An 8-bit greyscale bitmap destined for the robot's face display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaceImage {
    pub width: u32,
    pub height: u32,
    /// Row-major pixels, one byte each.
    pub pixels: Vec<u8>,
}

impl FaceImage {
    /// Keep only the even rows, halving the vertical resolution.
    ///
    /// The display is 128x32 while faces are rendered at 128x64.
    pub fn even_rows(&self) -> FaceImage {
        let width = self.width as usize;
        let mut pixels = Vec::with_capacity(self.pixels.len() / 2);
        for row in self.pixels.chunks(width.max(1)).step_by(2) {
            pixels.extend_from_slice(row);
        }
        FaceImage {
            width: self.width,
            height: self.height.div_ceil(2),
            pixels,
        }
    }
}

/// Event wrapper for traffic flowing from the device link to the core.
#[derive(Debug, Clone)]
pub struct Event {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// e.g., "rcbridge-hal::sim"
    pub source: String,
    pub payload: EventPayload,
}

impl Event {
    /// Stamp `payload` with a fresh id and the current time.
    pub fn new(source: impl Into<String>, payload: EventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            source: source.into(),
            payload,
        }
    }
}

/// Variants of data that the device link pushes asynchronously.
///
/// Snapshots and frames are reference counted so that every bus subscriber
/// shares one allocation.
#[derive(Debug, Clone)]
pub enum EventPayload {
    Telemetry(Arc<TelemetrySnapshot>),
    CameraFrame(Arc<CameraFrame>),
    /// Someone touched or bumped the robot.
    RobotPoked,
    LinkFault { component: String, message: String },
}

/// Error type spanning request decoding, device link failures and setup.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BridgeError {
    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    #[error("Invalid value {value:?} for command '{command}'")]
    UnknownValue { command: String, value: String },

    #[error("Device link error during {operation}: {details}")]
    DeviceLink { operation: String, details: String },

    #[error("Camera capture timed out after {0} ms")]
    CaptureTimeout(u64),

    #[error("Still camera error: {0}")]
    StillCamera(String),

    #[error("Channel error: {0}")]
    Channel(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl BridgeError {
    /// Shorthand for a [`BridgeError::DeviceLink`] failure.
    pub fn device(operation: &str, details: impl Into<String>) -> Self {
        BridgeError::DeviceLink {
            operation: operation.to_string(),
            details: details.into(),
        }
    }

    /// `true` for errors caused by the caller's request rather than by the
    /// robot. These are reported as `400 Bad Request`.
    pub fn is_request_error(&self) -> bool {
        matches!(
            self,
            BridgeError::MalformedRequest(_) | BridgeError::UnknownValue { .. }
        )
    }
}

impl From<std::io::Error> for BridgeError {
    fn from(e: std::io::Error) -> Self {
        BridgeError::Io(e.to_string())
    }
}
