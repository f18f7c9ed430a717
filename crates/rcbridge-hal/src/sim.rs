//! In-process simulated robot for headless runs and CI without hardware.
//!
//! [`SimDeviceLink`] implements [`DeviceLink`] by recording the commands it
//! receives (the newest [`COMMAND_LOG_CAPACITY`]) and mirroring the commanded wheel, head and lift motion into the
//! telemetry it publishes on the [`EventBus`].  Camera captures return a
//! small synthetic JPEG.
//!
//! Failure injection ([`set_commands_fail`][SimDeviceLink::set_commands_fail],
//! [`set_capture_fail`][SimDeviceLink::set_capture_fail],
//! [`set_capture_delay`][SimDeviceLink::set_capture_delay]) lets tests drive
//! the best-effort paths of the core.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use rcbridge_hal::sim::{DeviceCommand, SimDeviceLink};
//! use rcbridge_middleware::{DeviceLink, EventBus};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let link = SimDeviceLink::new(Arc::new(EventBus::default()));
//! link.drive_wheels(100, -100).await.expect("sim drive must succeed");
//! assert_eq!(
//!     link.commands(),
//!     vec![DeviceCommand::DriveWheels { lwheel_mmps: 100, rwheel_mmps: -100 }]
//! );
//! # }
//! ```

use std::collections::VecDeque;
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use image::ExtendedColorType;
use image::codecs::jpeg::JpegEncoder;
use rcbridge_middleware::{DeviceLink, EventBus};
use rcbridge_types::{
    BridgeError, CameraFrame, Event, EventPayload, FaceImage, MAX_HEAD_ANGLE_RAD,
    MIN_HEAD_ANGLE_RAD, TelemetrySnapshot,
};
use tokio::task::JoinHandle;
use tracing::{debug, trace};

/// Simulated camera width (QVGA).
pub const SIM_FRAME_WIDTH: u32 = 320;
/// Simulated camera height: half of QVGA's 240 rows.
pub const SIM_FRAME_HEIGHT: u32 = 120;

/// Recorded commands kept by the simulator; older entries are dropped.
pub const COMMAND_LOG_CAPACITY: usize = 1024;

const SOURCE: &str = "rcbridge-hal::sim";

/// A command as received by the simulated robot.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceCommand {
    DriveWheels { lwheel_mmps: i32, rwheel_mmps: i32 },
    MoveHead(f32),
    MoveLift(f32),
    StopAllMotors,
    SetHeadAngle(f32),
    EnableCamera { color: bool },
    PlayAnimation(String),
    DisplayImage { width: u32, height: u32 },
    Disconnect,
}

#[derive(Debug, Default)]
struct SimState {
    commands: VecDeque<DeviceCommand>,
    lwheel_mmps: i32,
    rwheel_mmps: i32,
    head_angle_rad: f32,
    head_speed: f32,
    lift_height_mm: f32,
    lift_speed: f32,
}

impl SimState {
    fn log(&mut self, command: DeviceCommand) {
        if self.commands.len() == COMMAND_LOG_CAPACITY {
            self.commands.pop_front();
        }
        self.commands.push_back(command);
    }
}

/// A simulated robot connection.  Always succeeds unless told otherwise.
pub struct SimDeviceLink {
    bus: Arc<EventBus>,
    state: Mutex<SimState>,
    frames_captured: AtomicU32,
    ticks: AtomicU32,
    connected: AtomicBool,
    commands_fail: AtomicBool,
    capture_fail: AtomicBool,
    capture_delay: Mutex<Option<Duration>>,
}

impl SimDeviceLink {
    /// Create a connected simulated robot publishing into `bus`.
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self {
            bus,
            state: Mutex::new(SimState::default()),
            frames_captured: AtomicU32::new(0),
            ticks: AtomicU32::new(0),
            connected: AtomicBool::new(true),
            commands_fail: AtomicBool::new(false),
            capture_fail: AtomicBool::new(false),
            capture_delay: Mutex::new(None),
        }
    }

    /// Recorded commands, oldest first.
    pub fn commands(&self) -> Vec<DeviceCommand> {
        self.lock_state().commands.iter().cloned().collect()
    }

    /// Forget recorded commands.
    pub fn clear_commands(&self) {
        self.lock_state().commands.clear();
    }

    /// Number of frames returned by [`capture_frame`][DeviceLink::capture_frame].
    pub fn frames_captured(&self) -> u32 {
        self.frames_captured.load(Ordering::SeqCst)
    }

    /// Make every motion command fail with [`BridgeError::DeviceLink`].
    pub fn set_commands_fail(&self, fail: bool) {
        self.commands_fail.store(fail, Ordering::SeqCst);
    }

    /// Make every capture fail with [`BridgeError::DeviceLink`].
    pub fn set_capture_fail(&self, fail: bool) {
        self.capture_fail.store(fail, Ordering::SeqCst);
    }

    /// Delay every capture by `delay` before answering.
    pub fn set_capture_delay(&self, delay: Option<Duration>) {
        *self
            .capture_delay
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = delay;
    }

    /// `false` once [`disconnect`][DeviceLink::disconnect] has been called.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Advance the simulation by `dt` and publish the resulting telemetry.
    ///
    /// Publishing with no subscriber is not an error for the simulator.
    pub fn tick(&self, dt: Duration) -> Arc<TelemetrySnapshot> {
        let snapshot = Arc::new(self.step(dt));
        if self
            .bus
            .publish(Event::new(SOURCE, EventPayload::Telemetry(Arc::clone(&snapshot))))
            .is_err()
        {
            trace!("no telemetry subscribers");
        }
        snapshot
    }

    /// Publish a poke interaction event.
    pub fn poke(&self) {
        let _ = self.bus.publish(Event::new(SOURCE, EventPayload::RobotPoked));
    }

    /// Spawn a task publishing telemetry every `period` until disconnected.
    pub fn spawn_state_feed(self: Arc<Self>, period: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            while self.is_connected() {
                interval.tick().await;
                self.tick(period);
            }
            debug!("sim state feed stopped");
        })
    }

    fn step(&self, dt: Duration) -> TelemetrySnapshot {
        let tick = self.ticks.fetch_add(1, Ordering::SeqCst) + 1;
        let secs = dt.as_secs_f32();
        let mut state = self.lock_state();

        state.head_angle_rad = (state.head_angle_rad + state.head_speed * secs)
            .clamp(MIN_HEAD_ANGLE_RAD, MAX_HEAD_ANGLE_RAD);
        // Lift travel is 32 mm to 92 mm; speed 1.0 sweeps it in one second.
        state.lift_height_mm = (state.lift_height_mm + state.lift_speed * 60.0 * secs).clamp(32.0, 92.0);

        TelemetrySnapshot {
            timestamp: tick.wrapping_mul(dt.as_millis() as u32),
            pose_frame_id: 1,
            pose_origin_id: 1,
            lwheel_speed_mmps: state.lwheel_mmps as f32,
            rwheel_speed_mmps: state.rwheel_mmps as f32,
            head_angle_rad: state.head_angle_rad,
            lift_height_mm: state.lift_height_mm,
            accel_z: 9.81,
            battery_voltage: 4.1,
            ..Default::default()
        }
    }

    fn record(&self, command: DeviceCommand) -> Result<MutexGuard<'_, SimState>, BridgeError> {
        if !self.is_connected() {
            return Err(BridgeError::device(command_name(&command), "not connected"));
        }
        let fail = self.commands_fail.load(Ordering::SeqCst);
        let mut state = self.lock_state();
        state.log(command.clone());
        if fail {
            return Err(BridgeError::device(command_name(&command), "injected failure"));
        }
        Ok(state)
    }

    fn lock_state(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn command_name(command: &DeviceCommand) -> &'static str {
    match command {
        DeviceCommand::DriveWheels { .. } => "drive_wheels",
        DeviceCommand::MoveHead(_) => "move_head",
        DeviceCommand::MoveLift(_) => "move_lift",
        DeviceCommand::StopAllMotors => "stop_all_motors",
        DeviceCommand::SetHeadAngle(_) => "set_head_angle",
        DeviceCommand::EnableCamera { .. } => "enable_camera",
        DeviceCommand::PlayAnimation(_) => "play_animation",
        DeviceCommand::DisplayImage { .. } => "display_image",
        DeviceCommand::Disconnect => "disconnect",
    }
}

/// Encode a moving greyscale gradient as JPEG.
fn synthetic_jpeg(seq: u32) -> Result<Vec<u8>, BridgeError> {
    let (w, h) = (SIM_FRAME_WIDTH, SIM_FRAME_HEIGHT);
    let pixels: Vec<u8> = (0..h)
        .flat_map(|y| (0..w).map(move |x| ((x + y + seq * 4) % 256) as u8))
        .collect();

    let mut buf = Cursor::new(Vec::new());
    JpegEncoder::new_with_quality(&mut buf, 75)
        .encode(&pixels, w, h, ExtendedColorType::L8)
        .map_err(|e| BridgeError::device("capture_frame", format!("jpeg encode: {e}")))?;
    Ok(buf.into_inner())
}

#[async_trait]
impl DeviceLink for SimDeviceLink {
    async fn drive_wheels(&self, lwheel_mmps: i32, rwheel_mmps: i32) -> Result<(), BridgeError> {
        let mut state = self.record(DeviceCommand::DriveWheels {
            lwheel_mmps,
            rwheel_mmps,
        })?;
        state.lwheel_mmps = lwheel_mmps;
        state.rwheel_mmps = rwheel_mmps;
        Ok(())
    }

    async fn move_head(&self, speed: f32) -> Result<(), BridgeError> {
        self.record(DeviceCommand::MoveHead(speed))?.head_speed = speed;
        Ok(())
    }

    async fn move_lift(&self, speed: f32) -> Result<(), BridgeError> {
        self.record(DeviceCommand::MoveLift(speed))?.lift_speed = speed;
        Ok(())
    }

    async fn stop_all_motors(&self) -> Result<(), BridgeError> {
        let mut state = self.record(DeviceCommand::StopAllMotors)?;
        state.lwheel_mmps = 0;
        state.rwheel_mmps = 0;
        state.head_speed = 0.0;
        state.lift_speed = 0.0;
        Ok(())
    }

    async fn set_head_angle(&self, angle_rad: f32) -> Result<(), BridgeError> {
        self.record(DeviceCommand::SetHeadAngle(angle_rad))?.head_angle_rad =
            angle_rad.clamp(MIN_HEAD_ANGLE_RAD, MAX_HEAD_ANGLE_RAD);
        Ok(())
    }

    async fn enable_camera(&self, color: bool) -> Result<(), BridgeError> {
        drop(self.record(DeviceCommand::EnableCamera { color })?);
        Ok(())
    }

    async fn capture_frame(&self) -> Result<CameraFrame, BridgeError> {
        if !self.is_connected() {
            return Err(BridgeError::device("capture_frame", "not connected"));
        }
        let delay = *self.capture_delay.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.capture_fail.load(Ordering::SeqCst) {
            return Err(BridgeError::device("capture_frame", "injected failure"));
        }
        let seq = self.frames_captured.fetch_add(1, Ordering::SeqCst);
        let data = synthetic_jpeg(seq)?;
        Ok(CameraFrame::new(SIM_FRAME_WIDTH, SIM_FRAME_HEIGHT, data))
    }

    async fn play_animation(&self, name: &str) -> Result<(), BridgeError> {
        drop(self.record(DeviceCommand::PlayAnimation(name.to_string()))?);
        Ok(())
    }

    async fn display_image(&self, image: &FaceImage) -> Result<(), BridgeError> {
        drop(self.record(DeviceCommand::DisplayImage {
            width: image.width,
            height: image.height,
        })?);
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), BridgeError> {
        self.lock_state().log(DeviceCommand::Disconnect);
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }
}
