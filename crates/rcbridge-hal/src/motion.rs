//! [`MotionTranslator`] – continuous actuator values from symbolic commands.
//!
//! The translator owns the session's [`DriveState`]: independent left/right
//! wheel fractions in `[-1.0, 1.0]`.  Every wheel update is applied under one
//! async mutex that is held until the device has accepted the resulting
//! `drive_wheels` command, so two concurrent requests can never interleave a
//! left update from one with a right update from the other.
//!
//! # Differential-drive mapping
//!
//! A fraction is clamped to `[-1.0, 1.0]`, multiplied by
//! [`MAX_WHEEL_SPEED_MMPS`] and truncated toward zero.

use std::sync::Arc;

use rcbridge_middleware::DeviceLink;
use rcbridge_types::{BridgeError, MAX_WHEEL_SPEED_MMPS};
use tokio::sync::Mutex;
use tracing::{debug, instrument};

/// Normalised speed used for a head or lift "raise"/"lower" request.
pub const JOINT_SPEED: f32 = 0.8;

/// The three supported head/lift speed levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JointSpeed {
    Raise,
    Lower,
    Stop,
}

impl JointSpeed {
    /// Map a request keyword: `"up"` raises, `"down"` lowers, anything else
    /// stops.
    pub fn from_keyword(keyword: Option<&str>) -> Self {
        match keyword {
            Some("up") => JointSpeed::Raise,
            Some("down") => JointSpeed::Lower,
            _ => JointSpeed::Stop,
        }
    }

    /// Normalised speed sent to the device.
    pub fn speed(self) -> f32 {
        match self {
            JointSpeed::Raise => JOINT_SPEED,
            JointSpeed::Lower => -JOINT_SPEED,
            JointSpeed::Stop => 0.0,
        }
    }
}

/// Left/right wheel speed fractions, each within `[-1.0, 1.0]`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DriveState {
    pub left: f32,
    pub right: f32,
}

impl DriveState {
    /// Device wheel speeds (mm/s) for this state.
    pub fn to_device_units(self) -> (i32, i32) {
        (wheel_units(self.left), wheel_units(self.right))
    }
}

/// Clamp `fraction` into `[-1.0, 1.0]`.  NaN collapses to `0.0`.
pub fn clamp_fraction(fraction: f32) -> f32 {
    if fraction.is_nan() {
        0.0
    } else {
        fraction.clamp(-1.0, 1.0)
    }
}

/// Convert a wheel fraction to device units, truncating toward zero.
pub fn wheel_units(fraction: f32) -> i32 {
    (clamp_fraction(fraction) * MAX_WHEEL_SPEED_MMPS) as i32
}

/// Translates drive requests into device commands.
pub struct MotionTranslator {
    link: Arc<dyn DeviceLink>,
    drive: Mutex<DriveState>,
}

impl MotionTranslator {
    /// Create a translator with a zeroed [`DriveState`].
    pub fn new(link: Arc<dyn DeviceLink>) -> Self {
        Self {
            link,
            drive: Mutex::new(DriveState::default()),
        }
    }

    /// Move the lift at one of the three fixed speeds.
    pub async fn drive_lift(&self, speed: JointSpeed) -> Result<(), BridgeError> {
        debug!(?speed, "drive lift");
        self.link.move_lift(speed.speed()).await
    }

    /// Move the head at one of the three fixed speeds.
    pub async fn drive_head(&self, speed: JointSpeed) -> Result<(), BridgeError> {
        debug!(?speed, "drive head");
        self.link.move_head(speed.speed()).await
    }

    /// Set both wheel fractions and issue the drive command.
    pub async fn drive_wheels(&self, left: f32, right: f32) -> Result<DriveState, BridgeError> {
        self.update_wheels(|state| {
            state.left = left;
            state.right = right;
        })
        .await
    }

    /// Set the left wheel fraction, keeping the right one.
    pub async fn drive_left(&self, left: f32) -> Result<DriveState, BridgeError> {
        self.update_wheels(|state| state.left = left).await
    }

    /// Set the right wheel fraction, keeping the left one.
    pub async fn drive_right(&self, right: f32) -> Result<DriveState, BridgeError> {
        self.update_wheels(|state| state.right = right).await
    }

    /// Zero the drive state and halt every motor.
    ///
    /// Safe to call before any drive command.  Every zero-command is attempted
    /// even if an earlier one fails; the first failure is returned.
    #[instrument(skip(self))]
    pub async fn stop_all_motors(&self) -> Result<(), BridgeError> {
        let mut drive = self.drive.lock().await;
        *drive = DriveState::default();

        let results = [
            self.link.stop_all_motors().await,
            self.link.move_head(JointSpeed::Stop.speed()).await,
            self.link.move_lift(JointSpeed::Stop.speed()).await,
        ];
        results.into_iter().collect()
    }

    /// The current wheel fractions.
    pub async fn drive_state(&self) -> DriveState {
        *self.drive.lock().await
    }

    /// Mutate the drive state and send it, as one unit under the drive lock.
    ///
    /// The state keeps the new values even if the device rejects the command.
    #[instrument(skip(self, update))]
    async fn update_wheels(
        &self,
        update: impl FnOnce(&mut DriveState),
    ) -> Result<DriveState, BridgeError> {
        let mut drive = self.drive.lock().await;
        update(&mut drive);
        drive.left = clamp_fraction(drive.left);
        drive.right = clamp_fraction(drive.right);

        let state = *drive;
        let (lwheel, rwheel) = state.to_device_units();
        debug!(left = state.left, right = state.right, lwheel, rwheel, "drive wheels");
        self.link.drive_wheels(lwheel, rwheel).await?;
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{DeviceCommand, SimDeviceLink};
    use rcbridge_middleware::EventBus;

    fn make_translator() -> (Arc<SimDeviceLink>, MotionTranslator) {
        let link = Arc::new(SimDeviceLink::new(Arc::new(EventBus::default())));
        let translator = MotionTranslator::new(link.clone());
        (link, translator)
    }

    #[test]
    fn joint_speed_keywords() {
        assert_eq!(JointSpeed::from_keyword(Some("up")), JointSpeed::Raise);
        assert_eq!(JointSpeed::from_keyword(Some("down")), JointSpeed::Lower);
        assert_eq!(JointSpeed::from_keyword(Some("sideways")), JointSpeed::Stop);
        assert_eq!(JointSpeed::from_keyword(None), JointSpeed::Stop);
        assert!((JointSpeed::Raise.speed() - 0.8).abs() < f32::EPSILON);
        assert!((JointSpeed::Lower.speed() + 0.8).abs() < f32::EPSILON);
        assert_eq!(JointSpeed::Stop.speed(), 0.0);
    }

    #[test]
    fn wheel_units_truncate_toward_zero() {
        assert_eq!(wheel_units(0.5), 100);
        assert_eq!(wheel_units(0.333), 66);
        assert_eq!(wheel_units(-0.333), -66);
        assert_eq!(wheel_units(1.0), 200);
        assert_eq!(wheel_units(-1.0), -200);
    }

    #[test]
    fn wheel_units_clamp_out_of_range() {
        assert_eq!(wheel_units(2.5), 200);
        assert_eq!(wheel_units(-7.0), -200);
        assert_eq!(wheel_units(f32::INFINITY), 200);
        assert_eq!(wheel_units(f32::NEG_INFINITY), -200);
        assert_eq!(wheel_units(f32::NAN), 0);
        assert_eq!(wheel_units(f32::MAX), 200);
    }

    #[tokio::test]
    async fn drive_wheels_issues_device_units() {
        let (link, translator) = make_translator();
        let state = translator.drive_wheels(0.5, -0.25).await.unwrap();
        assert_eq!(state, DriveState { left: 0.5, right: -0.25 });
        assert_eq!(
            link.commands(),
            vec![DeviceCommand::DriveWheels {
                lwheel_mmps: 100,
                rwheel_mmps: -50
            }]
        );
    }

    #[tokio::test]
    async fn single_wheel_updates_keep_other_side() {
        let (link, translator) = make_translator();
        translator.drive_wheels(0.3, 0.3).await.unwrap();
        let state = translator.drive_left(0.75).await.unwrap();
        assert_eq!(state, DriveState { left: 0.75, right: 0.3 });
        let state = translator.drive_right(1.5).await.unwrap();
        assert_eq!(state, DriveState { left: 0.75, right: 1.0 });
        assert_eq!(
            link.commands().last(),
            Some(&DeviceCommand::DriveWheels {
                lwheel_mmps: 150,
                rwheel_mmps: 200
            })
        );
    }

    #[tokio::test]
    async fn stop_all_motors_before_any_drive() {
        let (link, translator) = make_translator();
        translator.stop_all_motors().await.unwrap();
        assert_eq!(translator.drive_state().await, DriveState::default());
        assert_eq!(
            link.commands(),
            vec![
                DeviceCommand::StopAllMotors,
                DeviceCommand::MoveHead(0.0),
                DeviceCommand::MoveLift(0.0),
            ]
        );
    }

    #[tokio::test]
    async fn stop_all_motors_resets_drive_state() {
        let (_link, translator) = make_translator();
        translator.drive_wheels(-0.7, 0.4).await.unwrap();
        translator.stop_all_motors().await.unwrap();
        assert_eq!(translator.drive_state().await, DriveState::default());
    }

    #[tokio::test]
    async fn failed_drive_still_records_state() {
        let (link, translator) = make_translator();
        link.set_commands_fail(true);
        let result = translator.drive_wheels(0.2, 0.2).await;
        assert!(matches!(result, Err(BridgeError::DeviceLink { .. })));
        assert_eq!(
            translator.drive_state().await,
            DriveState { left: 0.2, right: 0.2 }
        );
    }

    #[tokio::test]
    async fn head_and_lift_speeds() {
        let (link, translator) = make_translator();
        translator.drive_head(JointSpeed::Raise).await.unwrap();
        translator.drive_lift(JointSpeed::Lower).await.unwrap();
        translator.drive_lift(JointSpeed::Stop).await.unwrap();
        assert_eq!(
            link.commands(),
            vec![
                DeviceCommand::MoveHead(0.8),
                DeviceCommand::MoveLift(-0.8),
                DeviceCommand::MoveLift(0.0),
            ]
        );
    }

    /// Concurrent single-wheel updates must each land as a whole: every
    /// issued command matches some consistent drive vector.
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_updates_never_interleave() {
        let (link, translator) = make_translator();
        let translator = Arc::new(translator);

        let mut handles = Vec::new();
        for i in 0..50 {
            let t = Arc::clone(&translator);
            handles.push(tokio::spawn(async move {
                if i % 2 == 0 {
                    t.drive_wheels(0.5, 0.5).await.unwrap();
                } else {
                    t.drive_wheels(-0.5, 0.5).await.unwrap();
                }
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        for cmd in link.commands() {
            match cmd {
                DeviceCommand::DriveWheels { lwheel_mmps, rwheel_mmps } => {
                    assert_eq!(rwheel_mmps, 100);
                    assert!(lwheel_mmps == 100 || lwheel_mmps == -100);
                }
                other => panic!("unexpected command {other:?}"),
            }
        }
        let final_state = translator.drive_state().await;
        let (l, r) = final_state.to_device_units();
        assert_eq!(
            link.commands().last(),
            Some(&DeviceCommand::DriveWheels {
                lwheel_mmps: l,
                rwheel_mmps: r
            })
        );
    }
}
