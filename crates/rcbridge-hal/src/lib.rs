//! `rcbridge-hal` – Hardware Abstraction Layer
//!
//! Everything that turns intent into device-level values lives here.
//!
//! # Modules
//!
//! - [`motion`] – [`MotionTranslator`][motion::MotionTranslator]: owns the
//!   differential-drive state and converts normalised fractions into the
//!   device's integer wheel speeds.
//! - [`camera`] – [`StillCamera`][camera::StillCamera]: the external still
//!   image utility (`raspistill`).
//! - [`face`] – [`FaceExpression`][face::FaceExpression] vocabulary and the
//!   [`FaceRenderer`][face::FaceRenderer] seam.
//! - [`sim`] – [`SimDeviceLink`][sim::SimDeviceLink]: an in-process robot for
//!   running the whole stack without hardware.

pub mod camera;
pub mod face;
pub mod motion;
pub mod sim;

pub use camera::{RaspiStill, RaspiStillConfig, StillCamera};
pub use face::{EyeBoxRenderer, FaceExpression, FaceRenderer};
pub use motion::{DriveState, JointSpeed, MotionTranslator};
pub use sim::SimDeviceLink;
