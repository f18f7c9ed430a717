//! Decoding of `{"command": ..., "value": ...}` request bodies.
//!
//! The wire format is a name plus an optional value that may be a string or
//! a number.  [`Command::parse`] turns it into a closed enumeration; names
//! outside the vocabulary become [`Command::Unrecognized`], which the
//! dispatcher deliberately treats as a no-op so that clients probing for
//! unsupported commands keep working.

use rcbridge_hal::{FaceExpression, JointSpeed};
use rcbridge_types::BridgeError;
use serde::Deserialize;
use serde_json::Value;

/// Raw request body.
#[derive(Debug, Deserialize)]
pub struct CommandRequest {
    pub command: String,
    #[serde(default)]
    pub value: Option<Value>,
}

impl CommandRequest {
    /// Decode a request body.
    ///
    /// # Errors
    ///
    /// [`BridgeError::MalformedRequest`] for an empty body, invalid JSON, a
    /// missing `command` field, or a value that is neither string nor number.
    pub fn from_body(body: &[u8]) -> Result<Self, BridgeError> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Err(BridgeError::MalformedRequest("empty request body".to_string()));
        }
        let request: CommandRequest = serde_json::from_slice(body)
            .map_err(|e| BridgeError::MalformedRequest(format!("invalid JSON: {e}")))?;
        // Validate the value shape up front.
        request.value_text()?;
        Ok(request)
    }

    /// The value rendered as text, `None` when absent or `null`.
    pub fn value_text(&self) -> Result<Option<String>, BridgeError> {
        match &self.value {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(Value::Number(n)) => Ok(Some(n.to_string())),
            Some(other) => Err(BridgeError::MalformedRequest(format!(
                "value must be a string or number, got {other}"
            ))),
        }
    }

    /// Decode into a [`Command`].
    pub fn into_command(self) -> Result<Command, BridgeError> {
        let value = self.value_text()?;
        Command::parse(&self.command, value.as_deref())
    }
}

/// Image source selected by the `camera` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraSource {
    /// One on-demand capture from the robot's own camera.
    Device,
    /// The external still-image utility.
    Still,
}

/// Every command the bridge understands.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// End the session.
    Stop,
    Lift(JointSpeed),
    Head(JointSpeed),
    /// Spin in place; `left` is the left wheel fraction, right is its negation.
    Turn { left: f32 },
    /// Drive straight with both wheels at `fraction`.
    Move { fraction: f32 },
    LeftWheel { fraction: f32 },
    RightWheel { fraction: f32 },
    MotorStop,
    /// `None` when the source keyword is not recognised.
    Camera(Option<CameraSource>),
    Face(FaceExpression),
    Animation(String),
    /// Keep-alive.
    Nop,
    /// A name outside the vocabulary.  Dispatching it does nothing.
    Unrecognized(String),
}

impl Command {
    /// Build a command from its name and optional value text.
    ///
    /// # Errors
    ///
    /// Wheel commands need a finite numeric value: a missing value is
    /// [`BridgeError::MalformedRequest`], a non-numeric one
    /// [`BridgeError::UnknownValue`].  `animation` needs a name.
    pub fn parse(name: &str, value: Option<&str>) -> Result<Self, BridgeError> {
        let command = match name {
            "stop" => Command::Stop,
            "lift" => Command::Lift(JointSpeed::from_keyword(value)),
            "head" => Command::Head(JointSpeed::from_keyword(value)),
            "turn" => Command::Turn {
                left: percent(name, value)?,
            },
            "move" => Command::Move {
                fraction: percent(name, value)?,
            },
            "leftw" => Command::LeftWheel {
                fraction: percent(name, value)?,
            },
            "rightw" => Command::RightWheel {
                fraction: percent(name, value)?,
            },
            "motor_stop" => Command::MotorStop,
            "camera" => Command::Camera(match value {
                Some("cozmo") => Some(CameraSource::Device),
                Some("raspi") => Some(CameraSource::Still),
                _ => None,
            }),
            "face" => Command::Face(FaceExpression::from_keyword(value)),
            "animation" => match value {
                Some(anim) if !anim.trim().is_empty() => Command::Animation(anim.to_string()),
                _ => {
                    return Err(BridgeError::MalformedRequest(
                        "command 'animation' requires an animation name".to_string(),
                    ));
                }
            },
            "nop" => Command::Nop,
            other => Command::Unrecognized(other.to_string()),
        };
        Ok(command)
    }

    /// Wire name of the command, for logging.
    pub fn name(&self) -> &str {
        match self {
            Command::Stop => "stop",
            Command::Lift(_) => "lift",
            Command::Head(_) => "head",
            Command::Turn { .. } => "turn",
            Command::Move { .. } => "move",
            Command::LeftWheel { .. } => "leftw",
            Command::RightWheel { .. } => "rightw",
            Command::MotorStop => "motor_stop",
            Command::Camera(_) => "camera",
            Command::Face(_) => "face",
            Command::Animation(_) => "animation",
            Command::Nop => "nop",
            Command::Unrecognized(name) => name,
        }
    }
}

/// Parse a percentage (nominally -100..100) into a fraction.
///
/// Out-of-range values are accepted here; the motion translator clamps them.
fn percent(command: &str, value: Option<&str>) -> Result<f32, BridgeError> {
    let text = value.ok_or_else(|| {
        BridgeError::MalformedRequest(format!("command '{command}' requires a numeric value"))
    })?;
    let invalid = || BridgeError::UnknownValue {
        command: command.to_string(),
        value: text.to_string(),
    };
    let number: f32 = text.trim().parse().map_err(|_| invalid())?;
    if !number.is_finite() {
        return Err(invalid());
    }
    Ok(number / 100.0)
}
