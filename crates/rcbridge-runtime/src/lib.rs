//! `rcbridge-runtime` – Command Handling and Session Lifecycle
//!
//! Everything between the HTTP front-end and the device link: decoding
//! commands, applying them, keeping the camera frame fresh, and feeding device
//! events into the state store.
//!
//! # Modules
//!
//! - [`command`] – [`Command`][command::Command]: the closed command
//!   vocabulary and its decoding from `{"command", "value"}` request bodies.
//! - [`dispatcher`] – [`CommandDispatcher`][dispatcher::CommandDispatcher]:
//!   routes each command to the motion translator, the device link, the still
//!   camera, or the face renderer.  Device failures are logged and swallowed.
//! - [`camera_poller`] – [`CameraPoller`][camera_poller::CameraPoller]:
//!   fires one capture request per interval without waiting for the last.
//! - [`event_pump`] – [`EventPump`][event_pump::EventPump]:
//!   drains telemetry, frames, and interaction events from the bus into the
//!   [`StateStore`][rcbridge_kernel::StateStore].
//! - [`session`] – [`Session`][session::Session]: start-up sequence,
//!   background tasks, and orderly shutdown.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]: the global
//!   `tracing` subscriber with optional OTLP export.

pub mod camera_poller;
pub mod command;
pub mod dispatcher;
pub mod event_pump;
pub mod session;
pub mod telemetry;

pub use camera_poller::{CameraPoller, PollerStats};
pub use command::{CameraSource, Command, CommandRequest};
pub use dispatcher::{CommandDispatcher, DispatchOutcome};
pub use event_pump::EventPump;
pub use session::{Session, SessionConfig};
pub use telemetry::{TracerProviderGuard, init_tracing};
