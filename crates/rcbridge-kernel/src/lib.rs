//! `rcbridge-kernel` – Shared state and session lifetime
//!
//! The only state shared between the request path, the camera poller and
//! device event delivery lives here.
//!
//! # Modules
//!
//! - [`state_store`] – [`StateStore`][state_store::StateStore]: latest
//!   telemetry snapshot and latest camera frame, each replaced by a single
//!   atomic pointer swap.  Readers never block writers.
//! - [`shutdown`] – [`ShutdownSignal`][shutdown::ShutdownSignal]: the
//!   session-wide stop flag observed by every background loop.

pub mod shutdown;
pub mod state_store;

pub use shutdown::ShutdownSignal;
pub use state_store::StateStore;
