//! `rcbridge-middleware` – Device-to-core plumbing
//!
//! Carries asynchronous robot traffic into the core without caring what the
//! core does with it.
//!
//! # Modules
//!
//! - [`bus`] – Topic-partitioned publish/subscribe event bus built on Tokio
//!   broadcast channels.  The device link is the producer; the session's
//!   event pump is the consumer that fills the state store.
//! - [`link`] – The [`DeviceLink`] trait: the only surface through which the
//!   core talks to the robot.

pub mod bus;
pub mod link;

pub use bus::{EventBus, Topic, TopicReceiver};
pub use link::DeviceLink;
