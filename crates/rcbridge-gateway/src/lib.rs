//! `rcbridge-gateway` – The HTTP Front-End
//!
//! Boots a small HTTP/1.1 server (default port `3141`) that:
//!
//! 1. **Accepts** `POST` bodies of the form `{"command": ..., "value": ...}`,
//!    hands them to the [`CommandDispatcher`], and answers with the latest
//!    telemetry as JSON.  Undecodable bodies get `400`; device failures do not
//!    change the status.
//!
//! 2. **Serves** the latest camera frame as `image/jpeg` on every `GET`,
//!    with an empty body until the first frame arrives.
//!
//! 3. **Answers** `OPTIONS` preflights, and every other method with `501`.
//!
//! Every response, frames included, carries the fixed CORS headers for one
//! origin.
//!
//! # Usage
//!
//! ```rust,no_run
//! use rcbridge_gateway::ApiGateway;
//! # async fn serve(session: rcbridge_runtime::Session) {
//! ApiGateway::new(session.dispatcher())
//!     .with_port(3141)
//!     .run(session.shutdown_signal())
//!     .await
//!     .expect("gateway failed");
//! # }
//! ```
//!
//! [`CommandDispatcher`]: rcbridge_runtime::CommandDispatcher

pub mod http;
pub mod server;

pub use http::{HttpRequest, HttpResponse, Status};
pub use server::{ApiGateway, DEFAULT_CORS_ORIGIN, DEFAULT_PORT};
