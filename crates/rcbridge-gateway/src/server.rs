//! [`ApiGateway`] – the bridge's HTTP front-end.
//!
//! Listens on `0.0.0.0:3141` (configurable via [`ApiGateway::with_port`]).
//!
//! * `POST` → decode a command, dispatch it, answer with the telemetry JSON.
//! * `GET` (any path) → the latest camera frame as `image/jpeg`.
//! * `OPTIONS` → CORS preflight, answered with the telemetry JSON.
//! * anything else → `501`.
//!
//! Each connection runs on its own task.  Store reads are lock-free snapshot
//! loads, so a slow client never holds anything the poller or the event pump
//! need.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use rcbridge_kernel::{ShutdownSignal, StateStore};
use rcbridge_runtime::{CommandDispatcher, CommandRequest};
use rcbridge_types::BridgeError;
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

use crate::http::{HttpRequest, HttpResponse, Status, read_request};

/// Default TCP port.
pub const DEFAULT_PORT: u16 = 3141;
/// Default origin allowed by the CORS headers.
pub const DEFAULT_CORS_ORIGIN: &str = "http://rp3-01.local";

/// How long a client may take to send its request.
const READ_TIMEOUT: Duration = Duration::from_secs(10);

const EMPTY_TELEMETRY: &[u8] = b"{}";

// ---------------------------------------------------------------------------
// ApiGateway
// ---------------------------------------------------------------------------

/// HTTP server in front of one [`CommandDispatcher`] and its [`StateStore`].
pub struct ApiGateway {
    dispatcher: Arc<CommandDispatcher>,
    store: Arc<StateStore>,
    port: u16,
    cors_origin: String,
}

impl ApiGateway {
    /// Create a gateway on the [`DEFAULT_PORT`] serving `dispatcher`'s store.
    pub fn new(dispatcher: Arc<CommandDispatcher>) -> Self {
        let store = Arc::clone(dispatcher.store());
        Self {
            dispatcher,
            store,
            port: DEFAULT_PORT,
            cors_origin: DEFAULT_CORS_ORIGIN.to_string(),
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_cors_origin(mut self, origin: impl Into<String>) -> Self {
        self.cors_origin = origin.into();
        self
    }

    /// Bind `0.0.0.0:<port>` and serve until `shutdown` is raised.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Io`] if the listener cannot bind.
    pub async fn run(self, shutdown: ShutdownSignal) -> Result<(), BridgeError> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| BridgeError::Io(format!("bind error on {addr}: {e}")))?;
        self.serve(listener, shutdown).await;
        Ok(())
    }

    /// Serve connections from an already bound listener until `shutdown`.
    ///
    /// Connections already accepted finish on their own tasks.
    pub async fn serve(self, listener: TcpListener, shutdown: ShutdownSignal) {
        match listener.local_addr() {
            Ok(addr) => info!(%addr, "api gateway listening"),
            Err(_) => info!("api gateway listening"),
        }
        let gateway = Arc::new(self);

        loop {
            tokio::select! {
                _ = shutdown.wait() => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        let gateway = Arc::clone(&gateway);
                        tokio::spawn(async move {
                            if let Err(e) = gateway.handle_connection(stream).await {
                                debug!(%peer, error = %e, "connection error");
                            }
                        });
                    }
                    Err(e) => warn!(error = %e, "accept error"),
                },
            }
        }
        info!("api gateway stopped");
    }

    // -----------------------------------------------------------------------
    // Per-connection handling
    // -----------------------------------------------------------------------

    async fn handle_connection(&self, stream: TcpStream) -> Result<(), BridgeError> {
        let mut reader = BufReader::new(stream);
        let response = match tokio::time::timeout(READ_TIMEOUT, read_request(&mut reader)).await {
            Err(_) => return Err(BridgeError::Io("client read timed out".to_string())),
            Ok(Err(BridgeError::Io(e))) => return Err(BridgeError::Io(e)),
            Ok(Err(e)) => {
                warn!(error = %e, "malformed HTTP request");
                self.telemetry_response(Status::BadRequest)
            }
            Ok(Ok(request)) => self.handle_request(&request).await,
        };

        let mut stream = reader.into_inner();
        stream.write_all(&response.to_bytes(&self.cors_origin)).await?;
        stream.shutdown().await?;
        Ok(())
    }

    /// Produce the response for one parsed request.
    pub async fn handle_request(&self, request: &HttpRequest) -> HttpResponse {
        debug!(method = %request.method, path = %request.path, "request");
        match request.method.as_str() {
            "POST" => self.handle_post(&request.body).await,
            "GET" => {
                let body = self
                    .store
                    .get_frame()
                    .map(|frame| frame.data.clone())
                    .unwrap_or_default();
                HttpResponse::jpeg(body)
            }
            "OPTIONS" => self.telemetry_response(Status::Ok),
            other => {
                warn!(method = %other, "unsupported method");
                self.telemetry_response(Status::NotImplemented)
            }
        }
    }

    async fn handle_post(&self, body: &[u8]) -> HttpResponse {
        let command = match CommandRequest::from_body(body).and_then(CommandRequest::into_command) {
            Ok(command) => command,
            Err(e) => {
                warn!(error = %e, "rejected command");
                return self.telemetry_response(Status::BadRequest);
            }
        };
        let outcome = self.dispatcher.dispatch(command).await;
        debug!(?outcome, "command dispatched");
        self.telemetry_response(Status::Ok)
    }

    /// Current telemetry as JSON, or `{}` before the first snapshot.
    fn telemetry_response(&self, status: Status) -> HttpResponse {
        let body = match self.store.get_telemetry() {
            Some(snapshot) => serde_json::to_vec(&*snapshot).unwrap_or_else(|e| {
                warn!(error = %e, "telemetry serialization failed");
                EMPTY_TELEMETRY.to_vec()
            }),
            None => EMPTY_TELEMETRY.to_vec(),
        };
        HttpResponse::telemetry(status, body)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use rcbridge_hal::sim::DeviceCommand;
    use rcbridge_hal::{EyeBoxRenderer, MotionTranslator, SimDeviceLink, StillCamera};
    use rcbridge_middleware::{DeviceLink, EventBus};
    use rcbridge_runtime::EventPump;
    use rcbridge_types::{CameraFrame, TelemetrySnapshot};
    use serde_json::Value;
    use std::path::PathBuf;
    use tokio::io::AsyncReadExt;

    struct NoStill;

    #[async_trait]
    impl StillCamera for NoStill {
        async fn capture_still(&self) -> Result<PathBuf, BridgeError> {
            Err(BridgeError::StillCamera("not installed".to_string()))
        }
    }

    fn gateway() -> (Arc<SimDeviceLink>, ShutdownSignal, ApiGateway) {
        gateway_on(Arc::new(EventBus::default()))
    }

    fn gateway_on(bus: Arc<EventBus>) -> (Arc<SimDeviceLink>, ShutdownSignal, ApiGateway) {
        let sim = Arc::new(SimDeviceLink::new(bus));
        let link: Arc<dyn DeviceLink> = sim.clone();
        let shutdown = ShutdownSignal::new();
        let dispatcher = CommandDispatcher::new(
            Arc::new(MotionTranslator::new(Arc::clone(&link))),
            link,
            Arc::new(StateStore::new()),
            Arc::new(NoStill),
            Arc::new(EyeBoxRenderer),
            shutdown.clone(),
        );
        (sim, shutdown, ApiGateway::new(Arc::new(dispatcher)))
    }

    fn request(method: &str, path: &str, body: &str) -> HttpRequest {
        HttpRequest {
            method: method.to_string(),
            path: path.to_string(),
            headers: Vec::new(),
            body: body.as_bytes().to_vec(),
        }
    }

    #[tokio::test]
    async fn post_move_drives_wheels_and_returns_200() {
        let (sim, _, gw) = gateway();
        let resp = gw
            .handle_request(&request("POST", "/", r#"{"command":"move","value":"50"}"#))
            .await;
        assert_eq!(resp.status, Status::Ok);
        assert_eq!(resp.body, b"{}");
        assert_eq!(
            sim.commands(),
            vec![DeviceCommand::DriveWheels {
                lwheel_mmps: 100,
                rwheel_mmps: 100
            }]
        );
    }

    #[tokio::test]
    async fn empty_body_is_400_with_telemetry() {
        let (sim, _, gw) = gateway();
        let resp = gw.handle_request(&request("POST", "/", "")).await;
        assert_eq!(resp.status, Status::BadRequest);
        assert_eq!(resp.body, b"{}");
        assert!(sim.commands().is_empty());
    }

    #[tokio::test]
    async fn invalid_json_and_bad_values_are_400() {
        let (_, _, gw) = gateway();
        for body in ["{not json", r#"{"value":"1"}"#, r#"{"command":"move","value":"fast"}"#] {
            let resp = gw.handle_request(&request("POST", "/", body)).await;
            assert_eq!(resp.status, Status::BadRequest, "body {body}");
        }
    }

    #[tokio::test]
    async fn unknown_command_is_200_and_does_nothing() {
        let (sim, shutdown, gw) = gateway();
        let resp = gw
            .handle_request(&request("POST", "/", r#"{"command":"moonwalk"}"#))
            .await;
        assert_eq!(resp.status, Status::Ok);
        assert!(sim.commands().is_empty());
        assert!(!shutdown.is_triggered());
    }

    #[tokio::test]
    async fn device_failure_is_still_200() {
        let (sim, _, gw) = gateway();
        sim.set_commands_fail(true);
        let resp = gw
            .handle_request(&request("POST", "/", r#"{"command":"turn","value":20}"#))
            .await;
        assert_eq!(resp.status, Status::Ok);
    }

    #[tokio::test]
    async fn post_returns_latest_telemetry() {
        let (_, _, gw) = gateway();
        gw.store.put_telemetry(TelemetrySnapshot {
            timestamp: 77,
            battery_voltage: 3.5,
            ..Default::default()
        });
        let resp = gw
            .handle_request(&request("POST", "/", r#"{"command":"nop"}"#))
            .await;
        let json: Value = serde_json::from_slice(&resp.body).unwrap();
        assert_eq!(json["timestamp"], 77);
        assert_eq!(json["battery_voltage"], 3.5);
        assert_eq!(json.as_object().unwrap().len(), 23);
    }

    #[tokio::test]
    async fn telemetry_changes_only_with_device_events() {
        let bus = Arc::new(EventBus::default());
        let (sim, shutdown, gw) = gateway_on(Arc::clone(&bus));
        let pump = EventPump::new(&bus, Arc::clone(&gw.store)).spawn(shutdown.clone());
        gw.store.put_telemetry(TelemetrySnapshot {
            timestamp: 5,
            pose_x: 12.5,
            pose_angle_rad: 0.25,
            ..Default::default()
        });

        let resp = gw
            .handle_request(&request("POST", "/", r#"{"command":"move","value":"50"}"#))
            .await;
        let json: Value = serde_json::from_slice(&resp.body).unwrap();
        assert_eq!(json["timestamp"], 5);
        assert_eq!(json["pose_x"], 12.5);
        assert_eq!(json["pose_angle_rad"], 0.25);
        assert_eq!(json["lwheel_speed_mmps"], 0.0);

        // The robot reports the new wheel speeds on its next state event.
        sim.tick(Duration::from_millis(30));
        tokio::time::timeout(Duration::from_secs(1), async {
            while gw.store.get_telemetry().map(|t| t.timestamp) != Some(30) {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("pump must install the new snapshot");

        let resp = gw
            .handle_request(&request("POST", "/", r#"{"command":"nop"}"#))
            .await;
        let json: Value = serde_json::from_slice(&resp.body).unwrap();
        assert_eq!(json["timestamp"], 30);
        assert_eq!(json["lwheel_speed_mmps"], 100.0);
        assert_eq!(json["rwheel_speed_mmps"], 100.0);

        shutdown.trigger("test");
        pump.await.unwrap();
    }

    #[tokio::test]
    async fn get_before_any_frame_is_empty_jpeg() {
        let (_, _, gw) = gateway();
        let resp = gw.handle_request(&request("GET", "/camera.jpg", "")).await;
        assert_eq!(resp.status, Status::Ok);
        assert_eq!(resp.kind, crate::http::BodyKind::Jpeg);
        assert!(resp.body.is_empty());
    }

    #[tokio::test]
    async fn get_any_path_serves_latest_frame() {
        let (_, _, gw) = gateway();
        gw.store.put_frame(CameraFrame::new(2, 1, vec![0xFF, 0xD8, 0x01]));
        for path in ["/camera.jpg", "/", "/anything"] {
            let resp = gw.handle_request(&request("GET", path, "")).await;
            assert_eq!(resp.body, vec![0xFF, 0xD8, 0x01]);
        }
    }

    #[tokio::test]
    async fn options_and_unsupported_methods() {
        let (_, _, gw) = gateway();
        let resp = gw.handle_request(&request("OPTIONS", "/", "")).await;
        assert_eq!(resp.status, Status::Ok);
        assert_eq!(resp.body, b"{}");

        for method in ["PUT", "DELETE", "HEAD"] {
            let resp = gw.handle_request(&request(method, "/", "")).await;
            assert_eq!(resp.status, Status::NotImplemented);
        }
    }

    #[tokio::test]
    async fn stop_command_raises_shutdown() {
        let (_, shutdown, gw) = gateway();
        gw.handle_request(&request("POST", "/", r#"{"command":"stop"}"#))
            .await;
        assert!(shutdown.is_triggered());
    }

    async fn roundtrip(addr: SocketAddr, raw: &[u8]) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(raw).await.unwrap();
        let mut out = Vec::new();
        stream.read_to_end(&mut out).await.unwrap();
        String::from_utf8_lossy(&out).into_owned()
    }

    #[tokio::test]
    async fn serves_over_tcp_until_shutdown() {
        let (sim, shutdown, gw) = gateway();
        let gw = gw.with_cors_origin("http://example.test");
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(gw.serve(listener, shutdown.clone()));

        let body = r#"{"command":"leftw","value":"100"}"#;
        let raw = format!(
            "POST / HTTP/1.1\r\nHost: test\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{body}",
            body.len()
        );
        let text = roundtrip(addr, raw.as_bytes()).await;
        assert!(text.starts_with("HTTP/1.1 200 OK\r\n"), "{text}");
        assert!(text.contains("Access-Control-Allow-Origin: http://example.test\r\n"));
        assert!(text.ends_with("\r\n\r\n{}"));
        assert_eq!(
            sim.commands(),
            vec![DeviceCommand::DriveWheels {
                lwheel_mmps: 200,
                rwheel_mmps: 0
            }]
        );

        let text = roundtrip(addr, b"POST / HTTP/1.1\r\nContent-Length: 0\r\n\r\n").await;
        assert!(text.starts_with("HTTP/1.1 400 Bad Request\r\n"), "{text}");

        let text = roundtrip(
            addr,
            b"GET /camera.jpg HTTP/1.1\r\nOrigin: http://example.test\r\n\r\n",
        )
        .await;
        assert!(text.contains("Content-Type: image/jpeg\r\n"));
        assert!(text.contains("Access-Control-Allow-Origin: http://example.test\r\n"));
        assert!(text.contains("Access-Control-Allow-Credentials: true\r\n"));
        assert!(text.contains("Content-Length: 0\r\n"));

        shutdown.trigger("test");
        tokio::time::timeout(Duration::from_secs(1), server)
            .await
            .expect("server must stop")
            .unwrap();
    }
}
