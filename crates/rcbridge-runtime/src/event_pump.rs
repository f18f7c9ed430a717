//! [`EventPump`] – drains device events into the state store.
//!
//! The device link publishes telemetry, camera frames, interaction events,
//! and link faults on the [`EventBus`].  The pump subscribes to each topic
//! when it is constructed, so events published between construction and
//! [`spawn`][EventPump::spawn] are not lost.
//!
//! Telemetry and frames are installed as-is.  Pokes are logged at `info`,
//! link faults at `warn`.  A lagging receiver skips ahead rather than
//! blocking the publisher.

use std::sync::Arc;

use rcbridge_kernel::{ShutdownSignal, StateStore};
use rcbridge_middleware::{EventBus, Topic, TopicReceiver};
use rcbridge_types::{Event, EventPayload};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Subscriber task feeding the [`StateStore`].
pub struct EventPump {
    store: Arc<StateStore>,
    telemetry: TopicReceiver,
    camera: TopicReceiver,
    interaction: TopicReceiver,
    alerts: TopicReceiver,
}

impl EventPump {
    /// Subscribe to every device topic on `bus`.
    pub fn new(bus: &EventBus, store: Arc<StateStore>) -> Self {
        Self {
            store,
            telemetry: bus.subscribe_to(Topic::Telemetry),
            camera: bus.subscribe_to(Topic::Camera),
            interaction: bus.subscribe_to(Topic::Interaction),
            alerts: bus.subscribe_to(Topic::SystemAlerts),
        }
    }

    pub fn spawn(self, shutdown: ShutdownSignal) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }

    /// Pump events until `shutdown` is raised or every topic closes.
    pub async fn run(mut self, shutdown: ShutdownSignal) {
        let mut open = [true; 4];
        while open.iter().any(|&o| o) {
            let (index, received) = tokio::select! {
                _ = shutdown.wait() => break,
                r = self.telemetry.recv(), if open[0] => (0, r),
                r = self.camera.recv(), if open[1] => (1, r),
                r = self.interaction.recv(), if open[2] => (2, r),
                r = self.alerts.recv(), if open[3] => (3, r),
            };
            match received {
                Ok(event) => self.apply(event),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(topic = ?Topic::ALL[index], skipped, "event pump lagged");
                }
                Err(RecvError::Closed) => {
                    debug!(topic = ?Topic::ALL[index], "topic closed");
                    open[index] = false;
                }
            }
        }
        debug!("event pump stopped");
    }

    fn apply(&self, event: Event) {
        match event.payload {
            EventPayload::Telemetry(snapshot) => self.store.put_telemetry(snapshot),
            EventPayload::CameraFrame(frame) => self.store.put_frame(frame),
            EventPayload::RobotPoked => info!(source = %event.source, "robot poked"),
            EventPayload::LinkFault { component, message } => {
                warn!(source = %event.source, component = %component, message = %message, "device link fault");
            }
        }
    }
}
