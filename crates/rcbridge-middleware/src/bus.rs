//! Headless, topic-based publish/subscribe event bus.
//!
//! Uses [`tokio::sync::broadcast`] channels under the hood so that a slow
//! subscriber never blocks the device link that publishes into it: the
//! subscriber lags and skips ahead instead.
//!
//! # Topics
//!
//! | Topic | Typical traffic |
//! |---|---|
//! | [`Topic::Telemetry`] | Robot-state snapshots (tens of Hz) |
//! | [`Topic::Camera`] | Camera frames pushed by the device |
//! | [`Topic::Interaction`] | Touch / poke events |
//! | [`Topic::SystemAlerts`] | Link faults |

use rcbridge_types::{BridgeError, Event, EventPayload};
use tokio::sync::broadcast;

/// Default channel capacity (number of buffered events before old ones are
/// dropped for slow subscribers).
pub const DEFAULT_CAPACITY: usize = 256;

/// Routing lanes on the event bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Robot-state snapshots.
    Telemetry,
    /// Camera frames delivered without an explicit capture request.
    Camera,
    /// Interaction events such as the robot being poked.
    Interaction,
    /// Link faults and other out-of-band conditions.
    SystemAlerts,
}

impl Topic {
    /// Every topic, in a stable order.
    pub const ALL: [Topic; 4] = [
        Topic::Telemetry,
        Topic::Camera,
        Topic::Interaction,
        Topic::SystemAlerts,
    ];

    /// The lane a payload naturally belongs to.
    pub fn for_payload(payload: &EventPayload) -> Topic {
        match payload {
            EventPayload::Telemetry(_) => Topic::Telemetry,
            EventPayload::CameraFrame(_) => Topic::Camera,
            EventPayload::RobotPoked => Topic::Interaction,
            EventPayload::LinkFault { .. } => Topic::SystemAlerts,
        }
    }
}

/// Shared event bus. Clone it cheaply – all clones share the same underlying
/// broadcast channels.
#[derive(Clone, Debug)]
pub struct EventBus {
    telemetry: broadcast::Sender<Event>,
    camera: broadcast::Sender<Event>,
    interaction: broadcast::Sender<Event>,
    system_alerts: broadcast::Sender<Event>,
}

impl EventBus {
    /// Create a new bus with the given channel capacity.
    ///
    /// The `capacity` is applied to every topic channel independently.
    pub fn new(capacity: usize) -> Self {
        let (telemetry, _) = broadcast::channel(capacity);
        let (camera, _) = broadcast::channel(capacity);
        let (interaction, _) = broadcast::channel(capacity);
        let (system_alerts, _) = broadcast::channel(capacity);
        Self {
            telemetry,
            camera,
            interaction,
            system_alerts,
        }
    }

    /// Publish `event` to the given [`Topic`] channel.
    ///
    /// Returns the number of active receivers that were handed the event, or
    /// [`BridgeError::Channel`] when nobody is subscribed to the topic.
    pub fn publish_to(&self, topic: Topic, event: Event) -> Result<usize, BridgeError> {
        self.topic_sender(topic)
            .send(event)
            .map_err(|_| BridgeError::Channel(format!("No subscribers for topic {topic:?}")))
    }

    /// Publish `event` on the topic implied by its payload.
    pub fn publish(&self, event: Event) -> Result<usize, BridgeError> {
        let topic = Topic::for_payload(&event.payload);
        self.publish_to(topic, event)
    }

    /// Subscribe to a specific [`Topic`] channel.
    pub fn subscribe_to(&self, topic: Topic) -> TopicReceiver {
        TopicReceiver {
            topic,
            receiver: self.topic_sender(topic).subscribe(),
        }
    }

    /// Number of live subscribers on `topic`.
    pub fn receiver_count(&self, topic: Topic) -> usize {
        self.topic_sender(topic).receiver_count()
    }

    fn topic_sender(&self, topic: Topic) -> &broadcast::Sender<Event> {
        match topic {
            Topic::Telemetry => &self.telemetry,
            Topic::Camera => &self.camera,
            Topic::Interaction => &self.interaction,
            Topic::SystemAlerts => &self.system_alerts,
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Topic-based receiver
// ---------------------------------------------------------------------------

/// An async receiver bound to a single [`Topic`] channel.
///
/// Obtained via [`EventBus::subscribe_to`].
pub struct TopicReceiver {
    topic: Topic,
    receiver: broadcast::Receiver<Event>,
}

impl TopicReceiver {
    /// Wait for the next event on this topic.
    ///
    /// Returns:
    /// * `Ok(event)` – a successfully received event.
    /// * `Err(broadcast::error::RecvError::Lagged(n))` – the subscriber fell
    ///   behind and `n` messages were dropped.  The caller decides whether to
    ///   continue or abort.
    /// * `Err(broadcast::error::RecvError::Closed)` – the bus has shut down.
    pub async fn recv(&mut self) -> Result<Event, broadcast::error::RecvError> {
        self.receiver.recv().await
    }

    /// The [`Topic`] this receiver is bound to.
    pub fn topic(&self) -> Topic {
        self.topic
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rcbridge_types::TelemetrySnapshot;
    use std::sync::Arc;

    fn telemetry_event(timestamp: u32) -> Event {
        Event::new(
            "rcbridge-middleware::test",
            EventPayload::Telemetry(Arc::new(TelemetrySnapshot {
                timestamp,
                ..Default::default()
            })),
        )
    }

    #[tokio::test]
    async fn publish_routes_by_payload() -> Result<(), Box<dyn std::error::Error>> {
        let bus = EventBus::default();
        let mut telemetry = bus.subscribe_to(Topic::Telemetry);
        let mut interaction = bus.subscribe_to(Topic::Interaction);

        bus.publish(telemetry_event(7))?;
        bus.publish(Event::new("test", EventPayload::RobotPoked))?;

        let event = telemetry.recv().await?;
        match event.payload {
            EventPayload::Telemetry(snapshot) => assert_eq!(snapshot.timestamp, 7),
            other => panic!("unexpected payload {other:?}"),
        }
        assert!(matches!(
            interaction.recv().await?.payload,
            EventPayload::RobotPoked
        ));
        Ok(())
    }

    #[tokio::test]
    async fn multiple_subscribers_receive_same_event() -> Result<(), Box<dyn std::error::Error>> {
        let bus = EventBus::default();
        let mut first = bus.subscribe_to(Topic::Telemetry);
        let mut second = bus.subscribe_to(Topic::Telemetry);

        let event = telemetry_event(1);
        bus.publish_to(Topic::Telemetry, event.clone())?;

        assert_eq!(first.recv().await?.id, event.id);
        assert_eq!(second.recv().await?.id, event.id);
        Ok(())
    }

    #[test]
    fn publish_without_subscribers_returns_channel_error() {
        let bus = EventBus::default();
        let result = bus.publish(telemetry_event(1));
        assert!(matches!(result, Err(BridgeError::Channel(_))));
    }

    #[tokio::test]
    async fn subscriber_does_not_receive_other_topic_events() -> Result<(), Box<dyn std::error::Error>> {
        let bus = EventBus::default();
        let mut alerts = bus.subscribe_to(Topic::SystemAlerts);
        let _telemetry = bus.subscribe_to(Topic::Telemetry);

        bus.publish(telemetry_event(3))?;

        let result =
            tokio::time::timeout(std::time::Duration::from_millis(50), alerts.recv()).await;
        assert!(
            result.is_err(),
            "SystemAlerts subscriber must not receive a Telemetry event"
        );
        Ok(())
    }

    /// Flooding a small channel while the subscriber sleeps must surface as
    /// `Lagged`, never as a blocked publisher.
    #[tokio::test]
    async fn slow_subscriber_lags_instead_of_blocking() {
        let bus = EventBus::new(16);
        let mut slow = bus.subscribe_to(Topic::Telemetry);

        for i in 0..1_000 {
            let _ = bus.publish(telemetry_event(i));
        }

        let result = slow.recv().await;
        assert!(
            matches!(result, Err(broadcast::error::RecvError::Lagged(_))),
            "expected Lagged error, got: {result:?}"
        );
        // After the lag report the receiver resumes with the newest events.
        let next = slow.recv().await.expect("resumes after lag");
        assert_eq!(next.source, "rcbridge-middleware::test");
    }

    #[test]
    fn receiver_count_tracks_subscriptions() {
        let bus = EventBus::default();
        assert_eq!(bus.receiver_count(Topic::Camera), 0);
        let rx = bus.subscribe_to(Topic::Camera);
        assert_eq!(bus.receiver_count(Topic::Camera), 1);
        assert_eq!(rx.topic(), Topic::Camera);
        drop(rx);
        assert_eq!(bus.receiver_count(Topic::Camera), 0);
    }
}
