// Path: crates/messaging/src/bus.rs

//! The one-way alert bus.
//!
//! Every published message is `[alert-type tag byte][alert payload as compact
//! JSON]`. Subscribers filter by the leading topic byte; delivery is FIFO per
//! subscriber, and one slow subscriber never stalls the others.

use chainwatch_types::error::MessagingError;
use chainwatch_types::{Alert, AlertType};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Per-subscriber delivery queue depth.
const SUBSCRIBER_QUEUE: usize = 256;

/// Encodes an alert into its bus frame.
pub fn encode_alert(alert: &Alert) -> Result<Vec<u8>, MessagingError> {
    let payload =
        serde_json::to_vec(alert).map_err(|e| MessagingError::Encode(e.to_string()))?;
    let mut frame = Vec::with_capacity(1 + payload.len());
    frame.push(alert.alert_type().tag());
    frame.extend_from_slice(&payload);
    Ok(frame)
}

/// Decodes a bus frame back into an alert, verifying that the topic byte
/// matches the payload.
pub fn decode_alert(frame: &[u8]) -> Result<Alert, MessagingError> {
    let (&tag, payload) = frame
        .split_first()
        .ok_or_else(|| MessagingError::Decode("empty frame".to_string()))?;
    let alert_type = AlertType::from_tag(tag)
        .ok_or_else(|| MessagingError::Decode(format!("unknown alert tag {tag}")))?;
    let alert: Alert =
        serde_json::from_slice(payload).map_err(|e| MessagingError::Decode(e.to_string()))?;
    if alert.alert_type() != alert_type {
        return Err(MessagingError::Decode(format!(
            "topic byte {tag} does not match payload type {:?}",
            alert.alert_type()
        )));
    }
    Ok(alert)
}

struct Subscriber {
    /// Topic bytes this subscriber wants; `None` subscribes to everything.
    filter: Option<HashSet<u8>>,
    sender: mpsc::Sender<Vec<u8>>,
}

/// Fans alert frames out to subscribers.
#[derive(Default)]
pub struct AlertBroker {
    subscribers: Mutex<Vec<Subscriber>>,
}

impl AlertBroker {
    /// Creates a broker with no subscribers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes to the given alert types. The returned receiver yields
    /// encoded frames in publication order.
    pub fn subscribe(
        &self,
        types: impl IntoIterator<Item = AlertType>,
    ) -> mpsc::Receiver<Vec<u8>> {
        let filter: HashSet<u8> = types.into_iter().map(AlertType::tag).collect();
        self.register(Some(filter))
    }

    /// Subscribes to every alert type.
    pub fn subscribe_all(&self) -> mpsc::Receiver<Vec<u8>> {
        self.register(None)
    }

    fn register(&self, filter: Option<HashSet<u8>>) -> mpsc::Receiver<Vec<u8>> {
        let (sender, receiver) = mpsc::channel(SUBSCRIBER_QUEUE);
        let mut subscribers = self.lock();
        subscribers.push(Subscriber { filter, sender });
        receiver
    }

    /// Publishes one alert to every matching subscriber. Subscribers that
    /// went away are forgotten; a subscriber with a full queue loses this
    /// frame rather than stalling the bus.
    pub fn publish(&self, alert: &Alert) -> Result<(), MessagingError> {
        let frame = encode_alert(alert)?;
        let tag = frame[0];
        let mut subscribers = self.lock();
        subscribers.retain(|subscriber| {
            let wanted = subscriber
                .filter
                .as_ref()
                .map_or(true, |filter| filter.contains(&tag));
            if !wanted {
                return true;
            }
            match subscriber.sender.try_send(frame.clone()) {
                Ok(()) => true,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    tracing::warn!(
                        target = "messaging",
                        tag,
                        "subscriber queue full, dropping alert frame"
                    );
                    true
                }
                Err(mpsc::error::TrySendError::Closed(_)) => false,
            }
        });
        Ok(())
    }

    /// Spawns the publisher task: it drains the analyzer's alert stream into
    /// the bus until the stream closes.
    pub fn run(self: Arc<Self>, mut alerts: mpsc::Receiver<Alert>) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(alert) = alerts.recv().await {
                tracing::info!(target = "messaging", alert = %alert, "publishing alert");
                match self.publish(&alert) {
                    Ok(()) => chainwatch_telemetry::inc_alerts_sent(alert.alert_type().name()),
                    Err(error) => {
                        tracing::error!(target = "messaging", %error, "failed to publish alert");
                    }
                }
            }
            tracing::info!(target = "messaging", "alert stream closed, bus stopping");
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Subscriber>> {
        self.subscribers.lock().unwrap_or_else(|p| p.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chainwatch_types::UnreachableAlert;

    fn unreachable(node: &str) -> Alert {
        Alert::Unreachable(UnreachableAlert {
            ts: 1700000000,
            node: node.to_string(),
        })
    }

    #[test]
    fn test_frame_round_trip() {
        let alert = unreachable("https://n1.example.com");
        let frame = encode_alert(&alert).unwrap();
        assert_eq!(frame[0], AlertType::Unreachable.tag());
        let back = decode_alert(&frame).unwrap();
        assert_eq!(back, alert);
    }

    #[test]
    fn test_decode_rejects_bad_frames() {
        assert!(matches!(
            decode_alert(&[]).unwrap_err(),
            MessagingError::Decode(_)
        ));
        assert!(matches!(
            decode_alert(&[99, b'{', b'}']).unwrap_err(),
            MessagingError::Decode(_)
        ));
        // Valid payload under the wrong topic byte.
        let mut frame = encode_alert(&unreachable("a")).unwrap();
        frame[0] = AlertType::Height.tag();
        assert!(matches!(
            decode_alert(&frame).unwrap_err(),
            MessagingError::Decode(_)
        ));
    }

    #[tokio::test]
    async fn test_subscribers_filter_by_type() {
        let broker = AlertBroker::new();
        let mut unreachable_only = broker.subscribe([AlertType::Unreachable]);
        let mut everything = broker.subscribe_all();

        let alert = unreachable("a");
        let fixed = Alert::Fixed(Box::new(unreachable("a")));
        broker.publish(&alert).unwrap();
        broker.publish(&fixed).unwrap();

        // The filtered subscriber sees only its topic.
        let frame = unreachable_only.recv().await.unwrap();
        assert_eq!(frame[0], AlertType::Unreachable.tag());
        assert!(unreachable_only.try_recv().is_err());

        // The firehose subscriber sees both, in publication order.
        assert_eq!(everything.recv().await.unwrap()[0], AlertType::Unreachable.tag());
        assert_eq!(everything.recv().await.unwrap()[0], AlertType::Fixed.tag());
    }

    #[tokio::test]
    async fn test_dropped_subscribers_are_forgotten() {
        let broker = AlertBroker::new();
        let receiver = broker.subscribe_all();
        drop(receiver);
        broker.publish(&unreachable("a")).unwrap();
        assert!(broker.lock().is_empty());
    }
}
