//! Best-effort publish/subscribe between engine instances.
//!
//! Each reminder kind has its own topic. Every port opened on the same topic
//! is a peer: it sees what the others publish, never its own messages, and
//! nothing guarantees order or delivery. A hub made with [`SyncHub::new`]
//! only reaches ports in the same process; one made with `SyncHub::bind`
//! also reaches every other hub bound to the same directory.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc};

#[cfg(unix)]
mod socket;

/// Directory under the storage directory where bound hubs find each other.
pub const SYNC_SUBDIRECTORY: &str = "sync";

const TOPIC_CAPACITY: usize = 64;
const REMOTE_ORIGIN: u64 = u64::MAX;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum BroadcastMessage {
    #[serde(rename = "sync-enabled")]
    SyncEnabled { enabled: bool },

    #[serde(rename = "sync-next", rename_all = "camelCase")]
    SyncNext { next_trigger_at: Option<DateTime<Utc>> },
}

#[derive(Debug, Clone)]
struct SyncEnvelope {
    origin: u64,
    message: BroadcastMessage,
}

/// A message leaving this process.
#[cfg_attr(not(unix), allow(dead_code))]
#[derive(Debug)]
struct Outbound {
    topic: String,
    message: BroadcastMessage,
}

#[derive(Default)]
pub struct SyncHub {
    topics: Mutex<HashMap<String, broadcast::Sender<SyncEnvelope>>>,
    next_origin: AtomicU64,
    outbound: Option<mpsc::UnboundedSender<Outbound>>,
}

impl SyncHub {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    #[cfg_attr(not(unix), allow(dead_code))]
    fn with_outbound(outbound: mpsc::UnboundedSender<Outbound>) -> Self {
        Self {
            outbound: Some(outbound),
            ..Self::default()
        }
    }

    /// Joins `topic` as a new peer.
    pub fn open(&self, topic: &str) -> (SyncPublisher, SyncSubscriber) {
        let origin = self.next_origin.fetch_add(1, Ordering::Relaxed);
        let sender = self.sender(topic);
        let receiver = sender.subscribe();

        log::debug!("Opened sync port [topic = {}, origin = {}]", topic, origin);

        (
            SyncPublisher {
                origin,
                topic: topic.to_owned(),
                sender,
                outbound: self.outbound.clone(),
            },
            SyncSubscriber { origin, receiver },
        )
    }

    /// Hands a message from another process to every local port on `topic`.
    #[cfg_attr(not(unix), allow(dead_code))]
    fn deliver(&self, topic: &str, message: BroadcastMessage) {
        let _ = self.sender(topic).send(SyncEnvelope {
            origin: REMOTE_ORIGIN,
            message,
        });
    }

    fn sender(&self, topic: &str) -> broadcast::Sender<SyncEnvelope> {
        let mut topics = self
            .topics
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        topics
            .entry(topic.to_owned())
            .or_insert_with(|| broadcast::channel(TOPIC_CAPACITY).0)
            .clone()
    }
}

#[derive(Clone)]
pub struct SyncPublisher {
    origin: u64,
    topic: String,
    sender: broadcast::Sender<SyncEnvelope>,
    outbound: Option<mpsc::UnboundedSender<Outbound>>,
}

impl SyncPublisher {
    /// Fire and forget. Having no peers is not an error.
    pub fn publish(&self, message: BroadcastMessage) {
        log::debug!(
            "Publishing sync message [topic = {}, origin = {}, message = {:?}]",
            self.topic,
            self.origin,
            message
        );
        if let Some(outbound) = &self.outbound {
            let _ = outbound.send(Outbound {
                topic: self.topic.clone(),
                message: message.clone(),
            });
        }
        let _ = self.sender.send(SyncEnvelope {
            origin: self.origin,
            message,
        });
    }
}

pub struct SyncSubscriber {
    origin: u64,
    receiver: broadcast::Receiver<SyncEnvelope>,
}

impl SyncSubscriber {
    /// Next message from a peer, or `None` once the topic is gone.
    pub async fn recv(&mut self) -> Option<BroadcastMessage> {
        loop {
            match self.receiver.recv().await {
                Ok(envelope) if envelope.origin == self.origin => continue,
                Ok(envelope) => return Some(envelope.message),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    log::warn!("Dropped {} sync messages from a slow subscriber", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use serde_json::json;

    use super::*;

    #[test]
    fn messages_have_the_wire_shape() {
        let enabled =
            serde_json::to_value(BroadcastMessage::SyncEnabled { enabled: true }).unwrap();
        assert_eq!(enabled, json!({ "type": "sync-enabled", "enabled": true }));

        let at = Utc.with_ymd_and_hms(2025, 6, 2, 9, 0, 0).unwrap();
        let next = serde_json::to_value(BroadcastMessage::SyncNext {
            next_trigger_at: Some(at),
        })
        .unwrap();
        assert_eq!(
            next,
            json!({ "type": "sync-next", "nextTriggerAt": "2025-06-02T09:00:00Z" })
        );

        let cleared = serde_json::to_value(BroadcastMessage::SyncNext {
            next_trigger_at: None,
        })
        .unwrap();
        assert_eq!(cleared, json!({ "type": "sync-next", "nextTriggerAt": null }));
    }

    #[tokio::test]
    async fn peers_receive_but_publisher_does_not() {
        let hub = SyncHub::new();
        let (first_tx, mut first_rx) = hub.open("hydration");
        let (_second_tx, mut second_rx) = hub.open("hydration");

        first_tx.publish(BroadcastMessage::SyncEnabled { enabled: true });
        first_tx.publish(BroadcastMessage::SyncEnabled { enabled: false });

        assert_eq!(
            second_rx.recv().await,
            Some(BroadcastMessage::SyncEnabled { enabled: true })
        );
        assert_eq!(
            second_rx.recv().await,
            Some(BroadcastMessage::SyncEnabled { enabled: false })
        );
        assert!(first_rx.receiver.try_recv().is_ok());
        assert!(
            tokio::time::timeout(std::time::Duration::from_millis(10), first_rx.recv())
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn topics_are_isolated() {
        let hub = SyncHub::new();
        let (hydration_tx, _hydration_rx) = hub.open("hydration");
        let (_vitamin_tx, mut vitamin_rx) = hub.open("vitamin-d");

        hydration_tx.publish(BroadcastMessage::SyncEnabled { enabled: true });

        assert!(vitamin_rx.receiver.try_recv().is_err());
    }
}
