//! Same-machine transport for [`SyncHub`].
//!
//! Every hub bound to a directory owns one datagram socket in it. Publishing
//! sends the message to every other socket found there; a socket nobody
//! listens on any more is removed by the first peer that trips over it.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tokio::net::UnixDatagram;
use tokio::sync::mpsc;

use super::{BroadcastMessage, Outbound, SyncHub};

const SOCKET_EXTENSION: &str = "sock";
const MAX_DATAGRAM_SIZE: usize = 16 * 1024;

static NEXT_BOUND_HUB: AtomicU64 = AtomicU64::new(0);

/// One datagram. The payload is the broadcast message unchanged; sender and
/// topic travel beside it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireEnvelope {
    origin: String,
    topic: String,
    payload: BroadcastMessage,
}

impl SyncHub {
    /// Hub whose peers include every other hub bound to `directory`, in this
    /// process or any other.
    pub async fn bind(directory: &Path) -> anyhow::Result<Arc<Self>> {
        tokio::fs::create_dir_all(directory)
            .await
            .with_context(|| format!("Failed to create sync directory: {:?}", directory))?;

        let origin = format!(
            "{}-{}",
            std::process::id(),
            NEXT_BOUND_HUB.fetch_add(1, Ordering::Relaxed)
        );
        let socket_path = directory.join(format!("{origin}.{SOCKET_EXTENSION}"));
        if socket_path.exists() {
            tokio::fs::remove_file(&socket_path)
                .await
                .with_context(|| format!("Failed to remove existing socket: {:?}", socket_path))?;
        }
        let socket = UnixDatagram::bind(&socket_path)
            .with_context(|| format!("Failed to bind sync socket: {:?}", socket_path))?;

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let hub = Arc::new(SyncHub::with_outbound(outbound_tx));

        log::info!("Bound sync socket [path = {}]", socket_path.display());

        let transport = SocketTransport {
            origin,
            directory: directory.to_owned(),
            socket_path,
            socket,
            hub: Arc::downgrade(&hub),
        };
        tokio::spawn(transport.run(outbound_rx));

        Ok(hub)
    }
}

struct SocketTransport {
    origin: String,
    directory: PathBuf,
    socket_path: PathBuf,
    socket: UnixDatagram,
    hub: Weak<SyncHub>,
}

impl SocketTransport {
    /// Runs until the hub and every publisher opened on it are gone.
    async fn run(self, mut outbound: mpsc::UnboundedReceiver<Outbound>) {
        let mut buffer = vec![0u8; MAX_DATAGRAM_SIZE];

        loop {
            tokio::select! {
                received = self.socket.recv(&mut buffer) => match received {
                    Ok(len) => self.receive(&buffer[..len]),
                    Err(error) => {
                        log::error!(
                            "Sync socket failed, peers will no longer be heard [path = {}, error = {}]",
                            self.socket_path.display(),
                            error
                        );
                        break;
                    }
                },
                message = outbound.recv() => match message {
                    Some(message) => self.send(message).await,
                    None => break,
                },
            }
        }

        log::debug!("Closed sync socket [path = {}]", self.socket_path.display());
    }

    fn receive(&self, datagram: &[u8]) {
        let envelope: WireEnvelope = match serde_json::from_slice(datagram) {
            Ok(envelope) => envelope,
            Err(error) => {
                log::warn!("Ignoring malformed sync datagram [error = {}]", error);
                return;
            }
        };

        if envelope.origin == self.origin {
            return;
        }

        log::debug!(
            "Received sync message [topic = {}, origin = {}, message = {:?}]",
            envelope.topic,
            envelope.origin,
            envelope.payload
        );
        if let Some(hub) = self.hub.upgrade() {
            hub.deliver(&envelope.topic, envelope.payload);
        }
    }

    async fn send(&self, outbound: Outbound) {
        let envelope = WireEnvelope {
            origin: self.origin.clone(),
            topic: outbound.topic,
            payload: outbound.message,
        };
        let datagram = match serde_json::to_vec(&envelope) {
            Ok(datagram) => datagram,
            Err(error) => {
                log::error!("Failed to encode sync message [error = {}]", error);
                return;
            }
        };

        for peer in self.peers().await {
            match self.socket.try_send_to(&datagram, &peer) {
                Ok(_) => {}
                Err(error)
                    if matches!(error.kind(), ErrorKind::ConnectionRefused | ErrorKind::NotFound) =>
                {
                    log::debug!("Removing stale sync socket [path = {}]", peer.display());
                    let _ = tokio::fs::remove_file(&peer).await;
                }
                Err(error) => {
                    log::warn!(
                        "Dropped sync message for peer [path = {}, error = {}]",
                        peer.display(),
                        error
                    );
                }
            }
        }
    }

    async fn peers(&self) -> Vec<PathBuf> {
        let mut peers = Vec::new();
        let mut entries = match tokio::fs::read_dir(&self.directory).await {
            Ok(entries) => entries,
            Err(error) => {
                log::warn!(
                    "Cannot list sync peers [directory = {}, error = {}]",
                    self.directory.display(),
                    error
                );
                return peers;
            }
        };

        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            if path != self.socket_path
                && path.extension().is_some_and(|ext| ext == SOCKET_EXTENSION)
            {
                peers.push(path);
            }
        }

        peers
    }
}

impl Drop for SocketTransport {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.socket_path);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::*;

    const PATIENCE: Duration = Duration::from_secs(2);

    fn sockets_in(directory: &Path) -> Vec<PathBuf> {
        std::fs::read_dir(directory)
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .filter(|path| path.extension().is_some_and(|ext| ext == SOCKET_EXTENSION))
            .collect()
    }

    async fn until(check: impl Fn() -> bool) {
        tokio::time::timeout(PATIENCE, async {
            while !check() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
    }

    #[test]
    fn datagrams_carry_the_broadcast_payload() {
        let envelope = WireEnvelope {
            origin: "42-0".to_owned(),
            topic: "hydration-sync".to_owned(),
            payload: BroadcastMessage::SyncEnabled { enabled: true },
        };

        assert_eq!(
            serde_json::to_value(&envelope).unwrap(),
            json!({
                "origin": "42-0",
                "topic": "hydration-sync",
                "payload": { "type": "sync-enabled", "enabled": true }
            })
        );
    }

    #[tokio::test]
    async fn hubs_bound_to_one_directory_are_peers() {
        let directory = tempfile::tempdir().unwrap();
        let first = SyncHub::bind(directory.path()).await.unwrap();
        let second = SyncHub::bind(directory.path()).await.unwrap();

        let (first_tx, mut first_rx) = first.open("hydration");
        let (_sibling_tx, mut sibling_rx) = first.open("hydration");
        let (_second_tx, mut second_rx) = second.open("hydration");
        let (_other_tx, mut other_rx) = second.open("vitamin-d");

        first_tx.publish(BroadcastMessage::SyncEnabled { enabled: true });

        let received = tokio::time::timeout(PATIENCE, second_rx.recv()).await.unwrap();
        assert_eq!(received, Some(BroadcastMessage::SyncEnabled { enabled: true }));

        // Local peers get exactly one copy and the publisher none.
        assert_eq!(
            sibling_rx.recv().await,
            Some(BroadcastMessage::SyncEnabled { enabled: true })
        );
        let short = Duration::from_millis(50);
        assert!(tokio::time::timeout(short, sibling_rx.recv()).await.is_err());
        assert!(tokio::time::timeout(short, first_rx.recv()).await.is_err());
        assert!(tokio::time::timeout(short, other_rx.recv()).await.is_err());
    }

    #[tokio::test]
    async fn malformed_datagrams_are_ignored() {
        let directory = tempfile::tempdir().unwrap();
        let hub = SyncHub::bind(directory.path()).await.unwrap();
        let (_tx, mut rx) = hub.open("hydration");
        let target = sockets_in(directory.path()).remove(0);

        let stranger = UnixDatagram::unbound().unwrap();
        stranger.send_to(b"not json", &target).await.unwrap();
        let valid = json!({
            "origin": "stranger",
            "topic": "hydration",
            "payload": { "type": "sync-next", "nextTriggerAt": null }
        });
        stranger
            .send_to(valid.to_string().as_bytes(), &target)
            .await
            .unwrap();

        let received = tokio::time::timeout(PATIENCE, rx.recv()).await.unwrap();
        assert_eq!(
            received,
            Some(BroadcastMessage::SyncNext {
                next_trigger_at: None
            })
        );
    }

    #[tokio::test]
    async fn stale_sockets_are_removed_on_publish() {
        let directory = tempfile::tempdir().unwrap();
        let ghost = directory.path().join("gone.sock");
        drop(std::os::unix::net::UnixDatagram::bind(&ghost).unwrap());
        assert!(ghost.exists());

        let hub = SyncHub::bind(directory.path()).await.unwrap();
        let (tx, _rx) = hub.open("hydration");
        tx.publish(BroadcastMessage::SyncEnabled { enabled: false });

        until(|| !ghost.exists()).await;
    }

    #[tokio::test]
    async fn socket_is_removed_once_the_hub_is_gone() {
        let directory = tempfile::tempdir().unwrap();
        let hub = SyncHub::bind(directory.path()).await.unwrap();
        assert_eq!(sockets_in(directory.path()).len(), 1);

        drop(hub);

        until(|| sockets_in(directory.path()).is_empty()).await;
    }
}
