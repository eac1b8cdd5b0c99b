//! In-process channel pair.
//!
//! Each end is a [`Channel`]; whatever one end sends, the other receives.
//! Dropping one end disconnects the other.

use super::{Channel, Frames};
use crate::{Result, ServiceError};
use tokio::sync::{mpsc, Mutex};

/// One end of an in-memory duplex pair.
#[derive(Debug)]
pub struct MemoryChannel {
    identity: String,
    endpoint: String,
    outbound: mpsc::UnboundedSender<Frames>,
    inbound: Mutex<mpsc::UnboundedReceiver<Frames>>,
}

/// Create a connected pair. `left` is bound to `left_identity` and reports
/// `memory://<right_identity>` as its endpoint, and vice versa.
pub fn memory_pair(
    left_identity: impl Into<String>,
    right_identity: impl Into<String>,
) -> (MemoryChannel, MemoryChannel) {
    let left_identity = left_identity.into();
    let right_identity = right_identity.into();
    let (left_tx, right_rx) = mpsc::unbounded_channel();
    let (right_tx, left_rx) = mpsc::unbounded_channel();

    let left = MemoryChannel {
        endpoint: format!("memory://{}", right_identity),
        identity: left_identity.clone(),
        outbound: left_tx,
        inbound: Mutex::new(left_rx),
    };
    let right = MemoryChannel {
        endpoint: format!("memory://{}", left_identity),
        identity: right_identity,
        outbound: right_tx,
        inbound: Mutex::new(right_rx),
    };
    (left, right)
}

impl MemoryChannel {
    /// Receive without waiting. `None` when nothing is queued.
    pub fn try_receive(&self) -> Option<Frames> {
        self.inbound.try_lock().ok()?.try_recv().ok()
    }
}

#[async_trait::async_trait]
impl Channel for MemoryChannel {
    async fn connect(&self) -> Result<()> {
        // Pairs are born connected
        Ok(())
    }

    async fn send(&self, headers: Vec<u8>, body: Vec<u8>) -> Result<()> {
        self.outbound
            .send((headers, body))
            .map_err(|_| ServiceError::transport_msg(&self.endpoint, "peer end dropped"))
    }

    async fn receive(&self) -> Result<Frames> {
        self.inbound
            .lock()
            .await
            .recv()
            .await
            .ok_or_else(|| ServiceError::transport_msg(&self.endpoint, "peer end dropped"))
    }

    fn identity(&self) -> &str {
        &self.identity
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_pair_is_duplex() {
        let (service, broker) = memory_pair("svc1", "sm");

        service.send(b"h1".to_vec(), b"b1".to_vec()).await.unwrap();
        broker.send(b"h2".to_vec(), b"b2".to_vec()).await.unwrap();

        assert_eq!(broker.receive().await.unwrap(), (b"h1".to_vec(), b"b1".to_vec()));
        assert_eq!(service.receive().await.unwrap(), (b"h2".to_vec(), b"b2".to_vec()));
        assert_eq!(service.identity(), "svc1");
        assert_eq!(service.endpoint(), "memory://sm");
    }

    #[tokio::test]
    async fn test_dropped_peer_disconnects() {
        let (service, broker) = memory_pair("svc1", "sm");
        drop(broker);

        assert!(matches!(
            service.receive().await,
            Err(ServiceError::Transport { .. })
        ));
        assert!(service.send(Vec::new(), Vec::new()).await.is_err());
    }

    #[tokio::test]
    async fn test_try_receive_empty() {
        let (service, _broker) = memory_pair("svc1", "sm");
        assert!(service.try_receive().is_none());
    }
}
