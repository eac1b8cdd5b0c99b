//! TCP channel to a Service Manager endpoint.
//!
//! Connects to `tcp://host:port`, announces its identity in a greeting frame,
//! then exchanges two-frame messages.
//!
//! # Thread Safety
//!
//! The read and write halves sit behind separate tokio `Mutex`es. Concurrent
//! senders queue on the write lock, and each message is written with a single
//! `write_all`, so frames of different messages never interleave. A task
//! parked in `receive` holds only the read lock.

use super::framing::{read_message, write_frame, write_message};
use super::{Channel, Frames};
use crate::config::TransportConfig;
use crate::{Result, ServiceError};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::debug;

/// TCP implementation of [`Channel`].
#[derive(Debug)]
pub struct TcpChannel {
    identity: String,
    endpoint: String,
    reader: Mutex<Option<OwnedReadHalf>>,
    writer: Mutex<Option<OwnedWriteHalf>>,
}

impl TcpChannel {
    /// Create an unconnected channel. Nothing touches the network until `connect`.
    pub fn new(endpoint: impl Into<String>, identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            endpoint: endpoint.into(),
            reader: Mutex::new(None),
            writer: Mutex::new(None),
        }
    }

    /// Strip the `tcp://` scheme. Other schemes are not supported over TCP.
    fn socket_addr(&self) -> Result<&str> {
        if let Some(addr) = self.endpoint.strip_prefix(TransportConfig::TCP_SCHEME) {
            return Ok(addr);
        }
        if self.endpoint.contains("://") {
            return Err(ServiceError::transport_msg(
                &self.endpoint,
                "unsupported endpoint scheme",
            ));
        }
        Ok(&self.endpoint)
    }

    fn not_connected(&self) -> ServiceError {
        ServiceError::transport_msg(&self.endpoint, "channel is not connected")
    }
}

#[async_trait::async_trait]
impl Channel for TcpChannel {
    async fn connect(&self) -> Result<()> {
        // Writer lock doubles as the connect lock
        let mut writer = self.writer.lock().await;
        if writer.is_some() {
            return Ok(());
        }

        let addr = self.socket_addr()?;
        let stream = tokio::time::timeout(TransportConfig::CONNECT_TIMEOUT, TcpStream::connect(addr))
            .await
            .map_err(|_| ServiceError::transport_msg(&self.endpoint, "connect timed out"))?
            .map_err(|e| ServiceError::transport(&self.endpoint, e))?;
        stream
            .set_nodelay(true)
            .map_err(|e| ServiceError::transport(&self.endpoint, e))?;

        let (read_half, mut write_half) = stream.into_split();
        write_frame(&mut write_half, self.identity.as_bytes(), &self.endpoint).await?;

        *self.reader.lock().await = Some(read_half);
        *writer = Some(write_half);

        debug!("Channel '{}' connected to {}", self.identity, self.endpoint);
        Ok(())
    }

    async fn send(&self, headers: Vec<u8>, body: Vec<u8>) -> Result<()> {
        let mut guard = self.writer.lock().await;
        let writer = guard.as_mut().ok_or_else(|| self.not_connected())?;
        write_message(writer, &headers, &body, &self.endpoint).await
    }

    async fn receive(&self) -> Result<Frames> {
        let mut guard = self.reader.lock().await;
        let reader = guard.as_mut().ok_or_else(|| self.not_connected())?;
        read_message(reader, &self.endpoint).await
    }

    fn identity(&self) -> &str {
        &self.identity
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }
}
