//! Identity-addressed duplex channels carrying two-frame messages.
//!
//! # Architecture
//!
//! - **Channel**: the trait the runtime talks to (connect/send/receive)
//! - **TcpChannel**: TCP socket with length-prefixed frames and an identity greeting
//! - **MemoryChannel**: in-process pair, used to embed a broker or drive tests
//! - **framing**: shared wire framing used by the TCP channel and by brokers

pub mod framing;
pub mod memory;
pub mod tcp;

pub use memory::{memory_pair, MemoryChannel};
pub use tcp::TcpChannel;

use crate::codec::Message;
use crate::Result;

/// One logical message on the wire: (headers frame, body frame).
pub type Frames = (Vec<u8>, Vec<u8>);

/// Asynchronous duplex channel bound to a service identity and an endpoint.
///
/// Implementations must keep the two frames of one `send` together: no other
/// message may be interleaved between them, even with concurrent senders.
/// Sending and receiving are serialized independently so a pending `receive`
/// never blocks a heartbeat `send`.
#[async_trait::async_trait]
pub trait Channel: Send + Sync + 'static {
    /// Establish the connection. Calling it again on a connected channel is a no-op.
    async fn connect(&self) -> Result<()>;

    /// Transmit a two-frame message as one unit.
    async fn send(&self, headers: Vec<u8>, body: Vec<u8>) -> Result<()>;

    /// Wait for the next two-frame message.
    async fn receive(&self) -> Result<Frames>;

    /// Identity this channel is bound to.
    fn identity(&self) -> &str;

    /// Remote endpoint description, used in errors and logs.
    fn endpoint(&self) -> &str;
}

/// Encode and send a message on any channel.
pub async fn send_message(channel: &dyn Channel, message: &Message) -> Result<()> {
    let (headers, body) = message.encode()?;
    channel.send(headers, body).await
}
