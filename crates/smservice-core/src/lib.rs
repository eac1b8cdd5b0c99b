//! SMService Core - client runtime for services attached to a Service Manager.
//!
//! A service connects to the Service Manager (SM) over two channels: the
//! control channel for registration, heartbeats and inbound requests, and the
//! peer channel for calling other services through the SM relay. Every message
//! is two MessagePack frames, headers then body.
//!
//! # Example
//!
//! ```rust,ignore
//! use smservice_core::{ServiceIdentity, ServiceManagerConfig, ServiceRuntime};
//!
//! #[tokio::main]
//! async fn main() -> smservice_core::Result<()> {
//!     let identity = ServiceIdentity::new("dummy", ["someaction"])?;
//!     let runtime = ServiceRuntime::builder(identity)
//!         .handler_fn("someaction", |_ctx, headers, body| {
//!             tracing::info!("someaction: {:?} {}", headers, body);
//!             Ok(())
//!         })
//!         .connect_tcp(
//!             ServiceManagerConfig::CONTROL_ENDPOINT,
//!             ServiceManagerConfig::PEER_ENDPOINT,
//!         );
//!
//!     // Connect, register, heartbeat, serve
//!     runtime.start().await
//! }
//! ```

pub mod codec;
pub mod config;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod identity;
pub mod keepalive;
pub mod registration;
pub mod runtime;
pub mod transport;

// Re-export commonly used types
pub use codec::{Headers, Message};
pub use config::{RegisterTimeout, RuntimeConfig, ServiceManagerConfig, TransportConfig};
pub use context::ActionContext;
pub use dispatch::{handler_fn, ActionDispatcher, ActionHandler, DispatchOutcome};
pub use error::{Result, ServiceError};
pub use identity::ServiceIdentity;
pub use keepalive::{KeepAlive, KeepAliveHandle};
pub use registration::{Registration, RegistrationState};
pub use runtime::{ServiceRuntime, ServiceRuntimeBuilder, ShutdownHandle};
pub use transport::{memory_pair, Channel, MemoryChannel, TcpChannel};
