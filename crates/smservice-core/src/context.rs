//! Shared handles passed to every action handler.

use crate::codec::Message;
use crate::identity::ServiceIdentity;
use crate::registration::{Registration, RegistrationState};
use crate::transport::{send_message, Channel};
use crate::Result;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// What a handler can see and do while it runs.
///
/// Cheap to clone: every field is reference-counted.
#[derive(Clone)]
pub struct ActionContext {
    identity: Arc<ServiceIdentity>,
    registration: Registration,
    control: Arc<dyn Channel>,
    peer: Arc<dyn Channel>,
}

impl ActionContext {
    pub fn new(
        identity: Arc<ServiceIdentity>,
        registration: Registration,
        control: Arc<dyn Channel>,
        peer: Arc<dyn Channel>,
    ) -> Self {
        Self {
            identity,
            registration,
            control,
            peer,
        }
    }

    pub fn identity(&self) -> &ServiceIdentity {
        &self.identity
    }

    pub fn registration(&self) -> &Registration {
        &self.registration
    }

    pub fn registration_state(&self) -> RegistrationState {
        self.registration.state()
    }

    pub fn control(&self) -> &Arc<dyn Channel> {
        &self.control
    }

    pub fn peer(&self) -> &Arc<dyn Channel> {
        &self.peer
    }

    /// Invoke another service's action through the SM relay.
    ///
    /// Sends `{"service": target, "reply_to": <own name>}` with `body` on the
    /// peer channel and returns as soon as the message is written. A reply, if
    /// the target sends one, arrives later on the control channel as an
    /// ordinary dispatched message.
    pub async fn execute(&self, target: &str, body: Value) -> Result<()> {
        debug!("Peer call to '{}' from '{}'", target, self.identity.name());
        let message = Message::peer_call(target, self.identity.name(), body);
        send_message(self.peer.as_ref(), &message).await
    }

    /// Send an arbitrary message to the SM on the control channel.
    pub async fn send_control(&self, message: &Message) -> Result<()> {
        send_message(self.control.as_ref(), message).await
    }
}

impl std::fmt::Debug for ActionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionContext")
            .field("identity", &self.identity.name())
            .field("registration", &self.registration.state())
            .field("control", &self.control.endpoint())
            .field("peer", &self.peer.endpoint())
            .finish()
    }
}
