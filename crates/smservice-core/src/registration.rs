//! Registration with the Service Manager.
//!
//! [`Registration`] is the one piece of mutable state shared between tasks:
//! the registration loop and the `register` built-in write it, the keep-alive
//! loop reads it. It only ever moves forward:
//!
//! ```text
//! Unregistered -> Registering -> Registered
//! ```

use crate::codec::Message;
use crate::config::RegisterTimeout;
use crate::context::ActionContext;
use crate::dispatch::ActionDispatcher;
use crate::{Result, ServiceError};
use serde_json::json;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Registration progress of one runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RegistrationState {
    Unregistered = 0,
    Registering = 1,
    Registered = 2,
}

impl RegistrationState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => RegistrationState::Unregistered,
            1 => RegistrationState::Registering,
            _ => RegistrationState::Registered,
        }
    }
}

/// Shared, atomically updated registration state.
///
/// Clones observe the same state.
#[derive(Debug, Clone, Default)]
pub struct Registration {
    state: Arc<AtomicU8>,
}

impl Registration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> RegistrationState {
        RegistrationState::from_u8(self.state.load(Ordering::SeqCst))
    }

    pub fn is_registered(&self) -> bool {
        self.state() == RegistrationState::Registered
    }

    /// Move Unregistered → Registering. Returns `false` if already past that point.
    pub fn begin(&self) -> bool {
        self.state
            .compare_exchange(
                RegistrationState::Unregistered as u8,
                RegistrationState::Registering as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_ok()
    }

    /// Mark the service as registered.
    pub fn confirm(&self) {
        self.state
            .store(RegistrationState::Registered as u8, Ordering::SeqCst);
    }

    /// Overwrite the state. Tests use this to simulate leaving `Registered`.
    #[cfg(test)]
    pub(crate) fn force(&self, state: RegistrationState) {
        self.state.store(state as u8, Ordering::SeqCst);
    }
}

/// Build the REGISTER request advertising every action of the identity.
pub fn register_request(ctx: &ActionContext) -> Message {
    let services: Vec<&str> = ctx.identity().actions().collect();
    Message::control("REGISTER", json!({ "services": services }))
}

/// Register with the SM, retrying until it confirms.
///
/// Each attempt sends REGISTER and then performs exactly one receive +
/// dispatch cycle on the control channel; whatever arrives is dispatched,
/// confirmation or not. Between unconfirmed attempts the loop sleeps
/// `retry_interval`.
///
/// A finite `timeout` bounds the whole loop but cannot interrupt a pending
/// receive; it is checked between attempts. On timeout the state stays
/// `Registering`.
///
/// Returns the number of REGISTER requests sent (0 if already registered).
pub async fn register(
    ctx: &ActionContext,
    dispatcher: &ActionDispatcher,
    retry_interval: Duration,
    timeout: RegisterTimeout,
) -> Result<u32> {
    let registration = ctx.registration();
    if registration.is_registered() {
        debug!("'{}' already registered", ctx.identity().name());
        return Ok(0);
    }
    registration.begin();

    let request = register_request(ctx);
    let started = Instant::now();
    let mut attempts = 0u32;

    loop {
        if let RegisterTimeout::Within(limit) = timeout {
            if started.elapsed() >= limit {
                warn!(
                    "Registration of '{}' not confirmed after {} attempts",
                    ctx.identity().name(),
                    attempts
                );
                return Err(ServiceError::RegistrationTimeout(limit));
            }
        }

        attempts += 1;
        info!(
            "SM request. Action: \"REGISTER\", message: {} (attempt {})",
            request.body, attempts
        );
        ctx.send_control(&request).await?;
        dispatcher.receive_and_dispatch(ctx).await?;

        if registration.is_registered() {
            info!(
                "'{}' registered with {} after {} attempts",
                ctx.identity().name(),
                ctx.control().endpoint(),
                attempts
            );
            return Ok(attempts);
        }

        let delay = match timeout {
            RegisterTimeout::Infinite => retry_interval,
            RegisterTimeout::Within(limit) => {
                retry_interval.min(limit.saturating_sub(started.elapsed()))
            }
        };
        debug!("Not registered, retrying in {:?}", delay);
        tokio::time::sleep(delay).await;
    }
}
