//! Action dispatch table.
//!
//! Inbound messages are routed by `headers["action"]` (or `headers["service"]`
//! for relayed peer calls), lowercased, to the handler registered under that
//! name. Unmatched names take the explicit unknown branch: logged, reported in
//! [`DispatchOutcome`], never an error.

use crate::codec::{action_name, Headers, Message, ACTION_KEY};
use crate::context::ActionContext;
use crate::identity::PING_ACTION;
use crate::Result;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const REGISTER_ACTION: &str = "register";
pub const UPDATE_ACTION: &str = "update";

/// Business logic bound to one action name.
///
/// Handlers run inline on the receive loop: anything they send goes out
/// before the next message is read. An `Err` ends the loop that called them.
#[async_trait::async_trait]
pub trait ActionHandler: Send + Sync + 'static {
    async fn handle(&self, ctx: &ActionContext, headers: &Headers, body: &Value) -> Result<()>;
}

/// Adapter turning a synchronous closure into an [`ActionHandler`].
pub struct FnHandler<F>(F);

#[async_trait::async_trait]
impl<F> ActionHandler for FnHandler<F>
where
    F: Fn(&ActionContext, &Headers, &Value) -> Result<()> + Send + Sync + 'static,
{
    async fn handle(&self, ctx: &ActionContext, headers: &Headers, body: &Value) -> Result<()> {
        (self.0)(ctx, headers, body)
    }
}

/// Wrap a synchronous closure as a shareable handler.
pub fn handler_fn<F>(f: F) -> Arc<dyn ActionHandler>
where
    F: Fn(&ActionContext, &Headers, &Value) -> Result<()> + Send + Sync + 'static,
{
    Arc::new(FnHandler(f))
}

/// Result of routing one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// A handler ran for this (normalized) action.
    Handled(String),
    /// No handler matched. `None` when the headers carried no routing key.
    UnknownAction(Option<String>),
}

/// Confirms registration when the SM answers `REGISTER` with `result: OK`.
pub struct RegisterHandler;

#[async_trait::async_trait]
impl ActionHandler for RegisterHandler {
    async fn handle(&self, ctx: &ActionContext, headers: &Headers, body: &Value) -> Result<()> {
        // Routing is case-insensitive, confirmation is not.
        let is_register = headers.get(ACTION_KEY).and_then(Value::as_str) == Some("REGISTER");
        let accepted = body.get("result").and_then(Value::as_str) == Some("OK");

        if is_register && accepted {
            ctx.registration().confirm();
            info!(
                "Action: REGISTER (successful), headers: {:?}, message: {}",
                headers, body
            );
        } else {
            warn!(
                "Action: REGISTER (failure), headers: {:?}, message: {}",
                headers, body
            );
        }
        Ok(())
    }
}

/// Acknowledges a heartbeat confirmation.
pub struct UpdateHandler;

#[async_trait::async_trait]
impl ActionHandler for UpdateHandler {
    async fn handle(&self, _ctx: &ActionContext, _headers: &Headers, _body: &Value) -> Result<()> {
        info!("Action: UPDATE (successful)");
        Ok(())
    }
}

/// Health probe. Does nothing.
pub struct PingHandler;

#[async_trait::async_trait]
impl ActionHandler for PingHandler {
    async fn handle(&self, _ctx: &ActionContext, _headers: &Headers, _body: &Value) -> Result<()> {
        debug!("Action: PING");
        Ok(())
    }
}

/// Normalized action name → handler.
#[derive(Clone, Default)]
pub struct ActionDispatcher {
    handlers: HashMap<String, Arc<dyn ActionHandler>>,
}

impl ActionDispatcher {
    /// Empty table, no built-ins.
    pub fn new() -> Self {
        Self::default()
    }

    /// Table preloaded with the `register`, `update` and `ping` built-ins.
    pub fn with_builtins() -> Self {
        let mut dispatcher = Self::new();
        dispatcher.register(REGISTER_ACTION, Arc::new(RegisterHandler));
        dispatcher.register(UPDATE_ACTION, Arc::new(UpdateHandler));
        dispatcher.register(PING_ACTION, Arc::new(PingHandler));
        dispatcher
    }

    /// Bind `handler` to `name`, replacing any previous binding.
    pub fn register(&mut self, name: &str, handler: Arc<dyn ActionHandler>) {
        let name = name.to_lowercase();
        if self.handlers.insert(name.clone(), handler).is_some() {
            debug!("Handler for '{}' replaced", name);
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(&name.to_lowercase())
    }

    /// Registered action names, sorted.
    pub fn actions(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Route one decoded message to its handler and await it.
    pub async fn dispatch(
        &self,
        ctx: &ActionContext,
        headers: &Headers,
        body: &Value,
    ) -> Result<DispatchOutcome> {
        let Some(name) = action_name(headers) else {
            warn!("Unknown action: message has no action or service header: {:?}", headers);
            return Ok(DispatchOutcome::UnknownAction(None));
        };

        match self.handlers.get(&name) {
            Some(handler) => {
                handler.handle(ctx, headers, body).await?;
                Ok(DispatchOutcome::Handled(name))
            }
            None => {
                warn!("Unknown action '{}', headers: {:?}", name, headers);
                Ok(DispatchOutcome::UnknownAction(Some(name)))
            }
        }
    }

    /// One receive + decode + dispatch cycle on the control channel.
    ///
    /// Undecodable messages are dropped and yield `Ok(None)`. Transport and
    /// handler errors are returned.
    pub async fn receive_and_dispatch(&self, ctx: &ActionContext) -> Result<Option<DispatchOutcome>> {
        let (headers, body) = ctx.control().receive().await?;

        let message = match Message::decode(&headers, &body) {
            Ok(message) => message,
            Err(e) if !e.is_fatal() => {
                warn!("Dropping undecodable message from {}: {}", ctx.control().endpoint(), e);
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        debug!(
            "SM message received. Headers: {:?}, message: {}",
            message.headers, message.body
        );

        self.dispatch(ctx, &message.headers, &message.body)
            .await
            .map(Some)
    }
}

impl std::fmt::Debug for ActionDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionDispatcher")
            .field("actions", &self.actions())
            .finish()
    }
}
