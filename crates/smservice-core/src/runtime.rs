//! Service runtime: composes channels, registration, keep-alive and dispatch.
//!
//! Lifecycle of [`ServiceRuntime::start`]:
//!
//! 1. connect the control and peer channels
//! 2. register with the SM (blocks until confirmed, the wait policy expires,
//!    or shutdown is requested)
//! 3. spawn the keep-alive task
//! 4. receive + decode + dispatch on the control channel until the channel
//!    fails, a handler fails, the keep-alive task fails, or shutdown is requested

use crate::codec::Headers;
use crate::config::{RegisterTimeout, RuntimeConfig};
use crate::context::ActionContext;
use crate::dispatch::{handler_fn, ActionDispatcher, ActionHandler, REGISTER_ACTION, UPDATE_ACTION};
use crate::identity::ServiceIdentity;
use crate::keepalive::KeepAlive;
use crate::registration::{self, Registration, RegistrationState};
use crate::transport::{Channel, TcpChannel};
use crate::{Result, ServiceError};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, warn, Instrument, Span};

/// Cloneable trigger that stops a running runtime.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl ShutdownHandle {
    /// Make `serve`/`start` return `Ok(())` and stop the keep-alive task.
    pub fn shutdown(&self) {
        // Stored even when no loop is subscribed yet
        self.tx.send_replace(true);
    }

    pub fn is_shutdown(&self) -> bool {
        *self.tx.borrow()
    }
}

/// Builder for configuring a [`ServiceRuntime`].
///
/// # Example
///
/// ```rust,ignore
/// use smservice_core::{ServiceIdentity, ServiceRuntime, ServiceManagerConfig};
///
/// let identity = ServiceIdentity::new("dummy", ["someaction"])?;
/// let runtime = ServiceRuntime::builder(identity)
///     .handler("someaction", Arc::new(SomeAction))
///     .connect_tcp(
///         ServiceManagerConfig::CONTROL_ENDPOINT,
///         ServiceManagerConfig::PEER_ENDPOINT,
///     );
/// runtime.start().await?;
/// ```
pub struct ServiceRuntimeBuilder {
    identity: ServiceIdentity,
    config: RuntimeConfig,
    dispatcher: ActionDispatcher,
    span: Option<Span>,
}

impl ServiceRuntimeBuilder {
    pub fn new(identity: ServiceIdentity) -> Self {
        Self {
            identity,
            config: RuntimeConfig::default(),
            dispatcher: ActionDispatcher::with_builtins(),
            span: None,
        }
    }

    /// Override the default SM timings.
    pub fn config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    /// Bind a handler. Replaces built-ins and earlier handlers of the same name.
    pub fn handler(mut self, name: &str, handler: Arc<dyn ActionHandler>) -> Self {
        let _ = warn_if_unadvertised(&self.identity, name);
        self.dispatcher.register(name, handler);
        self
    }

    /// Bind a synchronous closure as a handler.
    pub fn handler_fn<F>(self, name: &str, f: F) -> Self
    where
        F: Fn(&ActionContext, &Headers, &Value) -> Result<()> + Send + Sync + 'static,
    {
        self.handler(name, handler_fn(f))
    }

    /// Logging context every runtime task is instrumented with.
    ///
    /// Default: an `info` span named `service` carrying the service name.
    pub fn span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    /// Build with TCP channels to the given control and peer endpoints.
    ///
    /// Nothing is dialed until `connect` or `start`.
    pub fn connect_tcp(self, control_endpoint: &str, peer_endpoint: &str) -> ServiceRuntime {
        let name = self.identity.name().to_string();
        let control = Arc::new(TcpChannel::new(control_endpoint, name.clone()));
        let peer = Arc::new(TcpChannel::new(peer_endpoint, name));
        self.with_channels(control, peer)
    }

    /// Build on caller-supplied channels.
    pub fn with_channels(self, control: Arc<dyn Channel>, peer: Arc<dyn Channel>) -> ServiceRuntime {
        let span = self
            .span
            .unwrap_or_else(|| tracing::info_span!("service", name = %self.identity.name()));
        let (shutdown_tx, _) = watch::channel(false);
        let ctx = ActionContext::new(
            Arc::new(self.identity),
            Registration::new(),
            control,
            peer,
        );

        ServiceRuntime {
            ctx,
            config: self.config,
            dispatcher: self.dispatcher,
            span,
            shutdown: ShutdownHandle {
                tx: Arc::new(shutdown_tx),
            },
        }
    }
}

/// The SM only routes advertised actions (plus its own REGISTER/UPDATE
/// replies) to a service, so any other handler is unreachable.
fn warn_if_unadvertised(identity: &ServiceIdentity, name: &str) -> bool {
    let lowered = name.to_lowercase();
    let routable =
        lowered == REGISTER_ACTION || lowered == UPDATE_ACTION || identity.advertises(&lowered);
    if !routable {
        warn!(
            "Handler '{}' is not advertised by service '{}' and will not be routed by the SM",
            name,
            identity.name()
        );
    }
    !routable
}

/// A service attached to the Service Manager.
pub struct ServiceRuntime {
    ctx: ActionContext,
    config: RuntimeConfig,
    dispatcher: ActionDispatcher,
    span: Span,
    shutdown: ShutdownHandle,
}

impl ServiceRuntime {
    pub fn builder(identity: ServiceIdentity) -> ServiceRuntimeBuilder {
        ServiceRuntimeBuilder::new(identity)
    }

    pub fn identity(&self) -> &ServiceIdentity {
        self.ctx.identity()
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn registration_state(&self) -> RegistrationState {
        self.ctx.registration_state()
    }

    /// Handler context, for sending outside of a handler.
    pub fn context(&self) -> &ActionContext {
        &self.ctx
    }

    pub fn dispatcher(&self) -> &ActionDispatcher {
        &self.dispatcher
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Bind a handler before the runtime starts. Last write wins.
    pub fn register_handler(&mut self, name: &str, handler: Arc<dyn ActionHandler>) {
        let _ = warn_if_unadvertised(self.ctx.identity(), name);
        self.dispatcher.register(name, handler);
    }

    /// Connect both channels. Idempotent.
    pub async fn connect(&self) -> Result<()> {
        self.ctx.control().connect().await?;
        self.ctx.peer().connect().await?;
        info!(
            "Connected: control {}, peer {}",
            self.ctx.control().endpoint(),
            self.ctx.peer().endpoint()
        );
        Ok(())
    }

    /// Register with the SM. See [`registration::register`].
    pub async fn register(&self, timeout: RegisterTimeout) -> Result<u32> {
        registration::register(
            &self.ctx,
            &self.dispatcher,
            self.config.register_retry_interval,
            timeout,
        )
        .instrument(self.span.clone())
        .await
    }

    /// Invoke another service's action through the SM. Fire-and-forget.
    pub async fn execute(&self, target: &str, body: Value) -> Result<()> {
        self.ctx.execute(target, body).await
    }

    /// Connect, register, start heartbeats and serve until stopped.
    ///
    /// Shutdown is honored at every stage, including while connecting and
    /// while waiting for the SM to confirm registration. Any failure of the
    /// keep-alive task ends the runtime with that error.
    pub async fn start(&self) -> Result<()> {
        let span = self.span.clone();
        async move {
            let mut shutdown_rx = self.shutdown.tx.subscribe();
            if *shutdown_rx.borrow() {
                return Ok(());
            }

            let attach = async {
                self.connect().await?;
                self.register(self.config.register_timeout).await
            };
            tokio::select! {
                result = attach => {
                    result?;
                }
                _ = shutdown_rx.changed() => {
                    info!(
                        "Service '{}' shutting down before registration completed",
                        self.identity().name()
                    );
                    return Ok(());
                }
            }

            let mut keepalive = KeepAlive::spawn(
                self.ctx.control().clone(),
                self.ctx.registration().clone(),
                self.config.keepalive_interval,
            );

            // Only a keep-alive failure may cut the receive loop short; a
            // clean keep-alive exit leaves request handling running.
            let keepalive_failure = async {
                match keepalive.finished().await {
                    Ok(()) => std::future::pending::<ServiceError>().await,
                    Err(e) => e,
                }
            };

            let result = tokio::select! {
                result = self.serve() => result,
                e = keepalive_failure => {
                    error!("Keep-alive task failed: {}", e);
                    Err(e)
                }
            };

            keepalive.shutdown();
            result
        }
        .instrument(span)
        .await
    }

    /// Run the receive loop on the control channel.
    ///
    /// Non-fatal errors (decode failures) drop the message and unknown actions
    /// are logged; the loop keeps going. Fatal errors end it.
    pub async fn serve(&self) -> Result<()> {
        let mut shutdown_rx = self.shutdown.tx.subscribe();
        if *shutdown_rx.borrow() {
            return Ok(());
        }

        loop {
            tokio::select! {
                result = self.dispatcher.receive_and_dispatch(&self.ctx) => match result {
                    Ok(_) => {}
                    Err(e) if e.is_fatal() => {
                        error!("Receive loop stopped: {}", e);
                        return Err(e);
                    }
                    Err(e) => warn!("Dropping message: {}", e),
                },
                _ = shutdown_rx.changed() => {
                    info!("Service '{}' shutting down", self.identity().name());
                    return Ok(());
                }
            }
        }
    }
}

impl std::fmt::Debug for ServiceRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceRuntime")
            .field("ctx", &self.ctx)
            .field("config", &self.config)
            .field("dispatcher", &self.dispatcher)
            .finish()
    }
}
