//! SMService Dummy - example service attached to the Service Manager.
//!
//! Registers under its name, advertises `someaction`, keeps the registration
//! alive and answers `someaction` calls until the SM connection drops or the
//! process is interrupted.

mod someaction;

use anyhow::Result;
use clap::Parser;
use smservice_core::{
    RegisterTimeout, RuntimeConfig, ServiceIdentity, ServiceManagerConfig, ServiceRuntime,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "smservice-dummy")]
#[command(about = "Example service for the Service Manager")]
struct Args {
    /// Service name, also used as the socket identity
    #[arg(short, long, default_value = "dummy")]
    name: String,

    /// Control endpoint (registration, heartbeats, inbound actions)
    #[arg(long, default_value = ServiceManagerConfig::CONTROL_ENDPOINT)]
    control_endpoint: String,

    /// Peer endpoint (calls to other services)
    #[arg(long, default_value = ServiceManagerConfig::PEER_ENDPOINT)]
    peer_endpoint: String,

    /// Seconds to wait for registration (0 = wait forever)
    #[arg(long, default_value = "0")]
    register_timeout: f64,

    /// Seconds between unanswered REGISTER attempts
    #[arg(long, default_value = "10")]
    retry_interval: u64,

    /// Seconds between UPDATE heartbeats
    #[arg(long, default_value = "30")]
    keepalive_interval: u64,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

impl Args {
    fn runtime_config(&self) -> RuntimeConfig {
        RuntimeConfig::new()
            .with_register_timeout(RegisterTimeout::from_secs_f64(self.register_timeout))
            .with_register_retry_interval(Duration::from_secs(self.retry_interval))
            .with_keepalive_interval(Duration::from_secs(self.keepalive_interval))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Set up logging
    let log_level = if args.debug { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    info!("Starting service '{}'", args.name);

    let identity = ServiceIdentity::new(&args.name, [someaction::ACTION])?;
    let runtime = ServiceRuntime::builder(identity)
        .config(args.runtime_config())
        .handler(someaction::ACTION, Arc::new(someaction::SomeAction))
        .connect_tcp(&args.control_endpoint, &args.peer_endpoint);

    let shutdown = runtime.shutdown_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received, exiting");
            shutdown.shutdown();
        }
    });

    runtime.start().await?;
    Ok(())
}
