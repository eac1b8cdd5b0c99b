//! Periodic UPDATE heartbeats to the Service Manager.
//!
//! The loop runs as its own tokio task once registration succeeds. It sends
//! one UPDATE per interval for as long as the service stays registered and
//! exits the first time it wakes up to find it is not. It never restarts
//! itself.

use crate::codec::Message;
use crate::registration::Registration;
use crate::transport::{send_message, Channel};
use crate::{Result, ServiceError};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// How long a dropped handle lets the task reach its shutdown point before
/// aborting it.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Handle to a running keep-alive task.
///
/// Dropping it requests shutdown. The task stops at its next suspension point
/// and is only aborted if it does not get there within a short grace period,
/// so an UPDATE already being written is never cut in half.
pub struct KeepAliveHandle {
    shutdown_tx: watch::Sender<bool>,
    task_handle: Option<JoinHandle<Result<()>>>,
}

impl KeepAliveHandle {
    /// Ask the loop to stop at its next suspension point.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    pub fn is_finished(&self) -> bool {
        self.task_handle
            .as_ref()
            .map_or(true, |handle| handle.is_finished())
    }

    /// Wait for the task to end and return its result.
    pub async fn join(mut self) -> Result<()> {
        match self.task_handle.take() {
            Some(handle) => handle
                .await
                .map_err(|e| ServiceError::Other(format!("keep-alive task failed: {}", e)))?,
            None => Ok(()),
        }
    }

    /// Wait for the task to end without consuming the handle.
    ///
    /// Resolves once; after that the handle is spent and resolves `Ok(())`.
    pub async fn finished(&mut self) -> Result<()> {
        match self.task_handle.as_mut() {
            Some(handle) => {
                let result = handle
                    .await
                    .map_err(|e| ServiceError::Other(format!("keep-alive task failed: {}", e)));
                self.task_handle = None;
                result?
            }
            None => std::future::pending().await,
        }
    }
}

impl Drop for KeepAliveHandle {
    fn drop(&mut self) {
        self.shutdown();
        let Some(handle) = self.task_handle.take() else {
            return;
        };
        if handle.is_finished() {
            return;
        }

        // Outside a runtime the task cannot be polled again anyway.
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            handle.abort();
            return;
        };
        let abort = handle.abort_handle();
        runtime.spawn(async move {
            if tokio::time::timeout(SHUTDOWN_GRACE, handle).await.is_err() {
                warn!("Keep-alive task did not stop within {:?}, aborting", SHUTDOWN_GRACE);
                abort.abort();
            }
        });
    }
}

/// Keep-alive loop spawner.
pub struct KeepAlive;

impl KeepAlive {
    /// Spawn the heartbeat task on the current tokio runtime.
    pub fn spawn(
        control: Arc<dyn Channel>,
        registration: Registration,
        interval: Duration,
    ) -> KeepAliveHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task_handle = tokio::spawn(Self::run(control, registration, interval, shutdown_rx));

        KeepAliveHandle {
            shutdown_tx,
            task_handle: Some(task_handle),
        }
    }

    async fn run(
        control: Arc<dyn Channel>,
        registration: Registration,
        interval: Duration,
        mut shutdown_rx: watch::Receiver<bool>,
    ) -> Result<()> {
        info!(
            "Starting registration update loop with periodic interval {:?}",
            interval
        );
        let update = Message::control("UPDATE", json!({}));

        while registration.is_registered() {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = shutdown_rx.changed() => {
                    debug!("Keep-alive shutdown requested");
                    break;
                }
            }

            if !registration.is_registered() {
                break;
            }

            debug!("SM request. Action: \"UPDATE\"");
            send_message(control.as_ref(), &update).await?;
        }

        info!("Registration update loop terminated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registration::RegistrationState;
    use crate::transport::{memory_pair, MemoryChannel};
    use tokio::time::{timeout, Instant};

    fn setup() -> (Arc<dyn Channel>, MemoryChannel, Registration) {
        let (control, sm) = memory_pair("svc1", "sm");
        let registration = Registration::new();
        registration.confirm();
        (Arc::new(control), sm, registration)
    }

    async fn expect_update(sm: &MemoryChannel) {
        let (headers, body) = sm.receive().await.unwrap();
        let message = Message::decode(&headers, &body).unwrap();
        assert_eq!(message.headers["action"], json!("UPDATE"));
        assert_eq!(message.body, json!({}));
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_update_per_interval() {
        let (control, sm, registration) = setup();
        let started = Instant::now();
        let handle = KeepAlive::spawn(control, registration, Duration::from_secs(30));

        for n in 1..=3u32 {
            expect_update(&sm).await;
            assert_eq!(started.elapsed(), Duration::from_secs(30) * n);
        }

        handle.shutdown();
        handle.join().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_stops_after_leaving_registered() {
        let (control, sm, registration) = setup();
        let handle = KeepAlive::spawn(control, registration.clone(), Duration::from_secs(30));

        expect_update(&sm).await;
        registration.force(RegistrationState::Registering);

        tokio::time::sleep(Duration::from_secs(45)).await;
        assert!(handle.is_finished());
        assert!(sm.try_receive().is_none(), "no UPDATE once the service is no longer registered");
        handle.join().await.unwrap();

        // The loop dropped its end of the channel; what is left is the
        // closed-channel error, never another UPDATE.
        let next = timeout(Duration::from_secs(45), sm.receive()).await;
        assert!(matches!(next, Err(_) | Ok(Err(ServiceError::Transport { .. }))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_not_registered_exits_immediately() {
        let (control, sm) = memory_pair("svc1", "sm");
        let handle = KeepAlive::spawn(Arc::new(control), Registration::new(), Duration::from_secs(30));

        handle.join().await.unwrap();
        assert!(sm.try_receive().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_interrupts_sleep() {
        let (control, sm, registration) = setup();
        let handle = KeepAlive::spawn(control, registration, Duration::from_secs(30));

        tokio::time::sleep(Duration::from_secs(5)).await;
        handle.shutdown();
        handle.join().await.unwrap();
        assert!(sm.try_receive().is_none());
    }

    /// Channel whose writes take a while to complete.
    struct SlowChannel {
        inner: MemoryChannel,
        delay: Duration,
    }

    #[async_trait::async_trait]
    impl Channel for SlowChannel {
        async fn connect(&self) -> Result<()> {
            Ok(())
        }

        async fn send(&self, headers: Vec<u8>, body: Vec<u8>) -> Result<()> {
            tokio::time::sleep(self.delay).await;
            self.inner.send(headers, body).await
        }

        async fn receive(&self) -> Result<crate::transport::Frames> {
            self.inner.receive().await
        }

        fn identity(&self) -> &str {
            self.inner.identity()
        }

        fn endpoint(&self) -> &str {
            self.inner.endpoint()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_lets_inflight_update_complete() {
        let (control, sm) = memory_pair("svc1", "sm");
        let registration = Registration::new();
        registration.confirm();
        let control = Arc::new(SlowChannel {
            inner: control,
            delay: Duration::from_secs(2),
        });
        let handle = KeepAlive::spawn(control, registration, Duration::from_secs(30));

        // Drop while the first UPDATE (started at 30s) is still being written.
        tokio::time::sleep(Duration::from_secs(31)).await;
        drop(handle);

        let started = Instant::now();
        expect_update(&sm).await;
        assert_eq!(started.elapsed(), Duration::from_secs(1));

        // Then the task stops at its shutdown point and releases the channel.
        let next = timeout(Duration::from_secs(60), sm.receive()).await;
        assert!(matches!(next, Ok(Err(ServiceError::Transport { .. }))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_while_idle_stops_task() {
        let (control, sm, registration) = setup();
        let handle = KeepAlive::spawn(control, registration, Duration::from_secs(30));

        tokio::time::sleep(Duration::from_secs(5)).await;
        drop(handle);

        let next = timeout(Duration::from_secs(60), sm.receive()).await;
        assert!(matches!(next, Ok(Err(ServiceError::Transport { .. }))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_broken_channel_ends_task_with_error() {
        let (control, sm, registration) = setup();
        drop(sm);
        let handle = KeepAlive::spawn(control, registration, Duration::from_secs(30));

        let result = handle.join().await;
        assert!(matches!(result, Err(ServiceError::Transport { .. })));
    }
}
