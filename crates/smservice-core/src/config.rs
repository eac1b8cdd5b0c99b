//! Centralized configuration for the Service Manager client.
//!
//! Fixed protocol parameters live as associated constants; the per-runtime
//! knobs (intervals and the registration wait policy) live in [`RuntimeConfig`].

use std::time::Duration;

/// Well-known Service Manager endpoints and timings.
pub struct ServiceManagerConfig;

impl ServiceManagerConfig {
    /// Control endpoint: REGISTER/UPDATE exchanges and inbound dispatch.
    pub const CONTROL_ENDPOINT: &'static str = "tcp://proxy:6661";
    /// Peer endpoint: calls to other services relayed by the SM.
    pub const PEER_ENDPOINT: &'static str = "tcp://proxy:6660";
    pub const REGISTER_RETRY_INTERVAL: Duration = Duration::from_secs(10);
    pub const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);
}

/// Wire-level transport limits.
pub struct TransportConfig;

impl TransportConfig {
    pub const TCP_SCHEME: &'static str = "tcp://";
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
    pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024; // 16MB
}

/// How long `register` may keep retrying before giving up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RegisterTimeout {
    /// Retry until the SM confirms.
    #[default]
    Infinite,
    /// Fail with `RegistrationTimeout` once this much time has elapsed.
    Within(Duration),
}

impl RegisterTimeout {
    /// Build a timeout from seconds. Zero or negative means wait forever.
    pub fn from_secs_f64(secs: f64) -> Self {
        if secs.is_finite() && secs > 0.0 {
            RegisterTimeout::Within(Duration::from_secs_f64(secs))
        } else {
            RegisterTimeout::Infinite
        }
    }

    pub fn is_infinite(&self) -> bool {
        matches!(self, RegisterTimeout::Infinite)
    }
}

/// Timing configuration for a single service runtime.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Delay between unanswered REGISTER attempts.
    pub register_retry_interval: Duration,
    /// Wait policy used by `start`.
    pub register_timeout: RegisterTimeout,
    /// Period between UPDATE heartbeats.
    pub keepalive_interval: Duration,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            register_retry_interval: ServiceManagerConfig::REGISTER_RETRY_INTERVAL,
            register_timeout: RegisterTimeout::Infinite,
            keepalive_interval: ServiceManagerConfig::KEEPALIVE_INTERVAL,
        }
    }
}

impl RuntimeConfig {
    /// Create a config with the default SM timings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the delay between REGISTER attempts.
    pub fn with_register_retry_interval(mut self, interval: Duration) -> Self {
        self.register_retry_interval = interval;
        self
    }

    /// Set the registration wait policy.
    pub fn with_register_timeout(mut self, timeout: RegisterTimeout) -> Self {
        self.register_timeout = timeout;
        self
    }

    /// Set the heartbeat period.
    pub fn with_keepalive_interval(mut self, interval: Duration) -> Self {
        self.keepalive_interval = interval;
        self
    }
}
