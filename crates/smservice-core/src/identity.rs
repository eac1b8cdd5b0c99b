//! Service identity: the registered name plus the advertised action set.

use crate::{Result, ServiceError};
use std::collections::BTreeSet;

/// Action every service answers, advertised or not.
pub const PING_ACTION: &str = "ping";

/// Name and advertised actions of a service. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceIdentity {
    name: String,
    actions: BTreeSet<String>,
}

impl ServiceIdentity {
    /// Build an identity. Action names are lowercased and deduplicated, and
    /// `ping` is always included.
    pub fn new<I, S>(name: impl Into<String>, actions: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ServiceError::Config {
                message: "service name must not be empty".to_string(),
            });
        }

        let mut set = BTreeSet::new();
        for action in actions {
            let action = action.as_ref().trim().to_lowercase();
            if action.is_empty() {
                return Err(ServiceError::Config {
                    message: format!("service '{}' advertises an empty action name", name),
                });
            }
            set.insert(action);
        }
        set.insert(PING_ACTION.to_string());

        Ok(Self { name, actions: set })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Advertised actions in sorted order.
    pub fn actions(&self) -> impl Iterator<Item = &str> {
        self.actions.iter().map(String::as_str)
    }

    pub fn advertises(&self, action: &str) -> bool {
        self.actions.contains(&action.to_lowercase())
    }
}
