//! Actor identity attached to audited operations.

use serde::{Deserialize, Serialize};

/// Identity performing a stock operation, recorded on every audit entry.
///
/// Boundary layers decide what goes in here (a user id, a device serial,
/// the service default); the ledger itself never assumes an ambient
/// identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Actor(String);

impl Actor {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Conventional identity for unattended operations (seeds, scheduled
    /// refills, service-level maintenance).
    pub fn system() -> Self {
        Self("system".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for Actor {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl From<&str> for Actor {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for Actor {
    fn from(value: String) -> Self {
        Self(value)
    }
}
