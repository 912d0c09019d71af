//! Bridge configuration.
//!
//! Queue capacity and hook cadence are compile-time constants; only
//! reporting policy is configurable.
//!
//! # Example TOML
//!
//! ```toml
//! [bridge]
//! overflow_policy = "coalesced"
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How dropped events are reported to the log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OverflowPolicy {
    /// One warning per dropped event.
    #[default]
    PerEvent,
    /// One warning per drain tick, carrying the number of drops.
    Coalesced,
}

impl OverflowPolicy {
    /// Canonical string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PerEvent => "per-event",
            Self::Coalesced => "coalesced",
        }
    }
}

impl fmt::Display for OverflowPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OverflowPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "per-event" => Ok(Self::PerEvent),
            "coalesced" => Ok(Self::Coalesced),
            other => Err(format!(
                "unknown overflow policy '{other}' (expected: per-event, coalesced)"
            )),
        }
    }
}

/// Runtime options for an [`InterruptBridge`](crate::InterruptBridge).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BridgeConfig {
    /// Overflow reporting policy.
    pub overflow_policy: OverflowPolicy,
}

impl BridgeConfig {
    /// Creates a config with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the overflow policy.
    #[must_use]
    pub fn with_overflow_policy(mut self, policy: OverflowPolicy) -> Self {
        self.overflow_policy = policy;
        self
    }

    /// Serializes to TOML string.
    ///
    /// # Errors
    ///
    /// Returns error if serialization fails.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Deserializes from TOML string.
    ///
    /// # Errors
    ///
    /// Returns error if deserialization fails.
    pub fn from_toml(toml_str: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(toml_str)
    }
}

impl From<OverflowPolicy> for BridgeConfig {
    fn from(overflow_policy: OverflowPolicy) -> Self {
        Self { overflow_policy }
    }
}
