//! Run configuration loaded from TOML.
//!
//! ```toml
//! [bridge]
//! overflow_policy = "coalesced"
//!
//! [platform]
//! timers = 2
//!
//! [[sources]]
//! name = "tick"
//! event = "tmr_match"
//! resource = 0
//! period_ms = 5
//! count = 100
//!
//! [[sources]]
//! event = "gpio_posedge"
//! port = 0
//! pin = 3
//! period_ms = 20
//! ```

use irqbridge_core::{BridgeConfig, EventType, PlatformLayout, ResourceId};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors while loading the run configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file.
    #[error("failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse TOML.
    #[error("failed to parse config file '{path}': {source}")]
    ParseToml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// A `[[sources]]` entry is malformed.
    #[error(transparent)]
    InvalidSource(#[from] SourceDefError),
}

impl ConfigError {
    fn read_file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::ReadFile {
            path: path.into(),
            source,
        }
    }

    fn parse_toml(path: impl Into<PathBuf>, source: toml::de::Error) -> Self {
        Self::ParseToml {
            path: path.into(),
            source,
        }
    }
}

/// Validation failures for a [`SourceDef`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceDefError {
    /// Neither `resource` nor `port`/`pin` given.
    #[error("source '{label}': no resource (set `resource`, or `port` and `pin` for GPIO)")]
    NoResource { label: String },

    /// Both `resource` and `port`/`pin` given.
    #[error("source '{label}': `resource` and `port`/`pin` are mutually exclusive")]
    BothResources { label: String },

    /// Only one of `port` / `pin` given.
    #[error("source '{label}': `port` and `pin` must be set together")]
    IncompleteGpio { label: String },

    /// `port`/`pin` used with a non-GPIO event.
    #[error("source '{label}': `port`/`pin` only apply to GPIO events, not {event}")]
    NotGpio { label: String, event: EventType },

    /// `period_ms = 0`.
    #[error("source '{label}': period_ms must be greater than zero")]
    ZeroPeriod { label: String },

    /// Resource rejected by the platform layout.
    #[error("source '{label}': {reason}")]
    Platform { label: String, reason: String },
}

/// Top-level run configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Bridge behavior.
    pub bridge: BridgeConfig,
    /// Simulated board layout.
    pub platform: PlatformLayout,
    /// Peripheral event sources.
    pub sources: Vec<SourceDef>,
}

impl AppConfig {
    /// Loads and validates a config file.
    ///
    /// # Errors
    ///
    /// [`ConfigError`] if the file cannot be read, parsed or validated.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text =
            std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;
        let config = Self::from_toml(&text).map_err(|e| ConfigError::parse_toml(path, e))?;
        config.validate()?;
        Ok(config)
    }

    /// Parses TOML without validating.
    ///
    /// # Errors
    ///
    /// Returns a TOML parse error.
    pub fn from_toml(toml_str: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(toml_str)
    }

    /// Validates every source; stops at the first failure.
    ///
    /// # Errors
    ///
    /// The first [`SourceDefError`].
    pub fn validate(&self) -> Result<(), SourceDefError> {
        self.sources.iter().enumerate().try_for_each(|(i, s)| {
            s.validate(i)?;
            Ok(())
        })
    }
}

fn default_period_ms() -> u64 {
    10
}

/// One emulated peripheral raising an event at a fixed period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDef {
    /// Label for logs and the run summary.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Event type raised.
    pub event: EventType,

    /// Raw resource id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<u32>,

    /// GPIO port (GPIO events only, with `pin`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    /// GPIO pin (GPIO events only, with `port`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pin: Option<u8>,

    /// Interval between events.
    #[serde(default = "default_period_ms")]
    pub period_ms: u64,

    /// Stop after this many events. Unbounded when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u64>,
}

impl SourceDef {
    /// Label used in messages: `name`, or `#<index>`.
    #[must_use]
    pub fn label(&self, index: usize) -> String {
        self.name.clone().unwrap_or_else(|| format!("#{index}"))
    }

    /// Checks field combinations.
    ///
    /// # Errors
    ///
    /// The first [`SourceDefError`] found.
    pub fn validate(&self, index: usize) -> Result<ResourceId, SourceDefError> {
        let label = self.label(index);

        if self.period_ms == 0 {
            return Err(SourceDefError::ZeroPeriod { label });
        }

        let gpio = matches!(self.event, EventType::GpioPosEdge | EventType::GpioNegEdge);
        match (self.resource, self.port, self.pin) {
            (Some(_), Some(_), _) | (Some(_), _, Some(_)) => {
                Err(SourceDefError::BothResources { label })
            }
            (Some(raw), None, None) => Ok(ResourceId(raw)),
            (None, Some(_), Some(_)) if !gpio => Err(SourceDefError::NotGpio {
                label,
                event: self.event,
            }),
            (None, Some(port), Some(pin)) => Ok(ResourceId::gpio(port, pin)),
            (None, Some(_), None) | (None, None, Some(_)) => {
                Err(SourceDefError::IncompleteGpio { label })
            }
            (None, None, None) => Err(SourceDefError::NoResource { label }),
        }
    }
}
