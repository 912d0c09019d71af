//! Event identifiers shared by the platform, the bridge and script bindings.
//!
//! # Encoding
//!
//! | Event type | Code | String | Resource meaning |
//! |------------|------|--------|------------------|
//! | [`EventType::GpioPosEdge`] | 1 | `gpio_posedge` | `(port << 8) \| pin` |
//! | [`EventType::GpioNegEdge`] | 2 | `gpio_negedge` | `(port << 8) \| pin` |
//! | [`EventType::TimerMatch`] | 3 | `tmr_match` | timer index |
//! | [`EventType::UartRx`] | 4 | `uart_rx` | UART index |
//! | [`EventType::SpiDone`] | 5 | `spi_done` | SPI interface index |
//!
//! Codes start at 1 so that 0 never names a valid event type when it crosses
//! into a script engine.

use crate::BridgeError;
use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A fixed category of hardware condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventType {
    /// GPIO pin transitioned low → high.
    #[serde(rename = "gpio_posedge")]
    GpioPosEdge,
    /// GPIO pin transitioned high → low.
    #[serde(rename = "gpio_negedge")]
    GpioNegEdge,
    /// Timer reached its match value.
    #[serde(rename = "tmr_match")]
    TimerMatch,
    /// UART received data.
    #[serde(rename = "uart_rx")]
    UartRx,
    /// SPI transfer completed.
    #[serde(rename = "spi_done")]
    SpiDone,
}

impl EventType {
    /// Every event type, in code order.
    pub const ALL: [EventType; 5] = [
        Self::GpioPosEdge,
        Self::GpioNegEdge,
        Self::TimerMatch,
        Self::UartRx,
        Self::SpiDone,
    ];

    /// Number of event types.
    pub const COUNT: usize = Self::ALL.len();

    /// Dense index in `0..COUNT`, used for slot tables.
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::GpioPosEdge => 0,
            Self::GpioNegEdge => 1,
            Self::TimerMatch => 2,
            Self::UartRx => 3,
            Self::SpiDone => 4,
        }
    }

    /// Stable numeric code exposed to script engines.
    #[must_use]
    pub const fn code(self) -> u8 {
        self.index() as u8 + 1
    }

    /// Looks up an event type by its numeric code.
    #[must_use]
    pub fn from_code(code: i64) -> Option<Self> {
        Self::ALL.iter().copied().find(|e| i64::from(e.code()) == code)
    }

    /// Canonical string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::GpioPosEdge => "gpio_posedge",
            Self::GpioNegEdge => "gpio_negedge",
            Self::TimerMatch => "tmr_match",
            Self::UartRx => "uart_rx",
            Self::SpiDone => "spi_done",
        }
    }

    /// Name of the script-side constant (`INT_TMR_MATCH`, ...).
    #[must_use]
    pub const fn constant_name(self) -> &'static str {
        match self {
            Self::GpioPosEdge => "INT_GPIO_POSEDGE",
            Self::GpioNegEdge => "INT_GPIO_NEGEDGE",
            Self::TimerMatch => "INT_TMR_MATCH",
            Self::UartRx => "INT_UART_RX",
            Self::SpiDone => "INT_SPI_DONE",
        }
    }

    /// The [`EventMask`] bit for this event type.
    #[must_use]
    pub const fn mask(self) -> EventMask {
        match self {
            Self::GpioPosEdge => EventMask::GPIO_POSEDGE,
            Self::GpioNegEdge => EventMask::GPIO_NEGEDGE,
            Self::TimerMatch => EventMask::TMR_MATCH,
            Self::UartRx => EventMask::UART_RX,
            Self::SpiDone => EventMask::SPI_DONE,
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|e| e.as_str() == s)
            .ok_or_else(|| BridgeError::UnknownEvent(s.to_string()))
    }
}

bitflags! {
    /// A set of [`EventType`]s, e.g. the events a platform supports.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct EventMask: u8 {
        const GPIO_POSEDGE = 1 << 0;
        const GPIO_NEGEDGE = 1 << 1;
        const TMR_MATCH = 1 << 2;
        const UART_RX = 1 << 3;
        const SPI_DONE = 1 << 4;
    }
}

impl EventMask {
    /// Returns `true` if `event` is in the set.
    #[must_use]
    pub fn has(self, event: EventType) -> bool {
        self.contains(event.mask())
    }
}

impl FromIterator<EventType> for EventMask {
    fn from_iter<I: IntoIterator<Item = EventType>>(iter: I) -> Self {
        iter.into_iter()
            .fold(EventMask::empty(), |acc, e| acc | e.mask())
    }
}

/// Identifies which instance of a resource raised an event.
///
/// Interpretation is event-type-specific. GPIO events encode
/// `(port << 8) | pin`; see [`ResourceId::gpio`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(pub u32);

impl ResourceId {
    const GPIO_PORT_SHIFT: u32 = 8;
    const GPIO_PIN_MASK: u32 = (1 << Self::GPIO_PORT_SHIFT) - 1;

    /// Creates a resource id from its raw value.
    #[must_use]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Encodes a GPIO port/pin pair.
    #[must_use]
    pub const fn gpio(port: u16, pin: u8) -> Self {
        Self(((port as u32) << Self::GPIO_PORT_SHIFT) | pin as u32)
    }

    /// Raw value.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// GPIO port, when this id was built with [`ResourceId::gpio`].
    #[must_use]
    pub const fn port(self) -> u16 {
        (self.0 >> Self::GPIO_PORT_SHIFT) as u16
    }

    /// GPIO pin, when this id was built with [`ResourceId::gpio`].
    #[must_use]
    pub const fn pin(self) -> u8 {
        (self.0 & Self::GPIO_PIN_MASK) as u8
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for ResourceId {
    fn from(raw: u32) -> Self {
        Self(raw)
    }
}

/// One queued occurrence. The queue stores copies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QueueEntry {
    /// Event category.
    pub event: EventType,
    /// Resource that raised it.
    pub resource: ResourceId,
}

impl QueueEntry {
    #[must_use]
    pub const fn new(event: EventType, resource: ResourceId) -> Self {
        Self { event, resource }
    }
}

impl fmt::Display for QueueEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.event, self.resource)
    }
}
