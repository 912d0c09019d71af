//! Error types for the interrupt bridge.

use crate::{EventType, ResourceId};
use thiserror::Error;

/// Errors returned by registration and platform-facing operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeError {
    /// The platform does not support this event type.
    #[error("invalid registration: event type {event} is not supported by this platform")]
    InvalidRegistration {
        /// Rejected event type.
        event: EventType,
    },

    /// Unknown event type name or code.
    #[error("unknown event type: {0}")]
    UnknownEvent(String),

    /// Platform control rejected the request.
    #[error(transparent)]
    Platform(#[from] PlatformError),
}

/// Errors raised by [`PlatformInterrupts`](crate::PlatformInterrupts)
/// implementations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlatformError {
    /// Event type not wired on this platform.
    #[error("platform does not support {event}")]
    Unsupported {
        /// Event type.
        event: EventType,
    },

    /// Resource id out of range for the event type.
    #[error("invalid resource {resource} for {event}")]
    InvalidResource {
        /// Event type.
        event: EventType,
        /// Offending resource.
        resource: ResourceId,
    },
}

/// A scripted handler raised an error while handling a queued event.
///
/// Returned by the drain hook after its guard has been released, so the
/// caller may report it through the engine's normal error channel.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("handler for {event} (resource {resource}) failed: {message}")]
pub struct HandlerFault {
    /// Event type being delivered.
    pub event: EventType,
    /// Resource being delivered.
    pub resource: ResourceId,
    /// Engine-provided error text.
    pub message: String,
}

impl HandlerFault {
    /// Creates a fault for the given delivery.
    pub fn new(event: EventType, resource: ResourceId, message: impl Into<String>) -> Self {
        Self {
            event,
            resource,
            message: message.into(),
        }
    }
}
