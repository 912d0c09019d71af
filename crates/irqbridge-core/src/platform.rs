//! Platform interrupt control boundary.
//!
//! The bridge never touches interrupt hardware directly. Everything that
//! enables, disables or polls a hardware event goes through
//! [`PlatformInterrupts`], which a board support layer (or
//! [`SimulatedPlatform`](crate::SimulatedPlatform)) implements.

use crate::{EventMask, EventType, PlatformError, ResourceId};

/// Per-resource interrupt enable and flag access.
///
/// Implementations are called from cooperative context; the methods are
/// expected to be short register accesses.
pub trait PlatformInterrupts: Send + Sync {
    /// Event types this platform can raise.
    fn supported_events(&self) -> EventMask;

    /// Number of resources of `event`'s kind (timers, UARTs, ...).
    ///
    /// For GPIO events this is the number of ports; pins are validated by
    /// the implementation.
    fn resource_count(&self, event: EventType) -> u32;

    /// Enables or disables delivery of `event` for `resource`.
    ///
    /// # Errors
    ///
    /// [`PlatformError`] for unsupported events or out-of-range resources.
    fn set_hw_interrupt(
        &self,
        event: EventType,
        resource: ResourceId,
        enabled: bool,
    ) -> Result<(), PlatformError>;

    /// Returns whether delivery of `event` is enabled for `resource`.
    ///
    /// # Errors
    ///
    /// [`PlatformError`] for unsupported events or out-of-range resources.
    fn get_hw_interrupt(&self, event: EventType, resource: ResourceId)
        -> Result<bool, PlatformError>;

    /// Returns the pending flag of `event` on `resource`, clearing it when
    /// `clear` is set.
    ///
    /// # Errors
    ///
    /// [`PlatformError`] for unsupported events or out-of-range resources.
    fn get_and_maybe_clear_hw_flag(
        &self,
        event: EventType,
        resource: ResourceId,
        clear: bool,
    ) -> Result<bool, PlatformError>;

    /// Sets the CPU-wide interrupt switch, returning the previous state.
    fn set_global_interrupts(&self, enabled: bool) -> bool;

    /// Current state of the CPU-wide interrupt switch.
    fn global_interrupts_enabled(&self) -> bool;

    /// Returns `true` if `event` is supported.
    fn supports(&self, event: EventType) -> bool {
        self.supported_events().has(event)
    }
}
