//! In-process platform for hosts without interrupt hardware.
//!
//! [`SimulatedPlatform`] keeps an enable bit and a latched pending flag per
//! `(event, resource)` line plus a CPU-wide switch. Peripheral emulation
//! calls [`SimulatedPlatform::raise`] from its own thread, which plays the
//! role of interrupt context.

use crate::{
    DispatchReport, EventMask, EventType, InterruptBridge, PlatformError, PlatformInterrupts,
    ResourceId,
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

/// Resource counts of a simulated board.
///
/// An event type whose resource count is zero is not supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformLayout {
    /// Number of timers (`tmr_match`).
    pub timers: u32,
    /// Number of GPIO ports (`gpio_posedge` / `gpio_negedge`).
    pub gpio_ports: u32,
    /// Pins per GPIO port.
    pub gpio_pins: u32,
    /// Number of UARTs (`uart_rx`).
    pub uarts: u32,
    /// Number of SPI interfaces (`spi_done`).
    pub spis: u32,
}

impl Default for PlatformLayout {
    fn default() -> Self {
        Self {
            timers: 4,
            gpio_ports: 2,
            gpio_pins: 16,
            uarts: 2,
            spis: 1,
        }
    }
}

impl PlatformLayout {
    /// Resource count for `event`.
    #[must_use]
    pub fn count(&self, event: EventType) -> u32 {
        match event {
            EventType::TimerMatch => self.timers,
            EventType::GpioPosEdge | EventType::GpioNegEdge => self.gpio_ports,
            EventType::UartRx => self.uarts,
            EventType::SpiDone => self.spis,
        }
    }

    /// Event types with at least one resource.
    #[must_use]
    pub fn supported(&self) -> EventMask {
        EventType::ALL
            .into_iter()
            .filter(|e| self.count(*e) > 0)
            .collect()
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct Line {
    enabled: bool,
    pending: bool,
}

/// What [`SimulatedPlatform::raise`] did with an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Raised {
    /// Line enabled: flag acknowledged and the bridge dispatched.
    Delivered(DispatchReport),
    /// Line, event type or CPU-wide switch disabled: flag left latched.
    Latched,
}

/// Software model of per-resource interrupt lines.
pub struct SimulatedPlatform {
    layout: PlatformLayout,
    lines: Mutex<HashMap<(EventType, ResourceId), Line>>,
    global: AtomicBool,
}

impl SimulatedPlatform {
    /// Creates a platform with every line disabled and the CPU-wide switch on.
    #[must_use]
    pub fn new(layout: PlatformLayout) -> Self {
        Self {
            layout,
            lines: Mutex::new(HashMap::new()),
            global: AtomicBool::new(true),
        }
    }

    /// Board layout.
    #[must_use]
    pub fn layout(&self) -> &PlatformLayout {
        &self.layout
    }

    /// Hardware condition on `(event, resource)`.
    ///
    /// Latches the pending flag. If the line, the event type on `bridge`
    /// and the CPU-wide switch are all enabled, the flag is acknowledged and
    /// `bridge.dispatch` runs on the calling thread.
    ///
    /// # Errors
    ///
    /// [`PlatformError`] for unsupported events or out-of-range resources.
    pub fn raise<const N: usize>(
        &self,
        bridge: &InterruptBridge<N>,
        event: EventType,
        resource: ResourceId,
    ) -> Result<Raised, PlatformError> {
        self.validate(event, resource)?;
        let deliver = {
            let mut lines = self.lines.lock();
            let line = lines.entry((event, resource)).or_default();
            let deliver = line.enabled
                && bridge.is_event_enabled(event)
                && self.global.load(Ordering::Acquire);
            line.pending = !deliver;
            deliver
        };
        if deliver {
            Ok(Raised::Delivered(bridge.dispatch(event, resource)))
        } else {
            Ok(Raised::Latched)
        }
    }

    fn validate(&self, event: EventType, resource: ResourceId) -> Result<(), PlatformError> {
        let count = self.layout.count(event);
        if count == 0 {
            return Err(PlatformError::Unsupported { event });
        }
        let in_range = match event {
            EventType::GpioPosEdge | EventType::GpioNegEdge => {
                u32::from(resource.port()) < count
                    && u32::from(resource.pin()) < self.layout.gpio_pins
                    && resource.raw() >> 24 == 0
            }
            _ => resource.raw() < count,
        };
        if in_range {
            Ok(())
        } else {
            Err(PlatformError::InvalidResource { event, resource })
        }
    }
}

impl PlatformInterrupts for SimulatedPlatform {
    fn supported_events(&self) -> EventMask {
        self.layout.supported()
    }

    fn resource_count(&self, event: EventType) -> u32 {
        self.layout.count(event)
    }

    fn set_hw_interrupt(
        &self,
        event: EventType,
        resource: ResourceId,
        enabled: bool,
    ) -> Result<(), PlatformError> {
        self.validate(event, resource)?;
        self.lines
            .lock()
            .entry((event, resource))
            .or_default()
            .enabled = enabled;
        Ok(())
    }

    fn get_hw_interrupt(
        &self,
        event: EventType,
        resource: ResourceId,
    ) -> Result<bool, PlatformError> {
        self.validate(event, resource)?;
        Ok(self
            .lines
            .lock()
            .get(&(event, resource))
            .is_some_and(|l| l.enabled))
    }

    fn get_and_maybe_clear_hw_flag(
        &self,
        event: EventType,
        resource: ResourceId,
        clear: bool,
    ) -> Result<bool, PlatformError> {
        self.validate(event, resource)?;
        let mut lines = self.lines.lock();
        let Some(line) = lines.get_mut(&(event, resource)) else {
            return Ok(false);
        };
        let pending = line.pending;
        if clear {
            line.pending = false;
        }
        Ok(pending)
    }

    fn set_global_interrupts(&self, enabled: bool) -> bool {
        self.global.swap(enabled, Ordering::AcqRel)
    }

    fn global_interrupts_enabled(&self) -> bool {
        self.global.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for SimulatedPlatform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulatedPlatform")
            .field("layout", &self.layout)
            .field("global", &self.global.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}
