//! The interrupt bridge: registries, dispatcher and platform delegation.
//!
//! [`InterruptBridge`] is the single context object that owns the event
//! queue, both handler registries and the drain hook state. It is created
//! once and shared by `Arc` between the platform layer (interrupt context)
//! and the script engine (cooperative context).
//!
//! # Dispatch
//!
//! ```text
//! platform ISR ──► dispatch(event, resource)
//!                    │
//!                    ├─ event type masked?    ──► ignored
//!                    │
//!                    ├─ native handler set?   ──► call it now
//!                    │
//!                    └─ scripted handler set? ──► queue.push ──► arm hook
//!                                                    │
//!                                          (full) ──► dropped, reported later
//! ```
//!
//! # Enable switches
//!
//! Three independent switches gate delivery:
//!
//! - per `(event, resource)` line, on the platform ([`InterruptBridge::enable`])
//! - per event type, on the bridge ([`InterruptBridge::enable_global`])
//! - CPU-wide, on the platform ([`InterruptBridge::enable_cpu`])

use crate::drain::HookState;
use crate::{
    BridgeConfig, BridgeError, EventQueue, EventType, HandlerRegistry, NativeHandler,
    PlatformInterrupts, QueueEntry, ResourceId, ScriptedHandler, DEFAULT_QUEUE_CAPACITY,
};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

/// What happened to the scripted side of a dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptedDelivery {
    /// No scripted handler registered; nothing queued.
    NoHandler,
    /// Entry queued and hook armed.
    Queued,
    /// Queue full; the event was dropped.
    Overflowed,
    /// Event type disabled on the bridge; no handler ran.
    Masked,
}

/// Result of one [`InterruptBridge::dispatch`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchReport {
    /// A native handler was invoked.
    pub native: bool,
    /// Scripted-side outcome.
    pub scripted: ScriptedDelivery,
}

/// Interrupt emulation and dispatch bridge.
///
/// `N` is the compile-time queue capacity.
///
/// # Concurrency
///
/// - [`dispatch`](Self::dispatch) may be called from any thread standing in
///   for interrupt context.
/// - [`on_instruction_tick`](Self::on_instruction_tick) and the
///   registration methods belong to the cooperative (script engine) thread.
pub struct InterruptBridge<const N: usize = DEFAULT_QUEUE_CAPACITY> {
    pub(crate) queue: EventQueue<N>,
    pub(crate) native: HandlerRegistry<NativeHandler>,
    pub(crate) scripted: HandlerRegistry<Arc<dyn ScriptedHandler>>,
    pub(crate) hook: HookState,
    pub(crate) config: BridgeConfig,
    /// [`EventMask`](crate::EventMask) bits of event types disabled as a whole.
    masked: AtomicU8,
    platform: Arc<dyn PlatformInterrupts>,
}

impl<const N: usize> InterruptBridge<N> {
    /// Creates a bridge over `platform` with default configuration.
    #[must_use]
    pub fn new(platform: Arc<dyn PlatformInterrupts>) -> Self {
        Self::with_config(platform, BridgeConfig::default())
    }

    /// Creates a bridge over `platform` with the given configuration.
    #[must_use]
    pub fn with_config(platform: Arc<dyn PlatformInterrupts>, config: BridgeConfig) -> Self {
        Self {
            queue: EventQueue::new(),
            native: HandlerRegistry::new(),
            scripted: HandlerRegistry::new(),
            hook: HookState::new(),
            config,
            masked: AtomicU8::new(0),
            platform,
        }
    }

    // ── Registration ─────────────────────────────────────────

    /// Installs (or clears) the native handler for `event`.
    ///
    /// Returns the previous handler so the caller can chain to it.
    ///
    /// # Errors
    ///
    /// [`BridgeError::InvalidRegistration`] if the platform does not support
    /// `event`; the registry is left unchanged.
    pub fn set_native_handler(
        &self,
        event: EventType,
        handler: Option<NativeHandler>,
    ) -> Result<Option<NativeHandler>, BridgeError> {
        self.check_supported(event)?;
        let installed = handler.is_some();
        let previous = self.native.set(event, handler);
        tracing::debug!(%event, installed, "native handler set");
        Ok(previous)
    }

    /// Installs (or clears) the scripted handler for `event`.
    ///
    /// Clearing the slot makes entries already queued for `event` stale:
    /// they are discarded when drained.
    ///
    /// # Errors
    ///
    /// [`BridgeError::InvalidRegistration`] if the platform does not support
    /// `event`; the registry is left unchanged.
    pub fn set_scripted_handler(
        &self,
        event: EventType,
        handler: Option<Arc<dyn ScriptedHandler>>,
    ) -> Result<Option<Arc<dyn ScriptedHandler>>, BridgeError> {
        self.check_supported(event)?;
        let installed = handler.is_some();
        let previous = self.scripted.set(event, handler);
        tracing::debug!(%event, installed, "scripted handler set");
        Ok(previous)
    }

    /// Current native handler for `event`.
    #[must_use]
    pub fn native_handler(&self, event: EventType) -> Option<NativeHandler> {
        self.native.get(event)
    }

    /// Current scripted handler for `event`.
    #[must_use]
    pub fn scripted_handler(&self, event: EventType) -> Option<Arc<dyn ScriptedHandler>> {
        self.scripted.get(event)
    }

    // ── Interrupt context ────────────────────────────────────

    /// Interrupt-context entry point for a raw hardware event.
    ///
    /// Does nothing while the event type is disabled with
    /// [`disable_global`](Self::disable_global). Otherwise:
    ///
    /// 1. Calls the native handler for `event`, if any, synchronously.
    /// 2. If a scripted handler exists, queues `(event, resource)` and arms
    ///    the drain hook. A full queue drops the event; the drop is
    ///    reported from cooperative context on the next drain tick.
    ///
    /// Never blocks on the script engine and never allocates.
    pub fn dispatch(&self, event: EventType, resource: ResourceId) -> DispatchReport {
        if !self.is_event_enabled(event) {
            return DispatchReport {
                native: false,
                scripted: ScriptedDelivery::Masked,
            };
        }

        let native = match self.native.get(event) {
            Some(handler) => {
                handler(resource);
                true
            }
            None => false,
        };

        let scripted = if self.scripted.is_set(event) {
            if self.queue.push(QueueEntry::new(event, resource)) {
                self.hook.arm();
                ScriptedDelivery::Queued
            } else {
                ScriptedDelivery::Overflowed
            }
        } else {
            ScriptedDelivery::NoHandler
        };

        DispatchReport { native, scripted }
    }

    // ── Platform delegation ──────────────────────────────────

    /// Enables `event` on each of `resources`.
    ///
    /// Resources are enabled in order; if one fails, those before it stay
    /// enabled. An empty list enables the event type as a whole, like
    /// [`enable_global`](Self::enable_global).
    ///
    /// # Errors
    ///
    /// - [`BridgeError::InvalidRegistration`] for unsupported events
    /// - [`BridgeError::Platform`] if the platform rejects a resource
    pub fn enable(&self, event: EventType, resources: &[ResourceId]) -> Result<(), BridgeError> {
        self.set_enabled(event, resources, true)
    }

    /// Disables `event` on each of `resources`.
    ///
    /// Entries already queued are still delivered while a scripted handler
    /// is registered.
    ///
    /// # Errors
    ///
    /// Same as [`enable`](Self::enable).
    pub fn disable(&self, event: EventType, resources: &[ResourceId]) -> Result<(), BridgeError> {
        self.set_enabled(event, resources, false)
    }

    /// Enables `event` as a whole. Returns the previous state.
    ///
    /// Per-resource lines keep their own state; an event is delivered only
    /// when both its type and its line are enabled.
    ///
    /// # Errors
    ///
    /// [`BridgeError::InvalidRegistration`] for unsupported events.
    pub fn enable_global(&self, event: EventType) -> Result<bool, BridgeError> {
        self.set_event_enabled(event, true)
    }

    /// Disables `event` as a whole. Returns the previous state.
    ///
    /// While disabled, [`dispatch`](Self::dispatch) ignores `event`.
    ///
    /// # Errors
    ///
    /// [`BridgeError::InvalidRegistration`] for unsupported events.
    pub fn disable_global(&self, event: EventType) -> Result<bool, BridgeError> {
        self.set_event_enabled(event, false)
    }

    /// Whether `event` is enabled as a whole. Event types start enabled.
    #[must_use]
    pub fn is_event_enabled(&self, event: EventType) -> bool {
        self.masked.load(Ordering::Acquire) & event.mask().bits() == 0
    }

    /// Turns the CPU-wide interrupt switch on. Returns the previous state.
    pub fn enable_cpu(&self) -> bool {
        self.platform.set_global_interrupts(true)
    }

    /// Turns the CPU-wide interrupt switch off. Returns the previous state.
    pub fn disable_cpu(&self) -> bool {
        self.platform.set_global_interrupts(false)
    }

    /// Returns whether `event` is enabled on `resource`.
    ///
    /// # Errors
    ///
    /// [`BridgeError::InvalidRegistration`] or [`BridgeError::Platform`].
    pub fn is_enabled(&self, event: EventType, resource: ResourceId) -> Result<bool, BridgeError> {
        self.check_supported(event)?;
        Ok(self.platform.get_hw_interrupt(event, resource)?)
    }

    /// Polls the pending flag of `event` on `resource`, bypassing the queue.
    ///
    /// # Errors
    ///
    /// [`BridgeError::InvalidRegistration`] or [`BridgeError::Platform`].
    pub fn get_flag(
        &self,
        event: EventType,
        resource: ResourceId,
        clear: bool,
    ) -> Result<bool, BridgeError> {
        self.check_supported(event)?;
        Ok(self
            .platform
            .get_and_maybe_clear_hw_flag(event, resource, clear)?)
    }

    fn set_enabled(
        &self,
        event: EventType,
        resources: &[ResourceId],
        enabled: bool,
    ) -> Result<(), BridgeError> {
        if resources.is_empty() {
            return self.set_event_enabled(event, enabled).map(|_| ());
        }
        self.check_supported(event)?;
        for &resource in resources {
            self.platform.set_hw_interrupt(event, resource, enabled)?;
        }
        tracing::debug!(%event, ?resources, enabled, "interrupt enable changed");
        Ok(())
    }

    fn set_event_enabled(&self, event: EventType, enabled: bool) -> Result<bool, BridgeError> {
        self.check_supported(event)?;
        let bit = event.mask().bits();
        let previous = if enabled {
            self.masked.fetch_and(!bit, Ordering::AcqRel)
        } else {
            self.masked.fetch_or(bit, Ordering::AcqRel)
        };
        tracing::debug!(%event, enabled, "event type enable changed");
        Ok(previous & bit == 0)
    }

    fn check_supported(&self, event: EventType) -> Result<(), BridgeError> {
        if self.platform.supports(event) {
            Ok(())
        } else {
            Err(BridgeError::InvalidRegistration { event })
        }
    }

    // ── Accessors ────────────────────────────────────────────

    /// The event queue.
    #[must_use]
    pub fn queue(&self) -> &EventQueue<N> {
        &self.queue
    }

    /// Number of entries waiting for the drain hook.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Bridge configuration.
    #[must_use]
    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// The platform this bridge delegates to.
    #[must_use]
    pub fn platform(&self) -> &Arc<dyn PlatformInterrupts> {
        &self.platform
    }
}

impl<const N: usize> std::fmt::Debug for InterruptBridge<N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterruptBridge")
            .field("queue", &self.queue)
            .field("armed", &self.hook.is_armed())
            .field("masked", &self.masked.load(Ordering::Relaxed))
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
