//! Cooperative drain hook.
//!
//! The script engine's instruction stepper calls
//! [`InterruptBridge::on_instruction_tick`] every [`HOOK_INTERVAL`]
//! instructions while [`InterruptBridge::is_armed`] is true. Each tick
//! delivers at most one queued entry, so scripted handlers interleave with
//! normal script execution instead of pausing it until the queue is empty.

use crate::{HandlerFault, InterruptBridge, OverflowPolicy, QueueEntry, DEFAULT_QUEUE_CAPACITY};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Instructions between two drain hook invocations.
pub const HOOK_INTERVAL: u32 = 2;

/// Arming flag and re-entrancy guard.
#[derive(Debug, Default)]
pub struct HookState {
    armed: AtomicBool,
    draining: AtomicBool,
}

impl HookState {
    /// Creates a disarmed, idle state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` while the queue may hold entries.
    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.armed.load(Ordering::Acquire)
    }

    /// Returns `true` while a handler is being delivered.
    #[must_use]
    pub fn is_draining(&self) -> bool {
        self.draining.load(Ordering::Acquire)
    }

    pub(crate) fn arm(&self) {
        self.armed.store(true, Ordering::Release);
    }

    pub(crate) fn disarm(&self) {
        self.armed.store(false, Ordering::Release);
    }

    /// Takes the guard. Returns `false` if a drain is already in progress.
    fn try_enter(&self) -> bool {
        self.draining
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn leave(&self) {
        self.draining.store(false, Ordering::Release);
    }
}

/// What one drain tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    /// Hook not armed; nothing to do.
    Disarmed,
    /// Called from inside a handler that is being delivered; no-op.
    Reentrant,
    /// Armed but the queue was empty; the hook disarmed.
    Empty,
    /// Entry delivered to its scripted handler.
    Delivered(QueueEntry),
    /// Entry's handler was unregistered after it was queued; discarded.
    Discarded(QueueEntry),
}

impl<const N: usize> InterruptBridge<N> {
    /// Returns `true` if the stepper should call
    /// [`on_instruction_tick`](Self::on_instruction_tick).
    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.hook.is_armed()
    }

    /// Drains one queued entry. Cooperative context only.
    ///
    /// Overflow recorded by interrupt context since the previous tick is
    /// reported to the log first.
    ///
    /// # Errors
    ///
    /// Returns the [`HandlerFault`] raised by the scripted handler, with the
    /// delivered event and resource filled in. The guard is released and
    /// the arming state updated before it is returned, so subsequent ticks
    /// proceed normally.
    pub fn on_instruction_tick(&self) -> Result<DrainOutcome, HandlerFault> {
        if !self.hook.is_armed() {
            return Ok(DrainOutcome::Disarmed);
        }
        self.report_overflow();

        if !self.hook.try_enter() {
            return Ok(DrainOutcome::Reentrant);
        }
        let result = self.drain_one();
        self.hook.leave();
        self.settle_arming();
        result
    }

    /// Returns a stepper-side handle to this bridge.
    #[must_use]
    pub fn drain_hook(self: &Arc<Self>) -> DrainHook<N> {
        DrainHook::new(Arc::clone(self))
    }

    fn drain_one(&self) -> Result<DrainOutcome, HandlerFault> {
        let Some(entry) = self.queue.pop() else {
            return Ok(DrainOutcome::Empty);
        };

        let Some(handler) = self.scripted.get(entry.event) else {
            tracing::debug!(event = %entry.event, resource = %entry.resource, "stale entry discarded");
            return Ok(DrainOutcome::Discarded(entry));
        };

        handler.invoke(entry.resource).map_err(|mut fault| {
            fault.event = entry.event;
            fault.resource = entry.resource;
            tracing::error!(
                event = %entry.event,
                resource = %entry.resource,
                "scripted handler failed: {}",
                fault.message
            );
            fault
        })?;
        Ok(DrainOutcome::Delivered(entry))
    }

    // Disarm then re-check: a push landing between the emptiness test and
    // the disarm must leave the hook armed.
    fn settle_arming(&self) {
        if self.queue.is_empty() {
            self.hook.disarm();
            if !self.queue.is_empty() {
                self.hook.arm();
            }
        }
    }

    fn report_overflow(&self) {
        let dropped = self.queue.take_dropped();
        if dropped == 0 {
            return;
        }
        let capacity = self.queue.capacity();
        match self.config.overflow_policy {
            OverflowPolicy::PerEvent => {
                for _ in 0..dropped {
                    tracing::warn!(capacity, "interrupt queue overflow, event dropped");
                }
            }
            OverflowPolicy::Coalesced => {
                tracing::warn!(capacity, dropped, "interrupt queue overflow, events dropped");
            }
        }
    }
}

/// Stepper-side handle to an [`InterruptBridge`].
///
/// Holds only a reference to the bridge; all state lives in the bridge.
pub struct DrainHook<const N: usize = DEFAULT_QUEUE_CAPACITY> {
    bridge: Arc<InterruptBridge<N>>,
}

impl<const N: usize> DrainHook<N> {
    /// Creates a handle for `bridge`.
    #[must_use]
    pub fn new(bridge: Arc<InterruptBridge<N>>) -> Self {
        Self { bridge }
    }

    /// See [`InterruptBridge::is_armed`].
    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.bridge.is_armed()
    }

    /// See [`InterruptBridge::on_instruction_tick`].
    ///
    /// # Errors
    ///
    /// Propagates the scripted handler's [`HandlerFault`].
    pub fn on_instruction_tick(&self) -> Result<DrainOutcome, HandlerFault> {
        self.bridge.on_instruction_tick()
    }

    /// The bridge behind this handle.
    #[must_use]
    pub fn bridge(&self) -> &Arc<InterruptBridge<N>> {
        &self.bridge
    }
}

impl<const N: usize> Clone for DrainHook<N> {
    fn clone(&self) -> Self {
        Self {
            bridge: Arc::clone(&self.bridge),
        }
    }
}
