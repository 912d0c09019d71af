//! Single-slot handler registries.
//!
//! One slot per [`EventType`]. Replacing a slot hands back the previous
//! occupant so callers can build call chains themselves; the registry never
//! invokes more than the one handler it holds.
//!
//! Slot access is a pointer-sized swap or clone under a `parking_lot::Mutex`.
//! The lock is never held while a handler runs, so a handler may re-register
//! slots (including its own) without deadlocking.

use crate::EventType;
use parking_lot::Mutex;

/// At most one handler of type `H`.
pub struct HandlerSlot<H> {
    inner: Mutex<Option<H>>,
}

impl<H: Clone> HandlerSlot<H> {
    /// Creates an empty slot.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(None),
        }
    }

    /// Stores `handler` (or clears the slot) and returns the previous one.
    pub fn replace(&self, handler: Option<H>) -> Option<H> {
        std::mem::replace(&mut *self.inner.lock(), handler)
    }

    /// Returns a clone of the current handler.
    #[must_use]
    pub fn get(&self) -> Option<H> {
        self.inner.lock().clone()
    }

    /// Returns `true` if a handler is present.
    #[must_use]
    pub fn is_set(&self) -> bool {
        self.inner.lock().is_some()
    }
}

impl<H: Clone> Default for HandlerSlot<H> {
    fn default() -> Self {
        Self::new()
    }
}

/// One [`HandlerSlot`] per [`EventType`], indexed by [`EventType::index`].
pub struct HandlerRegistry<H> {
    slots: [HandlerSlot<H>; EventType::COUNT],
}

impl<H: Clone> HandlerRegistry<H> {
    /// Creates a registry with every slot empty.
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: std::array::from_fn(|_| HandlerSlot::new()),
        }
    }

    /// Replaces the slot for `event`, returning the previous handler.
    pub fn set(&self, event: EventType, handler: Option<H>) -> Option<H> {
        self.slots[event.index()].replace(handler)
    }

    /// Returns the handler for `event`, if any.
    #[must_use]
    pub fn get(&self, event: EventType) -> Option<H> {
        self.slots[event.index()].get()
    }

    /// Returns `true` if `event` has a handler.
    #[must_use]
    pub fn is_set(&self, event: EventType) -> bool {
        self.slots[event.index()].is_set()
    }

    /// Event types that currently have a handler.
    pub fn registered(&self) -> impl Iterator<Item = EventType> + '_ {
        EventType::ALL.into_iter().filter(|e| self.is_set(*e))
    }
}

impl<H: Clone> Default for HandlerRegistry<H> {
    fn default() -> Self {
        Self::new()
    }
}
