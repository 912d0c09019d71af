//! Interrupt emulation and dispatch bridge.
//!
//! Lets a cooperatively-scheduled script engine react to asynchronous
//! hardware events that would otherwise only reach native interrupt service
//! routines.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────── interrupt context ─────────────────────────┐
//! │  platform ISR / peripheral thread                                      │
//! │        │                                                               │
//! │        ▼                                                               │
//! │  InterruptBridge::dispatch(event, resource)                            │
//! │        ├──► native handler (synchronous)                               │
//! │        └──► EventQueue::push ──► arm hook                              │
//! └────────────────────────────────────────────────────────────────────────┘
//!                      │  bounded FIFO of (EventType, ResourceId)
//!                      ▼
//! ┌─────────────────────────── cooperative context ────────────────────────┐
//! │  script engine stepper, every HOOK_INTERVAL instructions while armed   │
//! │        │                                                               │
//! │        ▼                                                               │
//! │  InterruptBridge::on_instruction_tick()                                │
//! │        └──► pop one entry ──► scripted handler(resource)               │
//! └────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Core Concepts
//!
//! - **One handler per event type per side.** [`set_native_handler`] and
//!   [`set_scripted_handler`] replace a single slot and return the previous
//!   occupant; chaining is up to the caller.
//! - **Shared interrupts.** When both sides have a handler, both see every
//!   occurrence of the event type and filter by [`ResourceId`] themselves.
//! - **Stale delivery.** Clearing a scripted slot discards entries already
//!   queued for that type when they are drained.
//! - **Overflow.** A full queue drops the event. Drops are counted in
//!   interrupt context and logged from cooperative context according to
//!   [`OverflowPolicy`].
//!
//! # Example
//!
//! ```
//! use irqbridge_core::{
//!     DrainOutcome, EventType, HandlerFault, InterruptBridge, PlatformLayout, ResourceId,
//!     ScriptedHandler, SimulatedPlatform,
//! };
//! use std::any::Any;
//! use std::sync::atomic::{AtomicU32, Ordering};
//! use std::sync::Arc;
//!
//! struct LastResource(AtomicU32);
//!
//! impl ScriptedHandler for LastResource {
//!     fn invoke(&self, resource: ResourceId) -> Result<(), HandlerFault> {
//!         self.0.store(resource.raw(), Ordering::SeqCst);
//!         Ok(())
//!     }
//!     fn as_any(&self) -> &dyn Any {
//!         self
//!     }
//! }
//!
//! let platform = Arc::new(SimulatedPlatform::new(PlatformLayout::default()));
//! let bridge: Arc<InterruptBridge> = Arc::new(InterruptBridge::new(platform.clone()));
//!
//! let handler = Arc::new(LastResource(AtomicU32::new(0)));
//! bridge
//!     .set_scripted_handler(EventType::TimerMatch, Some(handler.clone()))
//!     .unwrap();
//! bridge.enable(EventType::TimerMatch, &[ResourceId(3)]).unwrap();
//!
//! platform.raise(&bridge, EventType::TimerMatch, ResourceId(3)).unwrap();
//! assert!(bridge.is_armed());
//!
//! let outcome = bridge.on_instruction_tick().unwrap();
//! assert!(matches!(outcome, DrainOutcome::Delivered(_)));
//! assert_eq!(handler.0.load(Ordering::SeqCst), 3);
//! assert!(!bridge.is_armed());
//! ```
//!
//! [`set_native_handler`]: InterruptBridge::set_native_handler
//! [`set_scripted_handler`]: InterruptBridge::set_scripted_handler

mod bridge;
mod config;
mod drain;
mod error;
mod handler;
mod platform;
mod queue;
mod sim;
mod slot;
mod types;

pub use bridge::{DispatchReport, InterruptBridge, ScriptedDelivery};
pub use config::{BridgeConfig, OverflowPolicy};
pub use drain::{DrainHook, DrainOutcome, HookState, HOOK_INTERVAL};
pub use error::{BridgeError, HandlerFault, PlatformError};
pub use handler::{native, NativeHandler, ScriptedHandler};
pub use platform::PlatformInterrupts;
pub use queue::{EventQueue, DEFAULT_QUEUE_CAPACITY, PUSH_SPINS};
pub use sim::{PlatformLayout, Raised, SimulatedPlatform};
pub use slot::{HandlerRegistry, HandlerSlot};
pub use types::{EventMask, EventType, QueueEntry, ResourceId};

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;
