//! Handler capabilities for the native and scripted sides.

use crate::{HandlerFault, ResourceId};
use std::any::Any;
use std::sync::Arc;

/// A native interrupt handler.
///
/// Runs synchronously in interrupt context for every occurrence of the
/// event type it is registered for, whatever the resource. It must filter
/// on the [`ResourceId`] itself, return quickly and never block.
///
/// Chaining is explicit: keep the previous handler returned by
/// [`InterruptBridge::set_native_handler`](crate::InterruptBridge::set_native_handler)
/// and call it from the new one.
pub type NativeHandler = Arc<dyn Fn(ResourceId) + Send + Sync>;

/// A script-engine callable, invoked later from cooperative context.
///
/// The bridge treats it as an opaque capability. Engines implement it for
/// their own callable representation.
///
/// # Thread Safety
///
/// Handlers are stored in the bridge, which is shared with interrupt
/// context, so they must be `Send + Sync`. They are only ever *invoked*
/// from the cooperative context.
pub trait ScriptedHandler: Send + Sync {
    /// Invokes the handler for one queued occurrence.
    ///
    /// # Errors
    ///
    /// Returns [`HandlerFault`] when the script raised an error.
    fn invoke(&self, resource: ResourceId) -> Result<(), HandlerFault>;

    /// Concrete handler access, for engines that hand previous handlers
    /// back to scripts when chaining.
    fn as_any(&self) -> &dyn Any;
}

/// Wraps a closure as a [`NativeHandler`].
pub fn native<F>(f: F) -> NativeHandler
where
    F: Fn(ResourceId) + Send + Sync + 'static,
{
    Arc::new(f)
}
