//! Lua functions as scripted interrupt handlers.

use crate::error::format_lua_error;
use irqbridge_core::{EventType, HandlerFault, ResourceId, ScriptedHandler};
use mlua::{Function, Lua};
use std::any::Any;
use std::sync::atomic::{AtomicU64, Ordering};

/// Identifies the Lua state a handler was created on.
///
/// Stored as app data on the state the first time a handler is created
/// there.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct StateId(u64);

impl StateId {
    fn of(lua: &Lua) -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        if let Some(id) = lua.app_data_ref::<StateId>() {
            return *id;
        }
        let id = StateId(NEXT.fetch_add(1, Ordering::Relaxed));
        lua.set_app_data(id);
        id
    }
}

/// A [`ScriptedHandler`] backed by a Lua function.
///
/// The function is called as `handler(resource_id)` from the drain hook,
/// i.e. on the thread that runs the Lua state.
///
/// `Send + Sync` comes from mlua's `send` feature. Interrupt context only
/// clones and drops the `Arc` holding it.
pub struct LuaHandler {
    event: EventType,
    func: Function,
    state: StateId,
}

impl LuaHandler {
    /// Wraps `func`, created on `lua`, as the handler for `event`.
    #[must_use]
    pub fn new(lua: &Lua, event: EventType, func: Function) -> Self {
        Self {
            event,
            func,
            state: StateId::of(lua),
        }
    }

    /// Whether this handler was created on `lua`.
    #[must_use]
    pub fn belongs_to(&self, lua: &Lua) -> bool {
        lua.app_data_ref::<StateId>()
            .is_some_and(|id| *id == self.state)
    }

    /// The Lua function, for handing back to scripts when chaining.
    #[must_use]
    pub fn function(&self) -> &Function {
        &self.func
    }

    /// Event type this handler was registered for.
    #[must_use]
    pub fn event(&self) -> EventType {
        self.event
    }
}

impl ScriptedHandler for LuaHandler {
    fn invoke(&self, resource: ResourceId) -> Result<(), HandlerFault> {
        self.func
            .call::<()>(resource.raw())
            .map_err(|e| HandlerFault::new(self.event, resource, format_lua_error(&e)))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl std::fmt::Debug for LuaHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LuaHandler")
            .field("event", &self.event)
            .field("state", &self.state.0)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mlua::Lua;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn handler_is_send_and_sync() {
        assert_send_sync::<LuaHandler>();
    }

    #[test]
    fn belongs_only_to_creating_state() {
        let a = Lua::new();
        let b = Lua::new();
        let func: Function = a.load("return function() end").eval().unwrap();
        let handler = LuaHandler::new(&a, EventType::TimerMatch, func);
        assert!(handler.belongs_to(&a));
        assert!(!handler.belongs_to(&b));

        // A state that created its own handler still does not own this one.
        let other: Function = b.load("return function() end").eval().unwrap();
        let _ = LuaHandler::new(&b, EventType::TimerMatch, other);
        assert!(!handler.belongs_to(&b));
    }

    #[test]
    fn invoke_passes_resource_id() {
        let lua = Lua::new();
        let func: Function = lua
            .load("return function(id) last_id = id end")
            .eval()
            .unwrap();
        let handler = LuaHandler::new(&lua, EventType::TimerMatch, func);

        handler.invoke(ResourceId(3)).unwrap();
        assert_eq!(lua.globals().get::<u32>("last_id").unwrap(), 3);
    }

    #[test]
    fn lua_error_becomes_handler_fault() {
        let lua = Lua::new();
        let func: Function = lua
            .load(r#"return function(id) error("pin " .. id .. " stuck", 0) end"#)
            .eval()
            .unwrap();
        let handler = LuaHandler::new(&lua, EventType::GpioPosEdge, func);

        let fault = handler.invoke(ResourceId(12)).unwrap_err();
        assert_eq!(fault.event, EventType::GpioPosEdge);
        assert_eq!(fault.resource, ResourceId(12));
        assert!(fault.message.contains("pin 12 stuck"), "got: {}", fault.message);
    }

    #[test]
    fn as_any_recovers_concrete_handler() {
        let lua = Lua::new();
        let func: Function = lua.load("return function() end").eval().unwrap();
        let handler: std::sync::Arc<dyn ScriptedHandler> =
            std::sync::Arc::new(LuaHandler::new(&lua, EventType::UartRx, func));
        let concrete = handler
            .as_any()
            .downcast_ref::<LuaHandler>()
            .expect("LuaHandler");
        assert_eq!(concrete.event(), EventType::UartRx);
    }
}
