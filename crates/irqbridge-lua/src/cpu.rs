//! The `cpu` global table.
//!
//! ```lua
//! local prev = cpu.set_int_handler(cpu.INT_TMR_MATCH, function(id)
//!     if id == 1 then ticks = ticks + 1 end
//!     if prev then prev(id) end
//! end)
//! cpu.sei(cpu.INT_TMR_MATCH, 0, 1)
//! ```

use crate::handler::LuaHandler;
use irqbridge_core::{BridgeError, EventType, InterruptBridge, ResourceId, ScriptedHandler};
use mlua::{Function, Lua, Table, Variadic};
use std::fmt::Display;
use std::sync::Arc;

/// Global table name.
pub const CPU_TABLE_NAME: &str = "cpu";

/// Registers the `cpu` table for `bridge` on `lua`.
///
/// Functions:
/// - `cpu.set_int_handler(id, fn|nil) -> prev|nil`
/// - `cpu.get_int_handler(id) -> fn|nil`
/// - `cpu.sei() -> prev`: CPU-wide switch on
/// - `cpu.sei(id) -> prev`: event type on
/// - `cpu.sei(id, res, ...)`: lines on
/// - `cpu.cli(...)`: same forms, switching off
/// - `cpu.get_int_flag(id, res [, clear]) -> bool`
/// - `cpu.gpio(port, pin) -> res`
///
/// Plus one `INT_*` constant per event type.
///
/// # Errors
///
/// Returns an error if table or function creation fails.
pub fn register_cpu_module<const N: usize>(
    lua: &Lua,
    bridge: Arc<InterruptBridge<N>>,
) -> mlua::Result<Table> {
    let cpu = ensure_cpu_table(lua)?;

    for event in EventType::ALL {
        cpu.set(event.constant_name(), event.code())?;
    }

    // cpu.set_int_handler(id, fn|nil) -> prev|nil
    let b = Arc::clone(&bridge);
    let set_handler = lua.create_function(move |lua, (id, func): (i64, Option<Function>)| {
        let event = event_from_code(id)?;
        let handler =
            func.map(|f| Arc::new(LuaHandler::new(lua, event, f)) as Arc<dyn ScriptedHandler>);
        let prev = b.set_scripted_handler(event, handler).map_err(runtime)?;
        Ok(prev.as_deref().and_then(lua_function))
    })?;
    cpu.set("set_int_handler", set_handler)?;

    // cpu.get_int_handler(id) -> fn|nil
    let b = Arc::clone(&bridge);
    let get_handler = lua.create_function(move |_, id: i64| {
        let event = event_from_code(id)?;
        Ok(b.scripted_handler(event).as_deref().and_then(lua_function))
    })?;
    cpu.set("get_int_handler", get_handler)?;

    // cpu.sei() -> prev | cpu.sei(id) -> prev | cpu.sei(id, res, ...)
    let b = Arc::clone(&bridge);
    let sei = lua.create_function(move |_, args: Variadic<i64>| match args.split_first() {
        None => Ok(Some(b.enable_cpu())),
        Some((&id, [])) => {
            let event = event_from_code(id)?;
            b.enable_global(event).map(Some).map_err(runtime)
        }
        Some((&id, resources)) => {
            let event = event_from_code(id)?;
            b.enable(event, &resource_ids(resources)?)
                .map_err(runtime)?;
            Ok(None)
        }
    })?;
    cpu.set("sei", sei)?;

    // cpu.cli() -> prev | cpu.cli(id) -> prev | cpu.cli(id, res, ...)
    let b = Arc::clone(&bridge);
    let cli = lua.create_function(move |_, args: Variadic<i64>| match args.split_first() {
        None => Ok(Some(b.disable_cpu())),
        Some((&id, [])) => {
            let event = event_from_code(id)?;
            b.disable_global(event).map(Some).map_err(runtime)
        }
        Some((&id, resources)) => {
            let event = event_from_code(id)?;
            b.disable(event, &resource_ids(resources)?)
                .map_err(runtime)?;
            Ok(None)
        }
    })?;
    cpu.set("cli", cli)?;

    // cpu.get_int_flag(id, res [, clear=true]) -> bool
    let b = bridge;
    let get_flag = lua.create_function(move |_, (id, res, clear): (i64, i64, Option<bool>)| {
        let event = event_from_code(id)?;
        let resource = resource_id(res)?;
        b.get_flag(event, resource, clear.unwrap_or(true))
            .map_err(runtime)
    })?;
    cpu.set("get_int_flag", get_flag)?;

    // cpu.gpio(port, pin) -> res
    let gpio = lua.create_function(|_, (port, pin): (u16, u8)| Ok(ResourceId::gpio(port, pin).raw()))?;
    cpu.set("gpio", gpio)?;

    Ok(cpu)
}

/// Returns the `cpu` table, creating it if missing.
fn ensure_cpu_table(lua: &Lua) -> mlua::Result<Table> {
    match lua.globals().get::<Table>(CPU_TABLE_NAME) {
        Ok(table) => Ok(table),
        Err(_) => {
            let table = lua.create_table()?;
            lua.globals().set(CPU_TABLE_NAME, table.clone())?;
            Ok(table)
        }
    }
}

fn event_from_code(code: i64) -> mlua::Result<EventType> {
    EventType::from_code(code).ok_or_else(|| runtime(BridgeError::UnknownEvent(code.to_string())))
}

fn resource_id(raw: i64) -> mlua::Result<ResourceId> {
    u32::try_from(raw)
        .map(ResourceId)
        .map_err(|_| mlua::Error::RuntimeError(format!("resource id out of range: {raw}")))
}

fn resource_ids(raw: &[i64]) -> mlua::Result<Vec<ResourceId>> {
    raw.iter().map(|&r| resource_id(r)).collect()
}

/// The Lua function behind a scripted handler, if it came from Lua.
fn lua_function(handler: &dyn ScriptedHandler) -> Option<Function> {
    handler
        .as_any()
        .downcast_ref::<LuaHandler>()
        .map(|h| h.function().clone())
}

fn runtime(err: impl Display) -> mlua::Error {
    mlua::Error::RuntimeError(err.to_string())
}
