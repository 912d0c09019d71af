//! Instruction-count hook that drains the interrupt queue.
//!
//! The hook fires every [`HOOK_INTERVAL`] VM instructions for the lifetime
//! of the Lua state and returns immediately unless the bridge is armed.
//! Installing it once avoids having interrupt context touch the Lua state:
//! arming is a single atomic store on the bridge.

use irqbridge_core::{DrainHook, DrainOutcome, HOOK_INTERVAL};
use mlua::{HookTriggers, Lua, VmState};

/// Installs the drain hook on `lua`, replacing any existing hook.
///
/// A [`HandlerFault`](irqbridge_core::HandlerFault) returned by the tick is
/// raised as a Lua runtime error at the instruction that triggered the hook.
pub fn install_drain_hook<const N: usize>(lua: &Lua, hook: DrainHook<N>) {
    lua.set_hook(
        HookTriggers::new().every_nth_instruction(HOOK_INTERVAL),
        move |_lua, _debug| {
            if !hook.is_armed() {
                return Ok(VmState::Continue);
            }
            match hook.on_instruction_tick() {
                Ok(DrainOutcome::Reentrant) => {
                    tracing::trace!("drain hook re-entered, skipped");
                    Ok(VmState::Continue)
                }
                Ok(_) => Ok(VmState::Continue),
                Err(fault) => Err(mlua::Error::RuntimeError(fault.to_string())),
            }
        },
    );
    tracing::debug!(interval = HOOK_INTERVAL, "drain hook installed");
}

/// Removes the drain hook from `lua`.
pub fn remove_drain_hook(lua: &Lua) {
    lua.remove_hook();
    tracing::debug!("drain hook removed");
}
