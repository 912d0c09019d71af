//! Lua state wired to an interrupt bridge.

use crate::cpu::register_cpu_module;
use crate::error::LuaError;
use crate::handler::LuaHandler;
use crate::hook::{install_drain_hook, remove_drain_hook};
use irqbridge_core::{DrainOutcome, EventType, InterruptBridge, DEFAULT_QUEUE_CAPACITY};
use mlua::Lua;
use std::path::Path;
use std::sync::Arc;

/// Counts from [`ScriptHost::drain_pending`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainSummary {
    /// Entries delivered to a handler.
    pub delivered: usize,
    /// Stale entries discarded.
    pub discarded: usize,
}

/// Owns a Lua state with the `cpu` table, the `log` global and the drain
/// hook installed.
///
/// Lua handlers registered through this host are cleared from the bridge
/// when the host is dropped. Handlers installed by another host or from
/// Rust are left in place.
pub struct ScriptHost<const N: usize = DEFAULT_QUEUE_CAPACITY> {
    lua: Lua,
    bridge: Arc<InterruptBridge<N>>,
}

impl<const N: usize> ScriptHost<N> {
    /// Creates a host for `bridge`.
    ///
    /// # Errors
    ///
    /// Returns [`LuaError::Runtime`] if global registration fails.
    pub fn new(bridge: Arc<InterruptBridge<N>>) -> Result<Self, LuaError> {
        let lua = Lua::new();
        register_log(&lua)?;
        register_cpu_module(&lua, Arc::clone(&bridge))?;
        install_drain_hook(&lua, bridge.drain_hook());
        Ok(Self { lua, bridge })
    }

    /// Runs a chunk of Lua source.
    ///
    /// # Errors
    ///
    /// Syntax and runtime errors, including handler failures raised by the
    /// drain hook while the chunk runs.
    pub fn exec(&self, source: &str) -> Result<(), LuaError> {
        self.lua.load(source).set_name("=chunk").exec()?;
        Ok(())
    }

    /// Runs a Lua script file.
    ///
    /// # Errors
    ///
    /// [`LuaError::ScriptNotFound`] if the file cannot be read, otherwise
    /// as [`exec`](Self::exec).
    pub fn exec_file(&self, path: impl AsRef<Path>) -> Result<(), LuaError> {
        let path = path.as_ref();
        let script = std::fs::read_to_string(path)
            .map_err(|_| LuaError::ScriptNotFound(path.display().to_string()))?;
        tracing::info!(path = %path.display(), "running script");
        self.lua
            .load(&script)
            .set_name(format!("@{}", path.display()))
            .exec()?;
        Ok(())
    }

    /// Delivers every queued entry without running any chunk.
    ///
    /// Used after a script returns, once event sources have stopped.
    ///
    /// # Errors
    ///
    /// [`LuaError::Handler`] on the first failing handler; entries behind
    /// it stay queued.
    pub fn drain_pending(&self) -> Result<DrainSummary, LuaError> {
        let mut summary = DrainSummary::default();
        while self.bridge.is_armed() {
            match self.bridge.on_instruction_tick()? {
                DrainOutcome::Delivered(_) => summary.delivered += 1,
                DrainOutcome::Discarded(_) => summary.discarded += 1,
                DrainOutcome::Disarmed | DrainOutcome::Empty => break,
                DrainOutcome::Reentrant => break,
            }
        }
        Ok(summary)
    }

    /// The bridge this host drains.
    #[must_use]
    pub fn bridge(&self) -> &Arc<InterruptBridge<N>> {
        &self.bridge
    }

    /// The underlying Lua state.
    #[must_use]
    pub fn lua(&self) -> &Lua {
        &self.lua
    }
}

impl<const N: usize> Drop for ScriptHost<N> {
    fn drop(&mut self) {
        remove_drain_hook(&self.lua);
        for event in EventType::ALL {
            let ours = self.bridge.scripted_handler(event).is_some_and(|h| {
                h.as_any()
                    .downcast_ref::<LuaHandler>()
                    .is_some_and(|lh| lh.belongs_to(&self.lua))
            });
            if ours {
                // Cannot fail: a handler is only present for supported events.
                let _ = self.bridge.set_scripted_handler(event, None);
            }
        }
    }
}

impl<const N: usize> std::fmt::Debug for ScriptHost<N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptHost")
            .field("bridge", &self.bridge)
            .finish_non_exhaustive()
    }
}

/// Registers `log(level, msg)`, routed to tracing.
fn register_log(lua: &Lua) -> mlua::Result<()> {
    let log_fn = lua.create_function(|_, (level, msg): (String, String)| {
        match level.to_lowercase().as_str() {
            "trace" => tracing::trace!("[lua] {}", msg),
            "debug" => tracing::debug!("[lua] {}", msg),
            "info" => tracing::info!("[lua] {}", msg),
            "warn" => tracing::warn!("[lua] {}", msg),
            "error" => tracing::error!("[lua] {}", msg),
            _ => tracing::info!("[lua] {}", msg),
        }
        Ok(())
    })?;
    lua.globals().set("log", log_fn)
}
