//! Error types for the Lua binding.

use irqbridge_core::{BridgeError, HandlerFault};
use thiserror::Error;

/// Errors that can occur while hosting Lua scripts on the bridge.
#[derive(Debug, Error)]
pub enum LuaError {
    /// Lua runtime error.
    #[error("lua error: {0}")]
    Runtime(#[from] mlua::Error),

    /// Script file not found.
    #[error("script not found: {0}")]
    ScriptNotFound(String),

    /// Bridge rejected an operation.
    #[error("bridge error: {0}")]
    Bridge(#[from] BridgeError),

    /// Scripted handler failed while draining outside a running chunk.
    #[error(transparent)]
    Handler(#[from] HandlerFault),
}

/// Human-readable message for a Lua error, without callback wrapping.
pub(crate) fn format_lua_error(err: &mlua::Error) -> String {
    match err {
        mlua::Error::RuntimeError(msg) => msg.clone(),
        mlua::Error::CallbackError { cause, .. } => format_lua_error(cause),
        mlua::Error::SyntaxError {
            message,
            incomplete_input: _,
        } => format!("compile error: {message}"),
        _ => format!("{err}"),
    }
}
