//! Lua binding for the irqbridge interrupt bridge.
//!
//! Exposes the bridge to Lua scripts as a global `cpu` table and drains
//! queued events from an instruction-count hook, so Lua handlers run between
//! VM instructions on the thread executing the script.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                 ScriptHost (Rust)                    │
//! │  lua: Lua (mlua)                                     │
//! │  bridge: Arc<InterruptBridge>                        │
//! │                                                      │
//! │  globals:  cpu.*  ──► InterruptBridge registration   │
//! │            log()  ──► tracing                        │
//! │                                                      │
//! │  hook: every HOOK_INTERVAL instructions              │
//! │        └─ armed? ──► on_instruction_tick             │
//! │                       └─► LuaHandler ──► fn(id)      │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! # Example Lua Script
//!
//! ```lua
//! local count = 0
//! cpu.set_int_handler(cpu.INT_TMR_MATCH, function(id)
//!     if id == 0 then count = count + 1 end
//! end)
//! cpu.sei(cpu.INT_TMR_MATCH, 0)
//!
//! while count < 10 do end
//! cpu.cli(cpu.INT_TMR_MATCH, 0)
//! ```

mod cpu;
mod error;
mod handler;
mod hook;
mod host;

pub use cpu::{register_cpu_module, CPU_TABLE_NAME};
pub use error::LuaError;
pub use handler::LuaHandler;
pub use hook::{install_drain_hook, remove_drain_hook};
pub use host::{DrainSummary, ScriptHost};
