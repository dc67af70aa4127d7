//! Textline - text-command execution engine
//!
//! Clients submit a single line of text; the engine routes it to a
//! registered handler by matching the argument list against each
//! command's syntax rules, runs the handler under a per-command FIFO
//! lock, and persists command state in a debounced JSON-backed store.
//!
//! # Quick Start
//!
//! ```ignore
//! use textline::{CommandRegistry, Context, SessionState, Store};
//!
//! let store = Store::open("db.json")?;
//! let mut registry = CommandRegistry::new();
//! textline::register_all(&mut registry)?;
//!
//! let mut ctx = Context::new(registry.into(), store, SessionState::new());
//! let response = ctx.run_command("echo hello world").await?;
//! ```
//!
//! # Architecture
//!
//! Dispatch, matching and locking live in [`textline_engine`]; the
//! built-in command set in [`textline_commands`]. The HTTP transport is
//! the separate `textline-server` binary crate.

// Re-export the public API from the engine
pub use textline_engine::*;

pub use textline_commands::register_all;
