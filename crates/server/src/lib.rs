//! HTTP transport for the textline command engine.
//!
//! The server is stateless with respect to clients: each request
//! carries the caller's session-state blob, the engine runs the command
//! against it, and the (possibly updated) blob travels back in the
//! reply. Persistent state lives in the JSON-backed store only.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod http;

pub use config::Config;
pub use http::{router, AppState};
