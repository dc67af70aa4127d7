//! Command dispatch for the textline engine.
//!
//! A command line is a name followed by space-separated arguments. The
//! [`CommandRegistry`] owns one [`CommandSpec`] per name; each spec owns
//! an ordered list of textual syntax rules mapping argument shapes to
//! handlers. Dispatch ([`Context::run_command`]) resolves the name,
//! acquires the namespace lock, matches the arguments against the spec's
//! rules in registration order, and races the winning handler against an
//! execution deadline.
//!
//! Recoverable failures (unknown command, no matching rule, handler
//! errors, deadline exceeded) are normalized into error [`Response`]s so
//! the transport never sees a raw fault. Programming-invariant
//! violations (self-invocation, using a context outside a running
//! handler) are [`Error`]s that abort the request instead.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod context;
mod error;
mod registry;
mod rule;
mod spec;

pub use context::{Context, COMMAND_TIMEOUT};
pub use error::{Error, RegistryError};
pub use registry::CommandRegistry;
pub use rule::{Args, Capture, Token};
pub use spec::{CommandSpec, Handler, HandlerFuture};

pub use textline_core::{Response, SessionState};
pub use textline_store::Store;
