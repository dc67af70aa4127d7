//! Core types for the textline engine.
//!
//! This crate is the leaf of the workspace: it defines the [`Response`]
//! envelope every command produces and the [`SessionState`] handle that
//! carries caller-visible state through a request. Everything else
//! (store, registry, dispatch) builds on these two types.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod response;
mod session;

pub use response::Response;
pub use session::SessionState;
