//! Persistent namespaced key/value store for the textline engine.
//!
//! The store is a two-level map (namespace, then key) of JSON values,
//! backed by a single file that is rewritten wholesale by a debounced
//! flush. Three rules govern every access:
//!
//! - **Deep copies everywhere.** Values cross the store boundary as
//!   copies in both directions; callers can mutate what they get back
//!   without corrupting stored state.
//! - **Absence is an error.** [`Store::get`] without a default fails on a
//!   missing key instead of returning null, so "never set" and "set to
//!   an empty value" stay distinguishable.
//! - **One writer per namespace.** [`Store::lock_namespace`] hands out a
//!   strict-FIFO guard per namespace; the global count of
//!   granted-or-waiting acquisitions gates the flush, which only touches
//!   disk while the store is quiesced.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod lock;
mod store;

pub use error::{Result, StoreError};
pub use lock::NamespaceGuard;
pub use store::{Store, FLUSH_DEBOUNCE};
