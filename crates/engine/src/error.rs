//! Error types for registration and dispatch.

use textline_store::StoreError;
use thiserror::Error;

/// Errors raised while building specs or registering them.
///
/// These all indicate misassembled command sets, so they surface at
/// bootstrap and fail the process rather than a request.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// A spec's name was empty.
    #[error("command must have a name")]
    EmptyName,

    /// Two specs were registered under the same name.
    #[error("command already registered: {name}")]
    DuplicateName {
        /// The contested name.
        name: String,
    },

    /// A lookup named a command nobody registered.
    #[error("command not registered: {name}")]
    UnknownCommand {
        /// The unknown name.
        name: String,
    },

    /// The literal rule text `help` is reserved for the reflective
    /// help handler every spec carries.
    #[error("'help' rule is reserved")]
    ReservedHelp,

    /// A `[...]` token appeared anywhere but at the end of a rule.
    #[error("variadic token must be last in rule '{rule}'")]
    VariadicNotLast {
        /// Source text of the offending rule.
        rule: String,
    },

    /// A utils lookup hit a command that exposes no utils, or utils of
    /// a different type than requested.
    #[error("command '{name}' does not provide the requested utils facility")]
    NoUtils {
        /// Name of the command that was asked.
        name: String,
    },
}

/// Errors crossing the dispatch boundary.
///
/// Variants for which [`Error::is_fatal`] returns true are
/// programming-invariant violations: they are never converted into an
/// error [`Response`](textline_core::Response) and abort the request
/// instead.
#[derive(Debug, Error)]
pub enum Error {
    /// A handler invoked its own command through the dispatcher. The
    /// namespace lock is not reentrant, so this would deadlock;
    /// self-recursion must use direct function calls.
    #[error("command '{namespace}' attempted to invoke itself")]
    SelfInvocation {
        /// The namespace that tried to re-enter itself.
        namespace: String,
    },

    /// A context accessor was used while no namespace was active.
    #[error("context is not running")]
    NotRunning,

    /// A store operation failed inside a context accessor.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl Error {
    /// Whether this error is a programming-invariant violation that must
    /// abort the request rather than become an error response.
    pub fn is_fatal(&self) -> bool {
        match self {
            Error::SelfInvocation { .. } | Error::NotRunning => true,
            Error::Store(StoreError::NoActiveLock { .. }) => true,
            Error::Store(_) => false,
        }
    }
}
