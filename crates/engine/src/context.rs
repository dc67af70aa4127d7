//! Per-invocation execution context and the dispatch loop.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::time::timeout;
use tracing::{debug, error, warn};

use textline_core::{Response, SessionState};
use textline_store::Store;

use crate::error::Error;
use crate::registry::CommandRegistry;

/// Execution deadline for a single command invocation.
pub const COMMAND_TIMEOUT: Duration = Duration::from_secs(60);

/// Handle binding a caller's session state and the active namespace to
/// the store and registry for the duration of one invocation.
///
/// A fresh context has no active namespace; the first
/// [`run_command`](Context::run_command) call claims it. When a running
/// handler dispatches a further command, a child context is spawned
/// sharing the same store, registry and session handle but carrying its
/// own namespace, so the nested invocation gets a clean storage scope
/// while caller-visible session state stays shared.
///
/// All data accessors operate on the active namespace and return
/// [`Error::NotRunning`] outside the running window. Contexts live for
/// one request only.
#[derive(Clone)]
pub struct Context {
    registry: Arc<CommandRegistry>,
    store: Store,
    session: SessionState,
    namespace: Option<String>,
}

impl Context {
    /// Create a top-level context for one incoming request.
    pub fn new(registry: Arc<CommandRegistry>, store: Store, session: SessionState) -> Self {
        Self {
            registry,
            store,
            session,
            namespace: None,
        }
    }

    /// The registry this context dispatches against.
    pub fn registry(&self) -> &Arc<CommandRegistry> {
        &self.registry
    }

    /// The shared session-state handle for this request.
    pub fn session(&self) -> &SessionState {
        &self.session
    }

    /// The active namespace, if the context is running.
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    fn running_namespace(&self) -> Result<&str, Error> {
        self.namespace.as_deref().ok_or(Error::NotRunning)
    }

    // =====================================================================
    // Session-state accessors (in-memory, never persisted)
    // =====================================================================

    /// Read a key from this command's session-state slice.
    pub fn client_data(&self, key: &str) -> Result<Option<Value>, Error> {
        Ok(self.session.get(self.running_namespace()?, key))
    }

    /// Write a key into this command's session-state slice.
    pub fn set_client_data(&self, key: &str, value: Value) -> Result<(), Error> {
        self.session.set(self.running_namespace()?, key, value);
        Ok(())
    }

    /// Remove a key from this command's session-state slice.
    pub fn delete_client_data(&self, key: &str) -> Result<(), Error> {
        self.session.delete(self.running_namespace()?, key);
        Ok(())
    }

    /// Wipe the whole session-state map, every namespace included.
    pub fn delete_all_client_data(&self) -> Result<(), Error> {
        self.running_namespace()?;
        self.session.clear();
        Ok(())
    }

    // =====================================================================
    // Store accessors (persistent, scoped to the active namespace)
    // =====================================================================

    /// Read a persistent key. Absence is an error, not a null.
    pub fn data(&self, key: &str) -> Result<Value, Error> {
        Ok(self.store.get(self.running_namespace()?, key)?)
    }

    /// Read a persistent key, storing and returning `default` if absent.
    pub fn data_or_init(&self, key: &str, default: Value) -> Result<Value, Error> {
        Ok(self
            .store
            .get_or_init(self.running_namespace()?, key, default))
    }

    /// Write a persistent key, returning the stored value.
    pub fn set_data(&self, key: &str, value: Value) -> Result<Value, Error> {
        Ok(self.store.set(self.running_namespace()?, key, value))
    }

    /// Remove a persistent key, returning the previous value if any.
    pub fn delete_data(&self, key: &str) -> Result<Option<Value>, Error> {
        Ok(self.store.delete(self.running_namespace()?, key))
    }

    // =====================================================================
    // Dispatch
    // =====================================================================

    /// Dispatch a raw command line under the standard deadline.
    pub async fn run_command(&mut self, line: &str) -> Result<Response, Error> {
        self.run_command_with_deadline(line, COMMAND_TIMEOUT).await
    }

    /// Dispatch a raw command line, racing the handler against
    /// `deadline`.
    ///
    /// Recoverable failures come back as `Ok` error responses; an `Err`
    /// is a programming-invariant violation and must abort the request.
    /// On deadline the handler is abandoned, not cancelled: it keeps
    /// running detached and any store effects it produces land after the
    /// namespace lock has been released. That consistency gap is part of
    /// the design.
    pub async fn run_command_with_deadline(
        &mut self,
        line: &str,
        deadline: Duration,
    ) -> Result<Response, Error> {
        let mut parts = line.split_whitespace();
        let name = parts.next().unwrap_or("").to_string();
        let args: Vec<String> = parts.map(str::to_string).collect();

        let spec = match self.registry.lookup(&name) {
            Ok(spec) => spec,
            Err(_) => {
                return Ok(Response::error_with(
                    format!("Command not found: {name}"),
                    Value::String(name),
                ));
            }
        };

        // A command may never invoke itself through the dispatcher: the
        // namespace lock is not reentrant and would deadlock below.
        if self.namespace.as_deref() == Some(name.as_str()) {
            return Err(Error::SelfInvocation { namespace: name });
        }

        // Top-level call: claim this context. Nested call (we already
        // have a namespace, so a handler is invoking us): spawn a child
        // with its own namespace over the same store and session.
        let run_ctx = if self.namespace.is_none() {
            self.namespace = Some(name.clone());
            self.clone()
        } else {
            Context {
                registry: Arc::clone(&self.registry),
                store: self.store.clone(),
                session: self.session.clone(),
                namespace: Some(name.clone()),
            }
        };

        debug!(command = %name, "dispatching");

        // Held for the whole invocation and released on every exit path,
        // including deadline abandonment.
        let _guard = self.store.lock_namespace(&name).await;

        let task = tokio::spawn({
            let spec = Arc::clone(&spec);
            async move { spec.run(run_ctx, args).await }
        });

        let response = match timeout(deadline, task).await {
            // Deadline elapsed: dropping the join handle detaches the
            // task rather than cancelling it.
            Err(_) => {
                warn!(command = %name, "command execution timed out");
                Response::error(format!(
                    "Error running command: {name}\nDetails: command execution timed out"
                ))
            }
            // The handler panicked.
            Ok(Err(join_err)) => {
                error!(command = %name, error = %join_err, "handler panicked");
                Response::error(format!("Error running command: {name}\nDetails: {join_err}"))
            }
            Ok(Ok(Ok(response))) => response,
            Ok(Ok(Err(fault))) => match fault.downcast::<Error>() {
                // Invariant violations are re-raised, never converted.
                Ok(engine_err) if engine_err.is_fatal() => return Err(engine_err),
                Ok(engine_err) => {
                    error!(command = %name, error = %engine_err, "handler failed");
                    Response::error(format!(
                        "Error running command: {name}\nDetails: {engine_err}"
                    ))
                }
                Err(other) => {
                    error!(command = %name, error = format!("{other:#}").as_str(), "handler failed");
                    Response::error(format!("Error running command: {name}\nDetails: {other:#}"))
                }
            },
        };
        Ok(response)
    }
}
