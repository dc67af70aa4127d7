//! The store proper: namespaced JSON data plus lock-aware persistence.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::error::{Result, StoreError};
use crate::lock::{LockTable, NamespaceGuard};

/// Quiet period after the last mutation before the store is flushed.
pub const FLUSH_DEBOUNCE: Duration = Duration::from_secs(5);

type Data = HashMap<String, HashMap<String, Value>>;

struct Inner {
    path: PathBuf,
    data: Mutex<Data>,
    locks: Mutex<LockTable>,
    /// Currently armed flush timer, replaced on every mutation.
    flush_timer: Mutex<Option<JoinHandle<()>>>,
}

/// Persistent namespaced key/value store.
///
/// Cloning is cheap and shares the same underlying data, lock table and
/// backing file. Mutations (re)arm a [`FLUSH_DEBOUNCE`] timer; when it
/// fires the whole store is written to disk, but only if no namespace
/// lock acquisition is outstanding anywhere. A skipped flush is not
/// retried on its own — the next mutation re-arms the timer. This is a
/// best-effort quiesced flush, not a transactional guarantee.
#[derive(Clone)]
pub struct Store {
    inner: Arc<Inner>,
}

impl Store {
    /// Open a store backed by `path`, loading existing contents.
    ///
    /// A missing or empty file yields an empty store; a file that exists
    /// but does not parse is an error, since silently discarding data is
    /// worse than refusing to start.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let data = match std::fs::read_to_string(&path) {
            Ok(contents) if contents.trim().is_empty() => Data::default(),
            Ok(contents) => serde_json::from_str(&contents)?,
            Err(err) if err.kind() == ErrorKind::NotFound => Data::default(),
            Err(err) => return Err(err.into()),
        };
        Ok(Self {
            inner: Arc::new(Inner {
                path,
                data: Mutex::new(data),
                locks: Mutex::new(LockTable::default()),
                flush_timer: Mutex::new(None),
            }),
        })
    }

    // =====================================================================
    // Data access
    // =====================================================================

    /// Deep copy of the value under `namespace:key`.
    ///
    /// A key that was never set is a hard [`StoreError::KeyNotFound`],
    /// which keeps "absent" distinguishable from "set to null".
    pub fn get(&self, namespace: &str, key: &str) -> Result<Value> {
        self.inner
            .data
            .lock()
            .get(namespace)
            .and_then(|ns| ns.get(key))
            .cloned()
            .ok_or_else(|| StoreError::KeyNotFound {
                namespace: namespace.to_string(),
                key: key.to_string(),
            })
    }

    /// Like [`Store::get`], but an absent key stores `default` and
    /// returns it, so a later `get` without a default succeeds.
    ///
    /// Initializing a default does not arm the flush timer on its own;
    /// it reaches disk together with the next mutation.
    pub fn get_or_init(&self, namespace: &str, key: &str, default: Value) -> Value {
        let mut data = self.inner.data.lock();
        let ns = data.entry(namespace.to_string()).or_default();
        match ns.get(key) {
            Some(existing) => existing.clone(),
            None => {
                ns.insert(key.to_string(), default.clone());
                default
            }
        }
    }

    /// Store a deep copy of `value` under `namespace:key`, arm the
    /// debounced flush, and hand the value back.
    pub fn set(&self, namespace: &str, key: &str, value: Value) -> Value {
        self.inner
            .data
            .lock()
            .entry(namespace.to_string())
            .or_default()
            .insert(key.to_string(), value.clone());
        self.schedule_flush();
        value
    }

    /// Remove `namespace:key`, returning the previous value if any.
    pub fn delete(&self, namespace: &str, key: &str) -> Option<Value> {
        let removed = self
            .inner
            .data
            .lock()
            .get_mut(namespace)
            .and_then(|ns| ns.remove(key));
        if removed.is_some() {
            self.schedule_flush();
        }
        removed
    }

    // =====================================================================
    // Namespace locking
    // =====================================================================

    /// Acquire the FIFO lock for `namespace`.
    ///
    /// The returned guard releases on drop. Acquisitions within one
    /// namespace are granted in strict arrival order; different
    /// namespaces never wait on each other.
    ///
    /// Cancel-safe: dropping this future mid-await withdraws the queue
    /// entry, even if the grant had already been sent.
    pub async fn lock_namespace(&self, namespace: &str) -> NamespaceGuard {
        let (id, rx) = self.inner.locks.lock().enqueue(namespace);
        let mut ticket = AcquireTicket {
            store: self,
            namespace,
            id,
            armed: true,
        };
        // The sender lives in the lock table, so this only fails if the
        // store is torn down mid-wait; proceeding is harmless then.
        let _ = rx.await;
        // No await between here and guard construction, so the ticket
        // can only fire while the acquisition is still in flight.
        ticket.armed = false;
        NamespaceGuard::new(self.clone(), namespace.to_string())
    }

    pub(crate) fn release_namespace(&self, namespace: &str) -> Result<()> {
        self.inner.locks.lock().release(namespace)
    }

    fn cancel_acquisition(&self, namespace: &str, id: u64) {
        self.inner.locks.lock().cancel(namespace, id);
    }

    /// Granted-or-waiting lock acquisitions across all namespaces.
    pub fn pending_acquisitions(&self) -> usize {
        self.inner.locks.lock().pending()
    }

    // =====================================================================
    // Persistence
    // =====================================================================

    /// (Re)arm the debounced flush timer. Must be called from within a
    /// tokio runtime, which is where all mutations happen.
    fn schedule_flush(&self) {
        let mut timer = self.inner.flush_timer.lock();
        if let Some(previous) = timer.take() {
            previous.abort();
        }
        let store = self.clone();
        *timer = Some(tokio::spawn(async move {
            tokio::time::sleep(FLUSH_DEBOUNCE).await;
            store.flush_if_quiesced();
        }));
    }

    /// Write the store to disk if no lock acquisition is outstanding.
    /// Otherwise skip silently; the next mutation re-arms the timer.
    fn flush_if_quiesced(&self) {
        let pending = self.pending_acquisitions();
        if pending != 0 {
            debug!(pending, "flush skipped, lock acquisitions outstanding");
            return;
        }
        if let Err(err) = self.flush_now() {
            error!(path = %self.inner.path.display(), error = %err, "store flush failed");
        }
    }

    /// Write the whole store to disk unconditionally.
    ///
    /// The debounce path goes through the quiesced check; this is for
    /// shutdown, where losing the last few seconds of writes is not
    /// acceptable.
    pub fn flush_now(&self) -> Result<()> {
        let serialized = serde_json::to_string(&*self.inner.data.lock())?;
        let tmp = self.inner.path.with_extension("tmp");
        std::fs::write(&tmp, serialized)?;
        std::fs::rename(&tmp, &self.inner.path)?;
        debug!(path = %self.inner.path.display(), "store persisted to disk");
        Ok(())
    }
}

/// In-flight acquisition. If the acquiring future is dropped before the
/// [`NamespaceGuard`] exists, the drop withdraws the queue entry so the
/// namespace cannot end up with a phantom holder.
struct AcquireTicket<'a> {
    store: &'a Store,
    namespace: &'a str,
    id: u64,
    armed: bool,
}

impl Drop for AcquireTicket<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.store.cancel_acquisition(self.namespace, self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn temp_store() -> (tempfile::TempDir, Store) {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path().join("db.json")).unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn get_without_default_fails_on_missing_key() {
        let (_dir, store) = temp_store();
        let err = store.get("login", "credentials").unwrap_err();
        assert!(matches!(err, StoreError::KeyNotFound { .. }));
        assert!(err.to_string().contains("login:credentials"));
    }

    #[tokio::test]
    async fn get_or_init_persists_the_default_exactly_once() {
        let (_dir, store) = temp_store();
        let first = store.get_or_init("fika", "balances", json!({}));
        assert_eq!(first, json!({}));
        // Now the key exists, so a bare get succeeds...
        assert_eq!(store.get("fika", "balances").unwrap(), json!({}));
        // ...and a different default no longer applies.
        let second = store.get_or_init("fika", "balances", json!({"x": 1}));
        assert_eq!(second, json!({}));
    }

    #[tokio::test]
    async fn set_then_get_returns_a_detached_copy() {
        let (_dir, store) = temp_store();
        let stored = json!({"participants": ["bob"]});
        store.set("fika", "sessions", stored.clone());

        let mut copy = store.get("fika", "sessions").unwrap();
        assert_eq!(copy, stored);
        copy["participants"] = json!([]);
        // Mutating the returned copy must not touch stored state.
        assert_eq!(store.get("fika", "sessions").unwrap(), stored);
    }

    #[tokio::test]
    async fn delete_returns_previous_value() {
        let (_dir, store) = temp_store();
        store.set("email", "addresses", json!({"a": "a@x"}));
        assert_eq!(
            store.delete("email", "addresses"),
            Some(json!({"a": "a@x"}))
        );
        assert_eq!(store.delete("email", "addresses"), None);
        assert!(store.get("email", "addresses").is_err());
    }

    #[tokio::test]
    async fn flush_now_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db.json");
        {
            let store = Store::open(&path).unwrap();
            store.set("login", "credentials", json!({"alice": "secret"}));
            store.flush_now().unwrap();
        }
        let reopened = Store::open(&path).unwrap();
        assert_eq!(
            reopened.get("login", "credentials").unwrap(),
            json!({"alice": "secret"})
        );
    }

    #[tokio::test]
    async fn missing_file_opens_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path().join("nonexistent.json")).unwrap();
        assert!(store.get("any", "thing").is_err());
    }

    #[tokio::test]
    async fn corrupt_file_refuses_to_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            Store::open(&path),
            Err(StoreError::Serialization(_))
        ));
    }

    #[tokio::test]
    async fn persisted_layout_is_namespace_key_value() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db.json");
        let store = Store::open(&path).unwrap();
        store.set("login", "credentials", json!({"alice": "pw"}));
        store.flush_now().unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["login"]["credentials"]["alice"], json!("pw"));
    }
}
