//! Shared per-request session state.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;

/// Caller-supplied mutable state threaded through one request.
///
/// The state is a two-level map: namespace, then key. Each command only
/// ever touches its own namespace slice, but nested invocations spawned
/// during a request all see the same underlying map, so a change made by
/// an inner command is visible to its caller. Cloning the handle clones
/// the `Arc`, not the map — sharing is explicit at every call site.
///
/// Session state is never persisted; the transport echoes it back to the
/// caller when the request succeeds.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    inner: Arc<Mutex<HashMap<String, HashMap<String, Value>>>>,
}

impl SessionState {
    /// Empty session state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed session state from a prior request's echoed map.
    pub fn from_map(map: HashMap<String, HashMap<String, Value>>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(map)),
        }
    }

    /// Read one key from a namespace slice.
    pub fn get(&self, namespace: &str, key: &str) -> Option<Value> {
        self.inner.lock().get(namespace)?.get(key).cloned()
    }

    /// Write one key into a namespace slice.
    pub fn set(&self, namespace: &str, key: &str, value: Value) {
        self.inner
            .lock()
            .entry(namespace.to_string())
            .or_default()
            .insert(key.to_string(), value);
    }

    /// Remove one key from a namespace slice.
    pub fn delete(&self, namespace: &str, key: &str) {
        if let Some(slice) = self.inner.lock().get_mut(namespace) {
            slice.remove(key);
        }
    }

    /// Wipe the entire map, all namespaces included.
    pub fn clear(&self) {
        self.inner.lock().clear();
    }

    /// Deep-copy snapshot of the whole map, for echoing back to callers.
    pub fn snapshot(&self) -> HashMap<String, HashMap<String, Value>> {
        self.inner.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn set_then_get_roundtrips() {
        let state = SessionState::new();
        state.set("login", "username", json!("alice"));
        assert_eq!(state.get("login", "username"), Some(json!("alice")));
        assert_eq!(state.get("login", "password"), None);
        assert_eq!(state.get("email", "username"), None);
    }

    #[test]
    fn clones_share_the_same_map() {
        let state = SessionState::new();
        let alias = state.clone();
        alias.set("terminal", "color", json!(true));
        assert_eq!(state.get("terminal", "color"), Some(json!(true)));
    }

    #[test]
    fn clear_wipes_every_namespace() {
        let state = SessionState::new();
        state.set("a", "k", json!(1));
        state.set("b", "k", json!(2));
        state.clear();
        assert!(state.snapshot().is_empty());
    }

    #[test]
    fn snapshot_is_detached() {
        let state = SessionState::new();
        state.set("a", "k", json!(1));
        let mut snap = state.snapshot();
        snap.get_mut("a").unwrap().insert("k".into(), json!(99));
        assert_eq!(state.get("a", "k"), Some(json!(1)));
    }
}
