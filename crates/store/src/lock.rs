//! Per-namespace FIFO mutual exclusion.
//!
//! The lock table keeps one queue of waiters per namespace. The waiter at
//! the front of a queue is the current holder; everyone behind it waits on
//! a oneshot grant. Release pops the holder and grants the next waiter, so
//! acquisitions are served in strict arrival order. A single `pending`
//! counter tracks granted-or-waiting acquisitions across all namespaces;
//! the store consults it to decide whether a debounced flush may run.
//!
//! Acquisition is cancel-safe: every waiter carries an id, and an
//! acquiring future that is dropped before it produced a guard withdraws
//! its own entry (releasing the lock if it had already been granted), so
//! an abandoned request can never wedge a namespace or pin the pending
//! count above zero.

use std::collections::{HashMap, VecDeque};

use tokio::sync::oneshot;
use tracing::warn;

use crate::error::{Result, StoreError};
use crate::store::Store;

/// One queued acquisition. `grant` is `Some` until the waiter is granted;
/// the front entry of a queue has always been granted already. The id
/// lets an abandoned acquirer find and remove its own entry.
struct Waiter {
    id: u64,
    grant: Option<oneshot::Sender<()>>,
}

/// Queues of waiters keyed by namespace, plus the global pending count.
#[derive(Default)]
pub(crate) struct LockTable {
    queues: HashMap<String, VecDeque<Waiter>>,
    pending: usize,
    next_id: u64,
}

impl LockTable {
    /// Enqueue an acquisition for `namespace`. The returned receiver
    /// resolves when the acquisition is granted; if the queue was empty
    /// the grant is immediate. The id identifies this entry to
    /// [`LockTable::cancel`].
    pub(crate) fn enqueue(&mut self, namespace: &str) -> (u64, oneshot::Receiver<()>) {
        self.pending += 1;
        self.next_id += 1;
        let id = self.next_id;
        let (tx, rx) = oneshot::channel();
        let queue = self.queues.entry(namespace.to_string()).or_default();
        queue.push_back(Waiter {
            id,
            grant: Some(tx),
        });
        if queue.len() == 1 {
            let grant = queue[0].grant.take().expect("fresh waiter has a grant");
            // Receiver is still owned by the caller at this point, so the
            // send can only fail if the whole store is being torn down.
            let _ = grant.send(());
        }
        (id, rx)
    }

    /// Withdraw an acquisition that never became a guard because the
    /// acquiring future was dropped mid-await.
    ///
    /// A waiter that was still queued is simply removed. A waiter at the
    /// front has already been granted, which makes it the current
    /// holder; withdrawing it is a full release so the next waiter gets
    /// the lock. An id that is no longer present was already reaped by
    /// the dead-waiter skip in [`LockTable::release`].
    pub(crate) fn cancel(&mut self, namespace: &str, id: u64) {
        let Some(queue) = self.queues.get_mut(namespace) else {
            return;
        };
        let Some(position) = queue.iter().position(|waiter| waiter.id == id) else {
            return;
        };
        if position == 0 {
            // Queue is known non-empty, so release cannot fail here.
            let _ = self.release(namespace);
        } else {
            let _ = queue.remove(position);
            self.pending -= 1;
        }
    }

    /// Release the current holder for `namespace` and grant the next
    /// waiter in arrival order. Waiters whose receiver has been dropped
    /// (the acquiring future was abandoned) are skipped and their pending
    /// slot reclaimed.
    pub(crate) fn release(&mut self, namespace: &str) -> Result<()> {
        let queue = self
            .queues
            .get_mut(namespace)
            .ok_or_else(|| StoreError::NoActiveLock {
                namespace: namespace.to_string(),
            })?;
        if queue.pop_front().is_none() {
            return Err(StoreError::NoActiveLock {
                namespace: namespace.to_string(),
            });
        }
        self.pending -= 1;

        while let Some(next) = queue.front_mut() {
            let grant = next.grant.take().expect("queued waiter has a grant");
            if grant.send(()).is_ok() {
                break;
            }
            // Dead waiter: acquirer went away before being granted.
            queue.pop_front();
            self.pending -= 1;
        }
        if queue.is_empty() {
            self.queues.remove(namespace);
        }
        Ok(())
    }

    /// Total granted-or-waiting acquisitions across all namespaces.
    pub(crate) fn pending(&self) -> usize {
        self.pending
    }
}

/// Exclusive hold on one namespace, released on drop.
///
/// The guard is handed out by [`Store::lock_namespace`] and releases the
/// namespace on every exit path, including panics and abandoned deadline
/// races.
#[must_use = "dropping the guard releases the namespace lock"]
pub struct NamespaceGuard {
    store: Store,
    namespace: String,
}

impl NamespaceGuard {
    pub(crate) fn new(store: Store, namespace: String) -> Self {
        Self { store, namespace }
    }

    /// The namespace this guard holds.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }
}

impl Drop for NamespaceGuard {
    fn drop(&mut self) {
        if let Err(err) = self.store.release_namespace(&self.namespace) {
            // Guard construction guarantees a queue entry, so this only
            // fires if release was somehow called twice.
            warn!(namespace = %self.namespace, error = %err, "namespace release failed");
            debug_assert!(false, "namespace release failed: {err}");
        }
    }
}
