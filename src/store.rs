//! The storage collaborator seam.
//!
//! The dashboard core never talks to a concrete database directly; it
//! consumes this trait. [`MemoryStore`] implements it with push-style
//! snapshot fan-out for tests and embedding; the REST bridge in
//! [`crate::remote`] implements it against a live document store.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Collection paths in the document store.
pub mod paths {
    pub const ORDERS: &str = "orders";
    pub const PRE_ORDERS: &str = "preorders";
    pub const CUSTOMERS: &str = "newCustomers";
    pub const PRODUCTS: &str = "cakes";
    pub const ORDER_COUNTS: &str = "metadata/orderCounts";
}

/// Store and transport failures surfaced to callers. Malformed *records*
/// are not errors (the normalizer defaults them); these cover the channel
/// itself.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("cannot reach store at {0}")]
    Unreachable(String),
    #[error("request to {0} timed out")]
    Timeout(String),
    #[error("store returned HTTP {0}")]
    Status(u16),
    #[error("malformed store response: {0}")]
    Decode(String),
    #[error("{0}")]
    Other(String),
}

/// A snapshot delivery: the full value at the subscribed path (`None` when
/// the path is empty), or a transport error.
pub type SnapshotEvent = Result<Option<Value>, StoreError>;

/// Callback invoked on every snapshot of a subscribed path.
pub type SnapshotHandler = Box<dyn Fn(SnapshotEvent) + Send + Sync>;

/// Handle for an active subscription. Dropping it (or calling
/// [`Subscription::unsubscribe`]) stops deliveries.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Subscription {
            cancel: Some(Box::new(cancel)),
        }
    }

    pub fn unsubscribe(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

/// The realtime document store as the core consumes it: live whole-value
/// subscriptions per path, one-shot fetches for auxiliary aggregates, and
/// value-level write/patch/delete.
#[async_trait]
pub trait RealtimeStore: Send + Sync {
    /// Subscribe to the value at `path`. The handler fires once with the
    /// current snapshot, then again on every change.
    fn subscribe(&self, path: &str, handler: SnapshotHandler) -> Subscription;

    /// Fetch the value at `path` once. Missing paths are `Ok(None)`.
    async fn fetch_once(&self, path: &str) -> Result<Option<Value>, StoreError>;

    /// Replace the value at `path`.
    async fn write(&self, path: &str, value: Value) -> Result<(), StoreError>;

    /// Merge the given keys into the object at `path`.
    async fn patch(&self, path: &str, value: Value) -> Result<(), StoreError>;

    /// Remove the value at `path`.
    async fn delete(&self, path: &str) -> Result<(), StoreError>;
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

struct MemoryInner {
    root: Mutex<Value>,
    subscribers: Mutex<HashMap<u64, (String, Arc<SnapshotHandler>)>>,
    next_id: AtomicU64,
}

/// In-memory [`RealtimeStore`] with synchronous snapshot fan-out: every
/// write/patch/delete immediately re-delivers each subscriber's path value.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<MemoryInner>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore {
            inner: Arc::new(MemoryInner {
                root: Mutex::new(Value::Object(serde_json::Map::new())),
                subscribers: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Seed a path without notifying subscribers; for test setup.
    pub fn seed(&self, path: &str, value: Value) {
        if let Ok(mut root) = self.inner.root.lock() {
            set_path(&mut root, path, value);
        }
    }

    fn snapshot_at(&self, path: &str) -> Option<Value> {
        let root = self.inner.root.lock().ok()?;
        get_path(&root, path)
    }

    fn notify_all(&self) {
        let targets: Vec<(String, Arc<SnapshotHandler>)> = match self.inner.subscribers.lock() {
            Ok(subs) => subs.values().cloned().collect(),
            Err(_) => return,
        };
        for (path, handler) in targets {
            let snapshot = self.snapshot_at(&path);
            handler(Ok(snapshot));
        }
    }
}

fn segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

fn get_path(root: &Value, path: &str) -> Option<Value> {
    let mut current = root;
    for segment in segments(path) {
        current = current.get(segment)?;
    }
    if current.is_null() {
        None
    } else {
        Some(current.clone())
    }
}

fn set_path(root: &mut Value, path: &str, value: Value) {
    let segments = segments(path);
    let mut current = root;
    for (i, segment) in segments.iter().enumerate() {
        if !current.is_object() {
            *current = Value::Object(serde_json::Map::new());
        }
        let Some(map) = current.as_object_mut() else {
            return;
        };
        if i == segments.len() - 1 {
            map.insert(segment.to_string(), value);
            return;
        }
        current = map
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(serde_json::Map::new()));
    }
}

fn patch_path(root: &mut Value, path: &str, value: Value) {
    if let Value::Object(updates) = value {
        for (key, update) in updates {
            set_path(root, &format!("{path}/{key}"), update);
        }
    } else {
        set_path(root, path, value);
    }
}

fn delete_path(root: &mut Value, path: &str) {
    let segments = segments(path);
    let Some((last, parents)) = segments.split_last() else {
        return;
    };
    let mut current = root;
    for segment in parents {
        match current.get_mut(*segment) {
            Some(next) => current = next,
            None => return,
        }
    }
    if let Some(map) = current.as_object_mut() {
        map.remove(*last);
    }
}

#[async_trait]
impl RealtimeStore for MemoryStore {
    fn subscribe(&self, path: &str, handler: SnapshotHandler) -> Subscription {
        let handler = Arc::new(handler);
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut subs) = self.inner.subscribers.lock() {
            subs.insert(id, (path.to_string(), handler.clone()));
        }

        // Initial delivery with the current snapshot.
        handler(Ok(self.snapshot_at(path)));

        let inner = self.inner.clone();
        Subscription::new(move || {
            if let Ok(mut subs) = inner.subscribers.lock() {
                subs.remove(&id);
            }
        })
    }

    async fn fetch_once(&self, path: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.snapshot_at(path))
    }

    async fn write(&self, path: &str, value: Value) -> Result<(), StoreError> {
        {
            let mut root = self
                .inner
                .root
                .lock()
                .map_err(|e| StoreError::Other(e.to_string()))?;
            set_path(&mut root, path, value);
        }
        self.notify_all();
        Ok(())
    }

    async fn patch(&self, path: &str, value: Value) -> Result<(), StoreError> {
        {
            let mut root = self
                .inner
                .root
                .lock()
                .map_err(|e| StoreError::Other(e.to_string()))?;
            patch_path(&mut root, path, value);
        }
        self.notify_all();
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<(), StoreError> {
        {
            let mut root = self
                .inner
                .root
                .lock()
                .map_err(|e| StoreError::Other(e.to_string()))?;
            delete_path(&mut root, path);
        }
        self.notify_all();
        Ok(())
    }
}
