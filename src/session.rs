//! Dashboard session: live collections reduced from store snapshots.
//!
//! The store delivers whole-collection snapshots; each one fully replaces
//! the corresponding derived list (no incremental merge — recomputation is
//! idempotent, and with a single producer last-write-wins cannot conflict).
//! A bounded timeout forces the loading flag off if the store never
//! delivers, so the dashboard settles on an empty state instead of hanging.

use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::normalize::{
    normalize_customer, normalize_order, normalize_pre_order, normalize_product,
};
use crate::records::{CustomerRecord, DerivedOrder, DerivedPreOrder, ProductRecord};
use crate::store::{paths, RealtimeStore, SnapshotEvent, SnapshotHandler, StoreError, Subscription};
use crate::timecode;
use crate::value_f64;

/// How long to wait for initial snapshots before declaring loading done.
const DEFAULT_LOADING_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// When set, orders promised earlier than this many days ago are dropped
    /// during reduction (the client-side mirror of a bounded fetch window).
    pub window_days: Option<i64>,
    pub loading_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            window_days: None,
            loading_timeout: DEFAULT_LOADING_TIMEOUT,
        }
    }
}

/// The derived state every screen reads. Cloned out on access; the session
/// owns the single writable copy.
#[derive(Debug, Clone, Default)]
pub struct DashboardData {
    pub orders: Vec<DerivedOrder>,
    pub pre_orders: Vec<DerivedPreOrder>,
    pub customers: Vec<CustomerRecord>,
    pub products: Vec<ProductRecord>,
    pub loading: bool,
    pub error: Option<String>,
}

/// On-demand aggregates fetched outside the live subscriptions, each flagged
/// independently while in flight.
#[derive(Debug, Clone, Default)]
pub struct AuxAggregates {
    pub order_counts: Option<BTreeMap<String, u32>>,
    in_flight: HashSet<String>,
}

impl AuxAggregates {
    pub fn is_loading(&self, path: &str) -> bool {
        self.in_flight.contains(path)
    }
}

// ---------------------------------------------------------------------------
// Snapshot reducers (pure)
// ---------------------------------------------------------------------------

/// Reduce an orders snapshot to the derived list. `window_start` (reference
/// epoch) drops orders promised before the fetch window; records without a
/// promised time are kept and left to the date filter.
pub fn reduce_orders(snapshot: Option<&Value>, window_start: Option<f64>) -> Vec<DerivedOrder> {
    let Some(Value::Object(map)) = snapshot else {
        return Vec::new();
    };
    map.iter()
        .filter(|(_, data)| match (window_start, value_f64(data, &["orderDate"])) {
            (Some(start), Some(order_date)) => order_date >= start,
            _ => true,
        })
        .map(|(key, data)| normalize_order(key, data))
        .collect()
}

/// Reduce a pre-orders snapshot, newest first; null entries are skipped.
pub fn reduce_pre_orders(snapshot: Option<&Value>) -> Vec<DerivedPreOrder> {
    let Some(Value::Object(map)) = snapshot else {
        return Vec::new();
    };
    let mut list: Vec<DerivedPreOrder> = map
        .iter()
        .filter_map(|(key, data)| normalize_pre_order(key, data))
        .collect();
    list.reverse();
    list
}

pub fn reduce_customers(snapshot: Option<&Value>) -> Vec<CustomerRecord> {
    let Some(Value::Object(map)) = snapshot else {
        return Vec::new();
    };
    map.iter()
        .map(|(key, data)| normalize_customer(key, data))
        .collect()
}

pub fn reduce_products(snapshot: Option<&Value>) -> Vec<ProductRecord> {
    let Some(Value::Object(map)) = snapshot else {
        return Vec::new();
    };
    map.iter()
        .map(|(key, data)| normalize_product(key, data))
        .collect()
}

/// Parse the precomputed per-date counts aggregate.
fn parse_order_counts(value: Option<Value>) -> BTreeMap<String, u32> {
    let Some(Value::Object(map)) = value else {
        return BTreeMap::new();
    };
    map.into_iter()
        .filter_map(|(date, count)| count.as_f64().map(|n| (date, n.max(0.0) as u32)))
        .collect()
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Live dashboard session over a [`RealtimeStore`]. Holds the four
/// collection subscriptions for its lifetime; dropping the session
/// unsubscribes everything.
pub struct DashboardSession {
    store: Arc<dyn RealtimeStore>,
    data: Arc<Mutex<DashboardData>>,
    aux: Arc<Mutex<AuxAggregates>>,
    revision_tx: watch::Sender<u64>,
    revision_rx: watch::Receiver<u64>,
    _subs: Vec<Subscription>,
    timeout_task: JoinHandle<()>,
}

impl DashboardSession {
    /// Subscribe to the four live collections and start the loading-timeout
    /// timer. Must be called from within a tokio runtime.
    pub fn start(store: Arc<dyn RealtimeStore>, config: SessionConfig) -> Self {
        let data = Arc::new(Mutex::new(DashboardData {
            loading: true,
            ..DashboardData::default()
        }));
        let aux = Arc::new(Mutex::new(AuxAggregates::default()));
        let (revision_tx, revision_rx) = watch::channel(0u64);
        let remaining = Arc::new(Mutex::new(4u8));
        let window_start = config.window_days.map(timecode::window_start_epoch);

        let make_handler = |apply: Box<dyn Fn(&mut DashboardData, Option<Value>) + Send + Sync>|
         -> SnapshotHandler {
            let data = data.clone();
            let tx = revision_tx.clone();
            let remaining = remaining.clone();
            let first = AtomicBool::new(true);
            Box::new(move |event: SnapshotEvent| {
                let Ok(mut guard) = data.lock() else {
                    return;
                };
                match event {
                    Ok(snapshot) => apply(&mut guard, snapshot),
                    Err(err) => {
                        warn!(error = %err, "collection subscription failed");
                        guard.error = Some(err.to_string());
                    }
                }
                if first.swap(false, Ordering::Relaxed) {
                    if let Ok(mut rem) = remaining.lock() {
                        *rem = rem.saturating_sub(1);
                        if *rem == 0 {
                            guard.loading = false;
                            info!("all collections loaded");
                        }
                    }
                }
                drop(guard);
                tx.send_modify(|r| *r += 1);
            })
        };

        let subs = vec![
            store.subscribe(
                paths::ORDERS,
                make_handler(Box::new(move |state, snapshot| {
                    state.orders = reduce_orders(snapshot.as_ref(), window_start);
                })),
            ),
            store.subscribe(
                paths::PRE_ORDERS,
                make_handler(Box::new(|state, snapshot| {
                    state.pre_orders = reduce_pre_orders(snapshot.as_ref());
                })),
            ),
            store.subscribe(
                paths::CUSTOMERS,
                make_handler(Box::new(|state, snapshot| {
                    state.customers = reduce_customers(snapshot.as_ref());
                })),
            ),
            store.subscribe(
                paths::PRODUCTS,
                make_handler(Box::new(|state, snapshot| {
                    state.products = reduce_products(snapshot.as_ref());
                })),
            ),
        ];

        // Fallback: if the store never resolves, settle on loading-complete
        // with whatever arrived instead of hanging.
        let timeout_task = {
            let data = data.clone();
            let tx = revision_tx.clone();
            let timeout = config.loading_timeout;
            tokio::spawn(async move {
                tokio::time::sleep(timeout).await;
                if let Ok(mut guard) = data.lock() {
                    if guard.loading {
                        warn!(timeout_secs = timeout.as_secs(), "loading timed out, forcing complete");
                        guard.loading = false;
                        drop(guard);
                        tx.send_modify(|r| *r += 1);
                    }
                }
            })
        };

        DashboardSession {
            store,
            data,
            aux,
            revision_tx,
            revision_rx,
            _subs: subs,
            timeout_task,
        }
    }

    /// Snapshot of the current derived state.
    pub fn data(&self) -> DashboardData {
        self.data
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    /// Snapshot of the auxiliary aggregates.
    pub fn aux(&self) -> AuxAggregates {
        self.aux
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    /// Receiver that observes a bumped revision on every state change.
    pub fn changes(&self) -> watch::Receiver<u64> {
        self.revision_rx.clone()
    }

    /// The underlying store, for the mutation entry points.
    pub fn store(&self) -> Arc<dyn RealtimeStore> {
        self.store.clone()
    }

    /// Fetch the precomputed per-date order counts and cache them. A failed
    /// fetch keeps the previous cache; retry is the caller's call.
    pub async fn load_order_counts(&self) -> Result<BTreeMap<String, u32>, StoreError> {
        self.mark_in_flight(paths::ORDER_COUNTS, true);
        let result = self.store.fetch_once(paths::ORDER_COUNTS).await;
        self.mark_in_flight(paths::ORDER_COUNTS, false);

        match result {
            Ok(value) => {
                let counts = parse_order_counts(value);
                if let Ok(mut aux) = self.aux.lock() {
                    aux.order_counts = Some(counts.clone());
                }
                self.revision_tx.send_modify(|r| *r += 1);
                Ok(counts)
            }
            Err(err) => {
                warn!(error = %err, "order counts fetch failed");
                Err(err)
            }
        }
    }

    /// Fetch any auxiliary aggregate once, flagged independently while in
    /// flight.
    pub async fn load_aggregate(&self, path: &str) -> Result<Option<Value>, StoreError> {
        self.mark_in_flight(path, true);
        let result = self.store.fetch_once(path).await;
        self.mark_in_flight(path, false);
        result
    }

    fn mark_in_flight(&self, path: &str, active: bool) {
        if let Ok(mut aux) = self.aux.lock() {
            if active {
                aux.in_flight.insert(path.to_string());
            } else {
                aux.in_flight.remove(path);
            }
        }
        self.revision_tx.send_modify(|r| *r += 1);
    }
}

impl Drop for DashboardSession {
    fn drop(&mut self) {
        self.timeout_task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde_json::json;

    fn seeded_store() -> MemoryStore {
        let store = MemoryStore::new();
        store.seed(
            "orders/ord1",
            json!({
                "orderDate": 789_000_000.0,
                "createDate": 788_900_000.0,
                "cakes": [{ "name": "Mousse", "amount": 2, "price": 50_000 }],
                "customer": { "name": "Chi Lan", "phone": "0901234567" },
                "shipFee": 20_000,
                "discount": 10,
                "state": "Đặt trước"
            }),
        );
        store.seed(
            "preorders/pre1",
            json!({
                "items": { "0": { "name": "A", "amount": 1, "price": 30_000 } },
                "deliveryDate": "2026-02-14",
                "state": "pending"
            }),
        );
        store.seed("newCustomers/0901234567", json!({ "name": "Chi Lan" }));
        store.seed("cakes/c1", json!({ "name": "Mousse", "price": 50_000 }));
        store
    }

    #[tokio::test]
    async fn initial_snapshots_populate_every_collection() {
        let store = Arc::new(seeded_store());
        let session = DashboardSession::start(store, SessionConfig::default());

        let data = session.data();
        assert!(!data.loading);
        assert_eq!(data.orders.len(), 1);
        assert_eq!(data.orders[0].raw_price, 110_000.0);
        assert_eq!(data.pre_orders.len(), 1);
        assert_eq!(data.pre_orders[0].raw_total, 30_000.0);
        assert_eq!(data.customers.len(), 1);
        assert_eq!(data.products.len(), 1);
    }

    #[tokio::test]
    async fn writes_replace_the_derived_list() {
        let store = Arc::new(seeded_store());
        let session = DashboardSession::start(store.clone(), SessionConfig::default());
        let before = *session.changes().borrow();

        store
            .write(
                "orders/ord2",
                json!({ "orderDate": 789_100_000.0, "state": "Hoàn thành" }),
            )
            .await
            .unwrap();

        let data = session.data();
        assert_eq!(data.orders.len(), 2);
        assert!(*session.changes().borrow() > before);

        store.delete("orders/ord2").await.unwrap();
        assert_eq!(session.data().orders.len(), 1);
    }

    #[tokio::test]
    async fn reducers_are_pure_and_idempotent() {
        let snapshot = json!({
            "a": { "orderDate": 789_000_000.0, "state": "Đặt trước" },
            "b": { "orderDate": 789_100_000.0, "state": "Hủy" }
        });
        let first = reduce_orders(Some(&snapshot), None);
        let second = reduce_orders(Some(&snapshot), None);
        assert_eq!(first, second);
        assert!(reduce_orders(None, None).is_empty());
        assert!(reduce_orders(Some(&Value::Null), None).is_empty());
    }

    #[tokio::test]
    async fn window_start_drops_stale_orders() {
        let snapshot = json!({
            "old": { "orderDate": 100.0 },
            "recent": { "orderDate": 789_000_000.0 },
            "undated": { "state": "Đặt trước" }
        });
        let reduced = reduce_orders(Some(&snapshot), Some(500_000_000.0));
        let ids: Vec<&str> = reduced.iter().map(|o| o.id.as_str()).collect();
        assert!(ids.contains(&"recent"));
        assert!(ids.contains(&"undated"));
        assert!(!ids.contains(&"old"));
    }

    #[tokio::test]
    async fn pre_orders_come_back_newest_first() {
        let snapshot = json!({
            "a-oldest": { "items": [], "deliveryDate": "2026-01-01" },
            "z-newest": { "items": [], "deliveryDate": "2026-01-02" },
            "tombstone": null
        });
        let reduced = reduce_pre_orders(Some(&snapshot));
        assert_eq!(reduced.len(), 2);
        assert_eq!(reduced[0].id, "z-newest");
    }

    #[tokio::test]
    async fn loading_falls_back_after_the_timeout_with_a_silent_store() {
        struct SilentStore;

        #[async_trait::async_trait]
        impl RealtimeStore for SilentStore {
            fn subscribe(&self, _path: &str, _handler: SnapshotHandler) -> Subscription {
                Subscription::new(|| {})
            }
            async fn fetch_once(&self, _path: &str) -> Result<Option<Value>, StoreError> {
                Ok(None)
            }
            async fn write(&self, _path: &str, _value: Value) -> Result<(), StoreError> {
                Ok(())
            }
            async fn patch(&self, _path: &str, _value: Value) -> Result<(), StoreError> {
                Ok(())
            }
            async fn delete(&self, _path: &str) -> Result<(), StoreError> {
                Ok(())
            }
        }

        let config = SessionConfig {
            loading_timeout: Duration::from_millis(50),
            ..SessionConfig::default()
        };
        let session = DashboardSession::start(Arc::new(SilentStore), config);
        assert!(session.data().loading);

        tokio::time::sleep(Duration::from_millis(150)).await;
        let data = session.data();
        assert!(!data.loading);
        assert!(data.orders.is_empty());
    }

    #[tokio::test]
    async fn order_counts_fetch_and_cache() {
        let store = Arc::new(seeded_store());
        store.seed("metadata/orderCounts", json!({ "2026-02-14": 3, "2026-02-15": 1 }));
        let session = DashboardSession::start(store, SessionConfig::default());

        let counts = session.load_order_counts().await.unwrap();
        assert_eq!(counts.get("2026-02-14"), Some(&3));
        assert_eq!(session.aux().order_counts, Some(counts));
        assert!(!session.aux().is_loading(paths::ORDER_COUNTS));
    }
}
