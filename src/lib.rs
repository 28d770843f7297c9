//! Bakeboard - bakery dashboard data core.
//!
//! The dashboard's screens (orders, pre-orders, customers, products) read
//! from a realtime document store that pushes whole-collection snapshots.
//! This crate owns everything between those snapshots and the screens:
//! normalizing the duck-typed persisted records into a consistent view
//! model, filtering/sorting/aggregating that model, persisting in-progress
//! drafts, and translating edits back into the persisted shape.
//!
//! The store itself is behind the [`store::RealtimeStore`] seam;
//! [`store::MemoryStore`] backs tests and embedding, [`remote::RestStore`]
//! talks to a live database over REST.

use tracing::debug;

pub mod aggregate;
pub mod drafts;
pub mod filter;
pub mod ident;
pub mod mutations;
pub mod normalize;
pub mod records;
pub mod remote;
pub mod session;
pub mod store;
pub mod timecode;

pub use records::{
    format_vnd, CustomerInfo, CustomerRecord, DerivedOrder, DerivedPreOrder, LineItem,
    OrderStatus, PreOrderStatus, ProductRecord,
};
pub use session::{DashboardData, DashboardSession, SessionConfig};
pub use store::{MemoryStore, RealtimeStore, StoreError};

/// First non-empty string under any of `keys`, trimmed.
pub(crate) fn value_str(v: &serde_json::Value, keys: &[&str]) -> Option<String> {
    for key in keys {
        if let Some(s) = v.get(*key).and_then(|x| x.as_str()) {
            let trimmed = s.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
    }
    None
}

/// First numeric value under any of `keys`. Numbers persisted as strings
/// (a quirk of hand-edited records) parse too.
pub(crate) fn value_f64(v: &serde_json::Value, keys: &[&str]) -> Option<f64> {
    for key in keys {
        match v.get(*key) {
            Some(x) if x.is_f64() || x.is_i64() || x.is_u64() => return x.as_f64(),
            Some(serde_json::Value::String(s)) => {
                if let Ok(n) = s.trim().parse::<f64>() {
                    debug!(key, "coerced string-typed number");
                    return Some(n);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn value_str_walks_fallback_keys_and_trims() {
        let v = json!({ "phone": "  ", "customerPhone": " 0901234567 " });
        assert_eq!(
            value_str(&v, &["phone", "customerPhone"]).as_deref(),
            Some("0901234567")
        );
        assert_eq!(value_str(&v, &["missing"]), None);
    }

    #[test]
    fn value_f64_accepts_numbers_and_numeric_strings() {
        let v = json!({ "shipFee": 20_000, "discount": "10", "note": "abc" });
        assert_eq!(value_f64(&v, &["shipFee"]), Some(20_000.0));
        assert_eq!(value_f64(&v, &["discount"]), Some(10.0));
        assert_eq!(value_f64(&v, &["note"]), None);
    }
}
