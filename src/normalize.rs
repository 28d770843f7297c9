//! Raw store records to view models.
//!
//! Persisted records are tolerant JSON: optional fields everywhere, item
//! lists that may be arrays or keyed maps, numeric fields that may be
//! missing, and a discount field that means "percent" or "dong" depending
//! on magnitude. Normalization resolves all of that here, with fallback
//! defaults instead of errors, so one malformed record can never break the
//! rest of a snapshot.

use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;
use tracing::debug;

use crate::records::{
    format_vnd, CustomerInfo, CustomerRecord, DerivedOrder, DerivedPreOrder, LineItem, OrderStatus,
    PreOrderStatus, ProductRecord, ReceivedEntry, Timeline, TimelineEntry,
};
use crate::timecode;
use crate::{value_f64, value_str};

/// Timestamps below this are reference-epoch seconds; above, unix
/// milliseconds. Legacy records carry both conventions.
const FLEXIBLE_TIMESTAMP_CUTOFF: f64 = 2_000_000_000.0;

/// Parse a timestamp that may be reference-epoch seconds or unix
/// milliseconds, by magnitude.
pub fn parse_flexible_timestamp(value: f64) -> Option<DateTime<Utc>> {
    if value < FLEXIBLE_TIMESTAMP_CUTOFF {
        timecode::from_reference_seconds(value)
    } else {
        Utc.timestamp_millis_opt(value.round() as i64).single()
    }
}

/// Extract the item list from a raw record. Accepts `cakes` or `items`,
/// as either an array or a keyed map (maps flatten to their value list).
/// Entries missing a name become "Unknown"; missing numbers become 0.
pub fn items_from_value(data: &Value) -> Vec<LineItem> {
    let raw = data
        .get("cakes")
        .filter(|v| !v.is_null())
        .or_else(|| data.get("items"));

    let entries: Vec<&Value> = match raw {
        Some(Value::Array(list)) => list.iter().collect(),
        Some(Value::Object(map)) => map.values().collect(),
        _ => Vec::new(),
    };

    entries
        .into_iter()
        .filter(|entry| entry.is_object())
        .map(|entry| LineItem {
            name: value_str(entry, &["name"]).unwrap_or_else(|| "Unknown".to_string()),
            amount: value_f64(entry, &["amount", "quantity"]).unwrap_or(0.0),
            price: value_f64(entry, &["price"]).unwrap_or(0.0),
        })
        .collect()
}

/// Sum of `price × amount` over the item lines.
pub fn items_subtotal(items: &[LineItem]) -> f64 {
    items.iter().map(|item| item.price * item.amount).sum()
}

/// Resolve the discount field's percent-or-absolute ambiguity: values up to
/// and including 100 are a percentage of the subtotal, larger values are an
/// absolute dong amount. A 100_000-dong discount on a 50_000 subtotal is
/// indistinguishable from "100%"; the heuristic is kept as-is rather than
/// guessing a fix.
pub fn discount_amount(discount: f64, subtotal: f64) -> f64 {
    if discount <= 100.0 {
        subtotal * discount / 100.0
    } else {
        discount
    }
}

/// Full price derivation: subtotal plus fees minus the resolved discount.
/// Unclamped; a fee-only record with a large discount can go negative.
pub fn order_total(items: &[LineItem], ship_fee: f64, other_fee: f64, discount: f64) -> f64 {
    let subtotal = items_subtotal(items);
    subtotal + ship_fee + other_fee - discount_amount(discount, subtotal)
}

fn customer_from_value(data: &Value) -> CustomerInfo {
    let customer = data.get("customer").cloned().unwrap_or(Value::Null);
    CustomerInfo {
        name: value_str(&customer, &["name"]).unwrap_or_else(|| "Unknown".to_string()),
        phone: value_str(&customer, &["phone"])
            .or_else(|| value_str(data, &["customerPhone"]))
            .unwrap_or_else(|| "N/A".to_string()),
        address: value_str(&customer, &["address"])
            .or_else(|| value_str(data, &["address"]))
            .unwrap_or_else(|| "N/A".to_string()),
        social_link: value_str(&customer, &["socialLink"]).unwrap_or_default(),
        id: value_str(&customer, &["id"]),
    }
}

/// Build the `DerivedOrder` for one raw record under its store key.
///
/// Never fails: every missing or malformed field falls back to a default.
/// The promised delivery time (`orderDate`) drives the filterable date key
/// and the sortable received timestamp; `createDate` only feeds the
/// "ordered at" display.
pub fn normalize_order(key: &str, data: &Value) -> DerivedOrder {
    let order_date = value_f64(data, &["orderDate"]).and_then(timecode::from_reference_seconds);
    let create_date = value_f64(data, &["createDate"]).and_then(timecode::from_reference_seconds);

    let items = items_from_value(data);
    let ship_fee = value_f64(data, &["shipFee"]).unwrap_or(0.0);
    let other_fee = value_f64(data, &["otherFee"]).unwrap_or(0.0);
    let discount = value_f64(data, &["discount"]).unwrap_or(0.0);
    let raw_price = order_total(&items, ship_fee, other_fee, discount);

    let state = value_str(data, &["state"]).unwrap_or_default();
    let status = OrderStatus::classify(&state);

    let received_time = value_str(data, &["deliveryTimeSlot"])
        .or_else(|| order_date.as_ref().map(timecode::received_time))
        .unwrap_or_default();

    DerivedOrder {
        id: key.to_string(),
        customer: customer_from_value(data),
        items,
        timeline: Timeline {
            ordered: TimelineEntry {
                date: create_date.as_ref().map(timecode::short_date).unwrap_or_default(),
                time: create_date.as_ref().map(timecode::ordered_time).unwrap_or_default(),
            },
            received: ReceivedEntry {
                date: order_date.as_ref().map(timecode::short_date).unwrap_or_default(),
                time: received_time,
                raw: order_date,
            },
        },
        date: order_date.as_ref().map(timecode::local_date_key).unwrap_or_default(),
        raw_price,
        price: format_vnd(raw_price),
        status,
        original: data.clone(),
    }
}

/// Build the `DerivedPreOrder` for one raw record, or `None` when the entry
/// is not an object (deleted slots show up as nulls in snapshots).
pub fn normalize_pre_order(key: &str, data: &Value) -> Option<DerivedPreOrder> {
    if !data.is_object() {
        debug!(key, "skipping non-object pre-order entry");
        return None;
    }

    let items = items_from_value(data);

    // Precomputed totals win; absent or zero totals are re-derived from the
    // items and fees.
    let mut raw_total = value_f64(data, &["total"]).unwrap_or(0.0);
    if raw_total == 0.0 && !items.is_empty() {
        raw_total = order_total(
            &items,
            value_f64(data, &["shipFee"]).unwrap_or(0.0),
            value_f64(data, &["otherFee"]).unwrap_or(0.0),
            value_f64(data, &["discount"]).unwrap_or(0.0),
        );
    }

    let delivery_date = value_str(data, &["deliveryDate"]);
    let delivery_time = value_str(data, &["deliveryTime"]);
    let create_date = value_f64(data, &["createDate"]).and_then(parse_flexible_timestamp);

    let filter_date = delivery_date
        .clone()
        .or_else(|| create_date.as_ref().map(timecode::local_date_key))
        .unwrap_or_default();

    let date_label = match &delivery_date {
        Some(date) => match &delivery_time {
            Some(time) => format!("{date} {time}"),
            None => date.clone(),
        },
        None => create_date
            .map(|d| d.with_timezone(&chrono::Local).format("%d/%m/%Y").to_string())
            .unwrap_or_default(),
    };

    let status_token = value_str(data, &["state"])
        .or_else(|| value_str(data, &["status"]))
        .unwrap_or_else(|| "pending".to_string());

    Some(DerivedPreOrder {
        id: key.to_string(),
        customer: customer_from_value(data),
        items,
        delivery_date,
        time: delivery_time.unwrap_or_else(|| "Anytime".to_string()),
        date_label,
        filter_date,
        raw_total,
        total: format_vnd(raw_total),
        status: PreOrderStatus::parse(&status_token),
        original: data.clone(),
    })
}

/// Normalize a customer profile record.
pub fn normalize_customer(key: &str, data: &Value) -> CustomerRecord {
    CustomerRecord {
        id: value_str(data, &["id"]).unwrap_or_else(|| key.to_string()),
        name: value_str(data, &["name"]).unwrap_or_else(|| "Unknown".to_string()),
        phone: value_str(data, &["phone"]).unwrap_or_else(|| key.to_string()),
        address: value_str(data, &["address"]).unwrap_or_default(),
        social_link: value_str(data, &["socialLink"]).unwrap_or_default(),
        first_order_id: value_str(data, &["firstOrderId", "firstOrderID"]),
        last_order_id: value_str(data, &["lastOrderId", "lastOrderID"]),
        created_at: value_f64(data, &["createDate"]).and_then(parse_flexible_timestamp),
    }
}

/// Normalize a catalog product record.
pub fn normalize_product(key: &str, data: &Value) -> ProductRecord {
    ProductRecord {
        id: key.to_string(),
        name: value_str(data, &["name"]).unwrap_or_else(|| "Unknown".to_string()),
        price: value_f64(data, &["price"]).unwrap_or(0.0),
        original: data.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn mousse_order() -> Value {
        json!({
            "orderDate": 789_000_000.0,
            "createDate": 788_900_000.0,
            "cakes": [{ "name": "Mousse", "amount": 2, "price": 50_000 }],
            "customer": { "name": "Chi Lan", "phone": "0901234567" },
            "address": "12 Hàng Bông",
            "shipFee": 20_000,
            "otherFee": 0,
            "discount": 10,
            "state": "Đặt trước"
        })
    }

    #[test]
    fn percentage_discount_and_fees_derive_the_total() {
        let order = normalize_order("ord-1", &mousse_order());
        assert_eq!(order.raw_price, 110_000.0);
        assert_eq!(order.price, "110.000 ₫");
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.customer.address, "12 Hàng Bông");
    }

    #[test]
    fn discount_boundary_is_inclusive_on_the_percentage_side() {
        assert_eq!(discount_amount(100.0, 100_000.0), 100_000.0);
        assert_eq!(discount_amount(101.0, 100_000.0), 101.0);
        assert_eq!(discount_amount(0.0, 100_000.0), 0.0);
    }

    #[test]
    fn zero_item_records_pass_negative_totals_through() {
        let data = json!({ "shipFee": 5_000, "otherFee": 0, "discount": 20_000 });
        let order = normalize_order("ord-2", &data);
        assert!(order.items.is_empty());
        assert_eq!(order.raw_price, -15_000.0);
        assert_eq!(order.price, "-15.000 ₫");
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let order = normalize_order("ord-3", &json!({}));
        assert_eq!(order.customer.name, "Unknown");
        assert_eq!(order.customer.phone, "N/A");
        assert_eq!(order.customer.address, "N/A");
        assert_eq!(order.date, "");
        assert_eq!(order.status, OrderStatus::Pending);
        assert!(order.timeline.received.raw.is_none());
    }

    #[test]
    fn phone_falls_back_to_the_record_root() {
        let order = normalize_order("ord-4", &json!({ "customerPhone": "0912345678" }));
        assert_eq!(order.customer.phone, "0912345678");
    }

    #[test]
    fn date_key_comes_from_the_delivery_timestamp() {
        let order = normalize_order("ord-5", &mousse_order());
        let expected = timecode::from_reference_seconds(789_000_000.0)
            .map(|d| timecode::local_date_key(&d))
            .unwrap();
        assert_eq!(order.date, expected);
        let create_key = timecode::from_reference_seconds(788_900_000.0)
            .map(|d| timecode::local_date_key(&d))
            .unwrap();
        assert_ne!(order.date, create_key);
    }

    #[test]
    fn delivery_slot_overrides_the_received_time_display() {
        let mut data = mousse_order();
        data["deliveryTimeSlot"] = json!("14:00 - 16:00");
        let order = normalize_order("ord-6", &data);
        assert_eq!(order.timeline.received.time, "14:00 - 16:00");
    }

    #[test]
    fn normalization_is_idempotent() {
        let data = mousse_order();
        assert_eq!(normalize_order("ord-7", &data), normalize_order("ord-7", &data));
    }

    #[test]
    fn map_shaped_items_flatten_and_derive_the_total() {
        let data = json!({
            "items": { "0": { "name": "A", "amount": 1, "price": 30_000 } },
            "state": "pending"
        });
        let pre = normalize_pre_order("pre-1", &data).expect("object entry should normalize");
        assert_eq!(pre.items.len(), 1);
        assert_eq!(pre.items[0].name, "A");
        assert_eq!(pre.raw_total, 30_000.0);
    }

    #[test]
    fn precomputed_pre_order_totals_win() {
        let data = json!({
            "items": [{ "name": "A", "amount": 2, "price": 30_000 }],
            "total": 55_000
        });
        let pre = normalize_pre_order("pre-2", &data).unwrap();
        assert_eq!(pre.raw_total, 55_000.0);
    }

    #[test]
    fn null_pre_order_entries_are_skipped() {
        assert!(normalize_pre_order("pre-3", &Value::Null).is_none());
        assert!(normalize_pre_order("pre-4", &json!("tombstone")).is_none());
    }

    #[test]
    fn pre_order_filter_date_prefers_delivery_date() {
        let data = json!({
            "deliveryDate": "2026-02-14",
            "deliveryTime": "10:00 - 12:00",
            "createDate": 789_000_000.0
        });
        let pre = normalize_pre_order("pre-5", &data).unwrap();
        assert_eq!(pre.filter_date, "2026-02-14");
        assert_eq!(pre.date_label, "2026-02-14 10:00 - 12:00");
        assert_eq!(pre.time, "10:00 - 12:00");
    }

    #[test]
    fn flexible_timestamps_split_on_magnitude() {
        let reference = parse_flexible_timestamp(0.0).unwrap();
        assert_eq!(reference.to_rfc3339(), "2001-01-01T00:00:00+00:00");
        let unix_ms = parse_flexible_timestamp(1_700_000_000_000.0).unwrap();
        assert_eq!(unix_ms.timestamp(), 1_700_000_000);
    }

    #[test]
    fn customers_parse_with_phone_key_fallback() {
        let customer = normalize_customer(
            "0901234567",
            &json!({ "name": "Chi Lan", "createDate": 700_000_000.0 }),
        );
        assert_eq!(customer.phone, "0901234567");
        assert!(customer.created_at.is_some());
        assert_eq!(customer.first_order_id, None);
    }
}
