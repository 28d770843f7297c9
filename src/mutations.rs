//! Mutation entry points: translate edited view models back into the raw
//! record shape and issue the store calls.
//!
//! The view model never mutates in place — every change round-trips through
//! a freshly built `RawOrderRecord` payload. Edits preserve the original
//! `createDate`; the promised delivery time is re-derived from the chosen
//! date and slot.

use chrono::Utc;
use serde_json::{json, Value};
use tracing::info;

use crate::ident::{generate_customer_uuid, generate_record_id};
use crate::normalize::{discount_amount, items_subtotal};
use crate::records::{DerivedPreOrder, LineItem, OrderStatus};
use crate::store::{paths, RealtimeStore, StoreError};
use crate::timecode;
use crate::{value_f64, value_str};

/// Customer fields as entered in the order form.
#[derive(Debug, Clone, Default)]
pub struct CustomerInput {
    pub name: String,
    pub phone: String,
    pub address: String,
    pub social_link: String,
    /// Prior customer id, when editing or when the customer already exists.
    pub id: Option<String>,
}

/// An order as edited in the dashboard form.
#[derive(Debug, Clone)]
pub struct OrderEdit {
    pub customer: CustomerInput,
    pub items: Vec<LineItem>,
    pub ship_fee: f64,
    pub other_fee: f64,
    pub discount: f64,
    pub note: String,
    /// Local `YYYY-MM-DD` delivery date.
    pub date: String,
    /// One of the fixed delivery slots.
    pub time_slot: String,
    pub status: OrderStatus,
}

/// Build the raw record payload for an order edit.
///
/// `existing` is the original raw record when editing; its `createDate` and
/// customer id carry over. New orders stamp `createDate` now and mint a
/// customer id only when none was supplied.
pub fn order_payload(edit: &OrderEdit, existing: Option<&Value>) -> Result<Value, String> {
    let delivery = timecode::slot_to_timestamp(&edit.date, &edit.time_slot)?;

    let create_date = existing
        .and_then(|raw| value_f64(raw, &["createDate"]))
        .unwrap_or_else(|| timecode::to_reference_seconds(&Utc::now()));

    let customer_id = edit
        .customer
        .id
        .clone()
        .or_else(|| {
            existing.and_then(|raw| {
                raw.get("customer")
                    .and_then(|c| value_str(c, &["id"]))
            })
        })
        .unwrap_or_else(generate_customer_uuid);

    let cakes: Vec<Value> = edit
        .items
        .iter()
        .map(|item| {
            json!({
                "id": generate_record_id(),
                "name": item.name,
                "amount": item.amount,
                "price": item.price,
            })
        })
        .collect();

    Ok(json!({
        "orderDate": timecode::to_reference_seconds(&delivery),
        "createDate": create_date,
        "deliveryTimeSlot": edit.time_slot,
        "cakes": cakes,
        "customer": {
            "id": customer_id,
            "name": edit.customer.name,
            "phone": edit.customer.phone,
            "address": edit.customer.address,
            "socialLink": edit.customer.social_link,
        },
        "address": edit.customer.address,
        "shipFee": edit.ship_fee,
        "otherFee": edit.other_fee,
        "discount": edit.discount,
        "note": edit.note,
        "state": edit.status.state_label(),
    }))
}

/// Create a new order under a freshly minted key. Returns the key.
pub async fn create_order(
    store: &dyn RealtimeStore,
    edit: &OrderEdit,
) -> Result<String, StoreError> {
    let payload = order_payload(edit, None).map_err(StoreError::Other)?;
    let id = generate_record_id();
    store
        .write(&format!("{}/{id}", paths::ORDERS), payload)
        .await?;
    info!(order_id = %id, "order created");
    Ok(id)
}

/// Replace an existing order with an edited payload; `original` is the raw
/// record being edited (its `createDate` survives).
pub async fn update_order(
    store: &dyn RealtimeStore,
    id: &str,
    edit: &OrderEdit,
    original: &Value,
) -> Result<(), StoreError> {
    let payload = order_payload(edit, Some(original)).map_err(StoreError::Other)?;
    store
        .write(&format!("{}/{id}", paths::ORDERS), payload)
        .await?;
    info!(order_id = %id, "order updated");
    Ok(())
}

/// Patch just the status of an order; the state string is what the
/// normalizer classifies back.
pub async fn update_order_status(
    store: &dyn RealtimeStore,
    id: &str,
    status: OrderStatus,
) -> Result<(), StoreError> {
    store
        .patch(
            &format!("{}/{id}", paths::ORDERS),
            json!({ "state": status.state_label() }),
        )
        .await?;
    info!(order_id = %id, status = status.as_str(), "order status updated");
    Ok(())
}

/// Delete an order. Destructive and unrecoverable; callers confirm with the
/// user before invoking.
pub async fn delete_order(store: &dyn RealtimeStore, id: &str) -> Result<(), StoreError> {
    store.delete(&format!("{}/{id}", paths::ORDERS)).await?;
    info!(order_id = %id, "order deleted");
    Ok(())
}

/// A customer-side pre-order submission.
#[derive(Debug, Clone)]
pub struct PreOrderInput {
    pub customer: CustomerInput,
    pub items: Vec<LineItem>,
    /// Local `YYYY-MM-DD` requested delivery date.
    pub delivery_date: String,
    /// Requested delivery slot.
    pub delivery_time: String,
}

/// Submit a new pre-order in the pending state. Returns the key.
pub async fn submit_pre_order(
    store: &dyn RealtimeStore,
    input: &PreOrderInput,
) -> Result<String, StoreError> {
    let cakes: Vec<Value> = input
        .items
        .iter()
        .map(|item| {
            json!({
                "id": generate_record_id(),
                "name": item.name,
                "amount": item.amount,
                "price": item.price,
            })
        })
        .collect();

    let payload = json!({
        "customer": {
            "name": input.customer.name,
            "phone": input.customer.phone,
            "address": input.customer.address,
            "socialLink": input.customer.social_link,
            "note": "",
        },
        "cakes": cakes,
        "deliveryDate": input.delivery_date,
        "deliveryTime": input.delivery_time,
        "createDate": timecode::to_reference_seconds(&Utc::now()),
        "state": "pending",
        "status": "pending",
        "shipFee": 0,
        "otherFee": 0,
        "discount": 0,
        "total": items_subtotal(&input.items),
    });

    let id = generate_record_id();
    store
        .write(&format!("{}/{id}", paths::PRE_ORDERS), payload)
        .await?;
    info!(pre_order_id = %id, "pre-order submitted");
    Ok(id)
}

/// Confirm a pre-order: apply the staff-entered ship fee and discount,
/// recompute the total (discount ≤ 100 is a percentage of the item
/// subtotal, larger values are absolute), and mark it accepted. Returns the
/// confirmed total.
pub async fn confirm_pre_order(
    store: &dyn RealtimeStore,
    pre_order: &DerivedPreOrder,
    ship_fee: f64,
    discount: f64,
) -> Result<f64, StoreError> {
    let subtotal = items_subtotal(&pre_order.items);
    let total = subtotal + ship_fee - discount_amount(discount, subtotal);

    store
        .patch(
            &format!("{}/{}", paths::PRE_ORDERS, pre_order.id),
            json!({
                "state": "accepted",
                "shipFee": ship_fee,
                "discount": discount,
                "total": total,
            }),
        )
        .await?;
    info!(pre_order_id = %pre_order.id, total, "pre-order confirmed");
    Ok(total)
}

/// Reject a pre-order. Callers confirm with the user first.
pub async fn reject_pre_order(store: &dyn RealtimeStore, id: &str) -> Result<(), StoreError> {
    store
        .patch(
            &format!("{}/{id}", paths::PRE_ORDERS),
            json!({ "state": "cancelled" }),
        )
        .await?;
    info!(pre_order_id = %id, "pre-order rejected");
    Ok(())
}
