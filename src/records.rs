//! View-model types for the dashboard's derived order collections.
//!
//! Raw store records are duck-typed (optional fields, items as array or
//! keyed map, free-text states). Everything past `normalize` carries these
//! explicit shapes instead; the raw record is retained on each derived row
//! so edits can round-trip back to the store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One cake line on an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub name: String,
    pub amount: f64,
    pub price: f64,
}

/// Customer block on a derived order, with fallbacks already applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerInfo {
    pub name: String,
    pub phone: String,
    pub address: String,
    #[serde(default)]
    pub social_link: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

/// Coarse order status, classified from the free-text `state` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    Pending,
    Completed,
    Cancelled,
}

impl OrderStatus {
    /// Classify a persisted state string. Matching is case-insensitive
    /// substring search against the keyword tables; anything unrecognized
    /// is treated as pending.
    pub fn classify(state: &str) -> Self {
        let lower = state.to_lowercase();
        if lower.contains("hoàn thành") {
            OrderStatus::Completed
        } else if lower.contains("hủy") {
            OrderStatus::Cancelled
        } else {
            OrderStatus::Pending
        }
    }

    /// The state string written back to the store for this status.
    pub fn state_label(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "Đặt trước",
            OrderStatus::Completed => "Hoàn thành",
            OrderStatus::Cancelled => "Hủy",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "Pending",
            OrderStatus::Completed => "Completed",
            OrderStatus::Cancelled => "Cancelled",
        }
    }
}

/// Pre-order workflow status, parsed from the lowercase state tokens the
/// customer-facing flow writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PreOrderStatus {
    Pending,
    Waiting,
    Accepted,
    Cancelled,
}

impl PreOrderStatus {
    /// Parse a status token. Unknown tokens classify as pending so new or
    /// misspelled states still surface in the actionable queue.
    pub fn parse(token: &str) -> Self {
        match token.trim().to_lowercase().as_str() {
            "accepted" | "confirmed" => PreOrderStatus::Accepted,
            "cancelled" | "canceled" | "rejected" => PreOrderStatus::Cancelled,
            "waiting" => PreOrderStatus::Waiting,
            _ => PreOrderStatus::Pending,
        }
    }

    /// Whether staff can still confirm or reject this pre-order.
    pub fn is_actionable(&self) -> bool {
        matches!(self, PreOrderStatus::Pending | PreOrderStatus::Waiting)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PreOrderStatus::Pending => "pending",
            PreOrderStatus::Waiting => "waiting",
            PreOrderStatus::Accepted => "accepted",
            PreOrderStatus::Cancelled => "cancelled",
        }
    }
}

/// Formatted date/time pair for a timeline row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub date: String,
    pub time: String,
}

/// The promised delivery side of the timeline keeps the raw timestamp for
/// sorting; the display time is the persisted slot string when one exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceivedEntry {
    pub date: String,
    pub time: String,
    pub raw: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timeline {
    pub ordered: TimelineEntry,
    pub received: ReceivedEntry,
}

/// An order as the list screens consume it: parsed timestamps, itemized
/// lines, computed total, classified status. Rebuilt in full on every store
/// snapshot; `original` retains the raw record for round-trip edits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedOrder {
    pub id: String,
    pub customer: CustomerInfo,
    pub items: Vec<LineItem>,
    pub timeline: Timeline,
    /// Local `YYYY-MM-DD` of the promised delivery time; the date-filter key.
    pub date: String,
    pub raw_price: f64,
    pub price: String,
    pub status: OrderStatus,
    pub original: Value,
}

/// A customer-submitted pre-order awaiting staff confirmation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedPreOrder {
    pub id: String,
    pub customer: CustomerInfo,
    pub items: Vec<LineItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery_date: Option<String>,
    /// Requested slot, or "Anytime" when the customer left it open.
    pub time: String,
    /// Display label combining delivery date and slot.
    pub date_label: String,
    /// Local `YYYY-MM-DD` used for date filtering and the calendar counts.
    pub filter_date: String,
    pub raw_total: f64,
    pub total: String,
    pub status: PreOrderStatus,
    pub original: Value,
}

/// A customer profile record, keyed by phone in the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerRecord {
    pub id: String,
    pub name: String,
    pub phone: String,
    pub address: String,
    #[serde(default)]
    pub social_link: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_order_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_order_id: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

/// A product from the catalog collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub id: String,
    pub name: String,
    pub price: f64,
    pub original: Value,
}

/// Format an amount as Vietnamese dong: no decimals, dot thousands
/// grouping, trailing dong sign (`110.000 ₫`).
pub fn format_vnd(amount: f64) -> String {
    let rounded = amount.round() as i64;
    let negative = rounded < 0;
    let digits = rounded.unsigned_abs().to_string();

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 4);
    let lead = digits.len() % 3;
    for (i, c) in digits.chars().enumerate() {
        if i != 0 && (i + 3 - lead) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(c);
    }

    if negative {
        format!("-{grouped} ₫")
    } else {
        format!("{grouped} ₫")
    }
}
