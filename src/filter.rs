//! Compound filtering and sorting over the derived order lists.
//!
//! Every predicate is independently optional; an unset predicate admits all
//! records and the active ones combine as a conjunction. Filtering is pure:
//! the same inputs always produce the same output list.

use crate::records::{DerivedOrder, DerivedPreOrder, OrderStatus, PreOrderStatus};

/// Address substrings that mark an order as self-collect rather than
/// delivery.
pub const PICKUP_MARKERS: [&str; 2] = ["tự đến lấy", "pickup"];

/// Filter criteria for the orders list. Empty vectors and `None` mean "no
/// restriction" for that predicate.
#[derive(Debug, Clone, Default)]
pub struct OrderFilter {
    /// Exact match on the derived `date` key.
    pub date: Option<String>,
    /// Case-insensitive substring over name, phone, address, and id.
    pub search: String,
    pub statuses: Vec<OrderStatus>,
    pub item_types: Vec<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub pickup_only: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    ReceiveDate,
    CustomerName,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy)]
pub struct SortConfig {
    pub key: SortKey,
    pub direction: SortDirection,
}

impl Default for SortConfig {
    fn default() -> Self {
        SortConfig {
            key: SortKey::ReceiveDate,
            direction: SortDirection::Asc,
        }
    }
}

fn address_is_pickup(address: &str) -> bool {
    let lower = address.to_lowercase();
    PICKUP_MARKERS.iter().any(|marker| lower.contains(marker))
}

fn matches_search(search: &str, fields: [&str; 4]) -> bool {
    if search.trim().is_empty() {
        return true;
    }
    let query = search.to_lowercase();
    fields
        .iter()
        .any(|field| field.to_lowercase().contains(&query))
}

/// Whether one order passes every active predicate.
pub fn order_matches(order: &DerivedOrder, filter: &OrderFilter) -> bool {
    if let Some(date) = &filter.date {
        if !date.is_empty() && order.date != *date {
            return false;
        }
    }

    if !matches_search(
        &filter.search,
        [
            &order.customer.name,
            &order.customer.phone,
            &order.customer.address,
            &order.id,
        ],
    ) {
        return false;
    }

    if !filter.statuses.is_empty() && !filter.statuses.contains(&order.status) {
        return false;
    }

    if !filter.item_types.is_empty()
        && !order
            .items
            .iter()
            .any(|item| filter.item_types.contains(&item.name))
    {
        return false;
    }

    if let Some(min) = filter.min_price {
        if order.raw_price < min {
            return false;
        }
    }
    if let Some(max) = filter.max_price {
        if order.raw_price > max {
            return false;
        }
    }

    if filter.pickup_only && !address_is_pickup(&order.customer.address) {
        return false;
    }

    true
}

fn compare_names(a: &str, b: &str) -> std::cmp::Ordering {
    // Case-insensitive with a bytewise tiebreak: deterministic across
    // platforms, unlike locale collation.
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

/// Filter and sort the orders list. The sort is stable, so ties keep their
/// snapshot order.
pub fn apply(
    orders: &[DerivedOrder],
    filter: &OrderFilter,
    sort: &SortConfig,
) -> Vec<DerivedOrder> {
    let mut result: Vec<DerivedOrder> = orders
        .iter()
        .filter(|order| order_matches(order, filter))
        .cloned()
        .collect();

    result.sort_by(|a, b| {
        let ordering = match sort.key {
            SortKey::ReceiveDate => {
                let at = a.timeline.received.raw.map(|d| d.timestamp_millis());
                let bt = b.timeline.received.raw.map(|d| d.timestamp_millis());
                at.unwrap_or(i64::MIN).cmp(&bt.unwrap_or(i64::MIN))
            }
            SortKey::CustomerName => compare_names(&a.customer.name, &b.customer.name),
        };
        match sort.direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    });

    result
}

/// Filter criteria for the pre-orders list; same shape as [`OrderFilter`]
/// but keyed on the pre-order workflow tokens.
#[derive(Debug, Clone, Default)]
pub struct PreOrderFilter {
    pub date: Option<String>,
    pub search: String,
    pub statuses: Vec<PreOrderStatus>,
    pub item_types: Vec<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
}

/// Whether one pre-order passes every active predicate.
pub fn pre_order_matches(pre_order: &DerivedPreOrder, filter: &PreOrderFilter) -> bool {
    if let Some(date) = &filter.date {
        if !date.is_empty() && pre_order.filter_date != *date {
            return false;
        }
    }

    if !matches_search(
        &filter.search,
        [
            &pre_order.customer.name,
            &pre_order.customer.phone,
            &pre_order.customer.address,
            &pre_order.id,
        ],
    ) {
        return false;
    }

    if !filter.statuses.is_empty() && !filter.statuses.contains(&pre_order.status) {
        return false;
    }

    if !filter.item_types.is_empty()
        && !pre_order
            .items
            .iter()
            .any(|item| filter.item_types.contains(&item.name))
    {
        return false;
    }

    if let Some(min) = filter.min_price {
        if pre_order.raw_total < min {
            return false;
        }
    }
    if let Some(max) = filter.max_price {
        if pre_order.raw_total > max {
            return false;
        }
    }

    true
}

/// Filter the pre-orders list. Pre-orders keep their snapshot order
/// (newest first as the session reduces them).
pub fn apply_pre_orders(
    pre_orders: &[DerivedPreOrder],
    filter: &PreOrderFilter,
) -> Vec<DerivedPreOrder> {
    pre_orders
        .iter()
        .filter(|pre_order| pre_order_matches(pre_order, filter))
        .cloned()
        .collect()
}

/// Distinct item names across the orders on `date` (or all orders when no
/// date is given), sorted for the filter dropdown.
pub fn available_item_types(orders: &[DerivedOrder], date: Option<&str>) -> Vec<String> {
    let mut types: Vec<String> = orders
        .iter()
        .filter(|order| date.map_or(true, |d| order.date == d))
        .flat_map(|order| order.items.iter().map(|item| item.name.clone()))
        .collect();
    types.sort();
    types.dedup();
    types
}

/// Upper bound for the price-range slider: the largest order total, with a
/// 1_000_000-dong floor so an empty day still renders a usable range.
pub fn max_order_price(orders: &[DerivedOrder]) -> f64 {
    orders
        .iter()
        .map(|order| order.raw_price)
        .fold(1_000_000.0, f64::max)
}
