//! Aggregation views over a (usually already filtered) derived order list.
//!
//! Callers pass whichever slice they want aggregated; nothing here reaches
//! back to the full collection.

use std::collections::BTreeMap;

use crate::records::{DerivedOrder, DerivedPreOrder};
use crate::timecode::slot_start_hour;

/// Orders per local calendar date, for the date-picker badges.
pub fn order_counts_by_date(orders: &[DerivedOrder]) -> BTreeMap<String, u32> {
    let mut counts = BTreeMap::new();
    for order in orders {
        if order.date.is_empty() {
            continue;
        }
        *counts.entry(order.date.clone()).or_insert(0) += 1;
    }
    counts
}

/// Pre-orders per filterable date.
pub fn pre_order_counts_by_date(pre_orders: &[DerivedPreOrder]) -> BTreeMap<String, u32> {
    let mut counts = BTreeMap::new();
    for pre_order in pre_orders {
        if pre_order.filter_date.is_empty() {
            continue;
        }
        *counts.entry(pre_order.filter_date.clone()).or_insert(0) += 1;
    }
    counts
}

/// One production shift: how many orders land in it and how many of each
/// cake they need.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShiftSummary {
    pub count: u32,
    pub cake_quantities: BTreeMap<String, u32>,
}

/// Morning/afternoon/evening split of a day's orders.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShiftBreakdown {
    pub morning: ShiftSummary,
    pub afternoon: ShiftSummary,
    pub evening: ShiftSummary,
}

impl ShiftBreakdown {
    pub fn total_count(&self) -> u32 {
        self.morning.count + self.afternoon.count + self.evening.count
    }
}

/// Bucket orders into shifts by the promised-delivery hour: before 12 is
/// morning, 12 to 17 afternoon, 18 onward evening. The hour is read off the
/// received-time display so slot strings ("14:00 - 16:00") bucket by their
/// start; orders without a parseable received time are left out of every
/// bucket.
pub fn shift_breakdown(orders: &[DerivedOrder]) -> ShiftBreakdown {
    let mut breakdown = ShiftBreakdown::default();

    for order in orders {
        let hour = match slot_start_hour(&order.timeline.received.time) {
            Some(hour) => hour,
            None => continue,
        };

        let shift = if hour < 12 {
            &mut breakdown.morning
        } else if hour < 18 {
            &mut breakdown.afternoon
        } else {
            &mut breakdown.evening
        };

        shift.count += 1;
        for item in &order.items {
            let qty = item.amount.max(0.0).round() as u32;
            *shift
                .cake_quantities
                .entry(item.name.clone())
                .or_insert(0) += qty;
        }
    }

    breakdown
}
