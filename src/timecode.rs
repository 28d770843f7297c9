//! Time codec for the bakery store's reference-epoch timestamps.
//!
//! The document store persists order timestamps as seconds relative to
//! 2001-01-01T00:00:00Z (the format the original iOS ordering app wrote).
//! This module converts between that representation and `chrono` types, and
//! owns the calendar/date-key formatting and the fixed delivery time slots
//! used across the dashboard.

use chrono::{DateTime, Datelike, Duration, Local, NaiveDate, NaiveTime, TimeZone, Timelike, Utc};

/// Offset between the store's reference epoch (2001-01-01T00:00:00Z) and the
/// Unix epoch, in seconds.
pub const REFERENCE_EPOCH_OFFSET_SECS: i64 = 978_307_200;

/// The five fixed delivery windows orders can be scheduled into.
pub const DELIVERY_TIME_SLOTS: [&str; 5] = [
    "10:00 - 12:00",
    "12:00 - 14:00",
    "14:00 - 16:00",
    "16:00 - 18:00",
    "18:00 - 20:00",
];

/// Convert a reference-epoch timestamp (seconds since 2001-01-01 UTC) to a
/// `DateTime<Utc>`. Returns `None` for values outside chrono's range.
pub fn from_reference_seconds(seconds: f64) -> Option<DateTime<Utc>> {
    let unix_ms = (seconds + REFERENCE_EPOCH_OFFSET_SECS as f64) * 1000.0;
    if !unix_ms.is_finite() {
        return None;
    }
    Utc.timestamp_millis_opt(unix_ms.round() as i64).single()
}

/// Convert a `DateTime` back to reference-epoch seconds.
pub fn to_reference_seconds<Tz: TimeZone>(date: &DateTime<Tz>) -> f64 {
    date.timestamp_millis() as f64 / 1000.0 - REFERENCE_EPOCH_OFFSET_SECS as f64
}

/// Format a timestamp as the local-timezone `YYYY-MM-DD` key used to group
/// and filter orders by calendar day.
pub fn local_date_key(date: &DateTime<Utc>) -> String {
    date.with_timezone(&Local).format("%Y-%m-%d").to_string()
}

/// Today's local date key.
pub fn today_date_key() -> String {
    local_date_key(&Utc::now())
}

/// Reference-epoch value for midnight UTC, `days_ago` days before now.
/// Bounds the initial fetch window; anchored to UTC so the same call made in
/// different timezones yields the same cutoff.
pub fn window_start_epoch(days_ago: i64) -> f64 {
    let day = Utc::now().date_naive() - Duration::days(days_ago);
    let midnight = day.and_time(NaiveTime::MIN).and_utc();
    to_reference_seconds(&midnight)
}

/// Short display date, e.g. `5 Jan`, matching the order timeline cards.
pub fn short_date(date: &DateTime<Utc>) -> String {
    let local = date.with_timezone(&Local);
    format!("{} {}", local.day(), local.format("%b"))
}

/// 12-hour clock display for the time an order was placed, e.g. `02:30 PM`.
pub fn ordered_time(date: &DateTime<Utc>) -> String {
    date.with_timezone(&Local).format("%I:%M %p").to_string()
}

/// 24-hour clock display for the promised delivery time, e.g. `14:30`.
/// Callers prefer the persisted `deliveryTimeSlot` string when one exists.
pub fn received_time(date: &DateTime<Utc>) -> String {
    date.with_timezone(&Local).format("%H:%M").to_string()
}

/// Map an hour of day to the delivery slot covering it. Hours before opening
/// clamp to the first slot, hours after closing to the last, so every order
/// lands in a slot.
pub fn slot_for_hour(hour: u32) -> &'static str {
    match hour {
        0..=11 => DELIVERY_TIME_SLOTS[0],
        12..=13 => DELIVERY_TIME_SLOTS[1],
        14..=15 => DELIVERY_TIME_SLOTS[2],
        16..=17 => DELIVERY_TIME_SLOTS[3],
        _ => DELIVERY_TIME_SLOTS[4],
    }
}

/// Parse the starting hour out of a slot string (`"14:00 - 16:00"` -> 14).
/// Also accepts plain `HH:MM` times. Returns `None` when the leading token
/// is not a valid hour.
pub fn slot_start_hour(slot: &str) -> Option<u32> {
    let head = slot.split(':').next()?.trim();
    let hour: u32 = head.parse().ok()?;
    if hour < 24 {
        Some(hour)
    } else {
        None
    }
}

/// Whether a delivery slot can still be chosen for `date_key`. Slots on
/// future dates are always available; same-day slots must start after the
/// current local hour.
pub fn is_slot_available(slot: &str, date_key: &str, now: &DateTime<Utc>) -> bool {
    if date_key != local_date_key(now) {
        return true;
    }
    match slot_start_hour(slot) {
        Some(start) => start > now.with_timezone(&Local).hour(),
        None => false,
    }
}

/// Combine a `YYYY-MM-DD` date key and a delivery slot into the promised
/// delivery timestamp (local timezone, at the slot's starting hour).
pub fn slot_to_timestamp(date_key: &str, slot: &str) -> Result<DateTime<Utc>, String> {
    let date = NaiveDate::parse_from_str(date_key, "%Y-%m-%d")
        .map_err(|e| format!("invalid delivery date '{date_key}': {e}"))?;
    let hour = slot_start_hour(slot).ok_or_else(|| format!("invalid time slot '{slot}'"))?;
    let naive = date
        .and_hms_opt(hour, 0, 0)
        .ok_or_else(|| format!("invalid hour {hour} in slot '{slot}'"))?;
    match Local.from_local_datetime(&naive).earliest() {
        Some(local) => Ok(local.with_timezone(&Utc)),
        None => Err(format!("unrepresentable local time {naive}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_epoch_round_trips() {
        for seconds in [0.0, 1.0, 757_382_400.0, 789_000_123.0, -86_400.0] {
            let date = from_reference_seconds(seconds).expect("in-range timestamp should parse");
            assert!((to_reference_seconds(&date) - seconds).abs() < 1e-6);
        }
    }

    #[test]
    fn reference_epoch_origin_is_2001() {
        let origin = from_reference_seconds(0.0).expect("origin should parse");
        assert_eq!(origin.to_rfc3339(), "2001-01-01T00:00:00+00:00");
    }

    #[test]
    fn local_date_key_is_zero_padded() {
        let date = Utc.with_ymd_and_hms(2026, 3, 5, 12, 0, 0).single().unwrap();
        let key = local_date_key(&date);
        assert_eq!(key.len(), 10);
        assert!(key.starts_with("2026-03-0"));
    }

    #[test]
    fn window_start_is_utc_midnight() {
        let epoch = window_start_epoch(7);
        let date = from_reference_seconds(epoch).expect("window start should parse");
        assert_eq!((date.hour(), date.minute(), date.second()), (0, 0, 0));
        assert!(date < Utc::now());
    }

    #[test]
    fn slot_for_hour_clamps_out_of_hours() {
        assert_eq!(slot_for_hour(8), "10:00 - 12:00");
        assert_eq!(slot_for_hour(11), "10:00 - 12:00");
        assert_eq!(slot_for_hour(12), "12:00 - 14:00");
        assert_eq!(slot_for_hour(17), "16:00 - 18:00");
        assert_eq!(slot_for_hour(19), "18:00 - 20:00");
        assert_eq!(slot_for_hour(23), "18:00 - 20:00");
    }

    #[test]
    fn slot_start_hour_accepts_slots_and_plain_times() {
        assert_eq!(slot_start_hour("14:00 - 16:00"), Some(14));
        assert_eq!(slot_start_hour("09:30"), Some(9));
        assert_eq!(slot_start_hour("Anytime"), None);
        assert_eq!(slot_start_hour("25:00"), None);
    }

    #[test]
    fn slots_on_other_days_are_always_available() {
        let now = Utc::now();
        assert!(is_slot_available("10:00 - 12:00", "1999-01-01", &now));
    }

    #[test]
    fn slot_to_timestamp_round_trips_through_date_key() {
        let ts = slot_to_timestamp("2026-04-10", "14:00 - 16:00").expect("slot should convert");
        assert_eq!(local_date_key(&ts), "2026-04-10");
        assert_eq!(ts.with_timezone(&Local).hour(), 14);
    }

    #[test]
    fn slot_to_timestamp_rejects_garbage() {
        assert!(slot_to_timestamp("tomorrow", "10:00 - 12:00").is_err());
        assert!(slot_to_timestamp("2026-04-10", "whenever").is_err());
    }
}
