//! crates/connection_hub_core/src/slots.rs
//!
//! Generates the week of bookable consultation slots and looks up which of
//! them are already taken.

use crate::{domain::Slot, ports::BookingStore};
use chrono::{Datelike, Duration, NaiveDate, Weekday};
use std::collections::HashSet;
use tracing::{debug, warn};

/// Number of calendar days shown, starting today.
pub const DAYS_AHEAD: i64 = 7;
/// First bookable hour (inclusive).
pub const OPENING_HOUR: u32 = 8;
/// Closing hour (exclusive): the last slot starts at 16:30.
pub const CLOSING_HOUR: u32 = 17;
pub const SLOT_MINUTES: [u32; 2] = [0, 30];

/// Builds the slots for the 7 days starting at `today`, weekends excluded.
///
/// Output is grouped by date, then ordered by start time. A slot is
/// available unless its id is in `booked_ids`.
pub fn generate_week_slots(today: NaiveDate, booked_ids: &HashSet<String>) -> Vec<Slot> {
    let mut slots = Vec::new();

    for offset in 0..DAYS_AHEAD {
        let date = today + Duration::days(offset);
        if matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
            continue;
        }
        let day = date.format("%a, %b %-d").to_string();

        for hour in OPENING_HOUR..CLOSING_HOUR {
            for minute in SLOT_MINUTES {
                let Some(starts_at) = date.and_hms_opt(hour, minute, 0) else {
                    continue;
                };
                let id = slot_id(date, hour, minute);
                let available = !booked_ids.contains(&id);
                slots.push(Slot {
                    id,
                    day: day.clone(),
                    time: display_time(hour, minute),
                    available,
                    starts_at,
                });
            }
        }
    }

    slots
}

/// Reads the ids of all booked slots.
///
/// Never fails: when the store is unreachable the failure is logged and an
/// empty set is returned, so the calendar still renders with every slot open.
pub async fn fetch_booked_slot_ids(store: &dyn BookingStore) -> HashSet<String> {
    match store.booked_slot_ids().await {
        Ok(ids) => {
            debug!("Loaded {} booked slot ids.", ids.len());
            ids.into_iter().collect()
        }
        Err(e) => {
            warn!("Failed to load booked slots, showing all slots as available: {}", e);
            HashSet::new()
        }
    }
}

/// Generates this week's slots with availability taken from the store.
pub async fn load_week(store: &dyn BookingStore, today: NaiveDate) -> Vec<Slot> {
    let booked_ids = fetch_booked_slot_ids(store).await;
    generate_week_slots(today, &booked_ids)
}

/// `YYYY-MM-DD-HHMM`
pub fn slot_id(date: NaiveDate, hour: u32, minute: u32) -> String {
    format!("{}-{:02}{:02}", date.format("%Y-%m-%d"), hour, minute)
}

fn display_time(hour: u32, minute: u32) -> String {
    let period = if hour < 12 { "AM" } else { "PM" };
    let display_hour = match hour % 12 {
        0 => 12,
        h => h,
    };
    format!("{}:{:02} {}", display_hour, minute, period)
}
