//! crates/connection_hub_core/src/domain.rs
//!
//! Defines the pure, core data structures for the Connection Hub.
//! These structs are independent of any database or transport.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A bookable 30-minute consultation slot.
///
/// Slots are derived from the calendar on every request; only the ids of
/// booked slots are ever persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    /// `YYYY-MM-DD-HHMM`, e.g. `2025-01-06-1430`.
    pub id: String,
    /// Display label such as `Mon, Jan 6`.
    pub day: String,
    /// 12-hour display label such as `2:30 PM`.
    pub time: String,
    pub available: bool,
    pub starts_at: NaiveDateTime,
}

impl Slot {
    /// The denormalised label stored on a booking.
    pub fn appointment_label(&self) -> String {
        format!("{} at {}", self.day, self.time)
    }
}

/// Contact details supplied by the visitor making a booking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub name: String,
    pub email: String,
    pub company_name: String,
}

/// A booking that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBooking {
    pub slot_id: String,
    pub customer_name: String,
    pub customer_email: String,
    pub company_name: String,
    pub appointment_time: String,
}

/// A persisted booking. `slot_id` is unique across all bookings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub slot_id: String,
    pub customer_name: String,
    pub customer_email: String,
    pub company_name: String,
    pub appointment_time: String,
    pub created_at: DateTime<Utc>,
}

// Only used internally for sign-in - contains sensitive data
#[derive(Debug, Clone)]
pub struct Account {
    pub user_id: Uuid,
    pub email: String,
    pub hashed_password: String,
}

/// An authenticated identity session, as handed out by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentitySession {
    pub session_id: String,
    pub user_id: Uuid,
    pub email: String,
    pub expires_at: DateTime<Utc>,
}
