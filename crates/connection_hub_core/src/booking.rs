//! crates/connection_hub_core/src/booking.rs
//!
//! Submits consultation bookings. Double-booking is prevented by the store's
//! uniqueness constraint on `slot_id`; this module only interprets the
//! store's answer.

use crate::{
    domain::{Booking, Customer, NewBooking, Slot},
    ports::{BookingStore, NotificationService, PortResult},
};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Hosted function that emails the booking confirmation.
pub const CONFIRMATION_FUNCTION: &str = "send-booking-confirmation";

/// Why a booking was not stored.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BookingError {
    /// Someone else holds the slot. The caller should clear the selection
    /// and reload the calendar.
    #[error("This time slot has just been booked. Please choose another slot.")]
    SlotTaken,
    /// The write failed for any other reason. The form should be kept for a retry.
    /// The store's reason is for logs only and stays out of the message.
    #[error("We could not save your booking. Please try again.")]
    Persistence(String),
    #[error("Invalid booking details: {0}")]
    Invalid(String),
    /// The slot id is not part of the currently offered week.
    #[error("Unknown slot: {0}")]
    UnknownSlot(String),
}

/// Whether the confirmation went out. Never affects the booking itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationOutcome {
    Sent,
    Failed { reason: String },
}

/// A stored booking plus the fate of its confirmation.
#[derive(Debug, Clone)]
pub struct BookingReceipt {
    pub booking: Booking,
    pub notification: NotificationOutcome,
}

impl BookingReceipt {
    /// A non-fatal warning to show next to the success message, if any.
    pub fn warning(&self) -> Option<String> {
        match &self.notification {
            NotificationOutcome::Sent => None,
            NotificationOutcome::Failed { .. } => Some(
                "Your booking is confirmed, but the confirmation email could not be sent."
                    .to_string(),
            ),
        }
    }
}

#[derive(Clone)]
pub struct BookingService {
    store: Arc<dyn BookingStore>,
    notifier: Arc<dyn NotificationService>,
}

impl BookingService {
    pub fn new(store: Arc<dyn BookingStore>, notifier: Arc<dyn NotificationService>) -> Self {
        Self { store, notifier }
    }

    pub fn store(&self) -> &dyn BookingStore {
        self.store.as_ref()
    }

    /// Books `slot` for `customer`.
    ///
    /// No read-before-write happens here: a concurrent submission for the
    /// same slot is rejected by the store and surfaces as
    /// [`BookingError::SlotTaken`].
    pub async fn submit_booking(
        &self,
        slot: &Slot,
        customer: Customer,
    ) -> Result<BookingReceipt, BookingError> {
        validate_customer(&customer)?;

        let new_booking = NewBooking {
            slot_id: slot.id.clone(),
            customer_name: customer.name.trim().to_string(),
            customer_email: customer.email.trim().to_string(),
            company_name: customer.company_name.trim().to_string(),
            appointment_time: slot.appointment_label(),
        };

        let booking = match self.store.insert_booking(new_booking).await {
            Ok(booking) => booking,
            Err(e) if e.is_conflict() => {
                info!("Slot {} was already taken.", slot.id);
                return Err(BookingError::SlotTaken);
            }
            Err(e) => {
                error!("Failed to store booking for slot {}: {}", slot.id, e);
                return Err(BookingError::Persistence(e.to_string()));
            }
        };
        info!("Booked slot {} as booking {}.", booking.slot_id, booking.id);

        let notification = self.send_confirmation(&booking).await;
        Ok(BookingReceipt {
            booking,
            notification,
        })
    }

    pub async fn list_bookings(&self) -> PortResult<Vec<Booking>> {
        self.store.list_bookings().await
    }

    /// Deletes a booking, which frees its slot.
    pub async fn cancel_booking(&self, booking_id: Uuid) -> PortResult<()> {
        self.store.delete_booking(booking_id).await?;
        info!("Cancelled booking {}.", booking_id);
        Ok(())
    }

    async fn send_confirmation(&self, booking: &Booking) -> NotificationOutcome {
        let payload = json!({
            "booking_id": booking.id,
            "slot_id": booking.slot_id,
            "customer_name": booking.customer_name,
            "customer_email": booking.customer_email,
            "company_name": booking.company_name,
            "appointment_time": booking.appointment_time,
        });

        match self.notifier.invoke(CONFIRMATION_FUNCTION, payload).await {
            Ok(_) => NotificationOutcome::Sent,
            Err(e) => {
                warn!(
                    "Booking {} stored but confirmation could not be sent: {}",
                    booking.id, e
                );
                NotificationOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }
}

fn validate_customer(customer: &Customer) -> Result<(), BookingError> {
    if customer.name.trim().is_empty() {
        return Err(BookingError::Invalid("name is required".into()));
    }
    let email = customer.email.trim();
    if email.is_empty() || !email.contains('@') {
        return Err(BookingError::Invalid("a valid email is required".into()));
    }
    Ok(())
}
