pub mod admin;
pub mod booking;
pub mod domain;
pub mod ports;
pub mod session;
pub mod slots;

#[cfg(test)]
mod testutils;

pub use admin::{AdminStatusConfig, AdminStatusResolver, ADMIN_EMAILS_SETTING};
pub use booking::{BookingError, BookingReceipt, BookingService, NotificationOutcome};
pub use domain::{Account, Booking, Customer, IdentitySession, NewBooking, Slot};
pub use ports::{
    AccountStore, BookingStore, IdentityProvider, NotificationService, PortError, PortResult,
    SessionStream, SettingsStore,
};
pub use session::{broadcast_session_stream, AdminSession};
pub use slots::{fetch_booked_slot_ids, generate_week_slots, load_week};
