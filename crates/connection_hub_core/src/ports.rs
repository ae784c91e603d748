//! crates/connection_hub_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of the hosted backend, the identity provider and the
//! notification functions.

use crate::domain::{Account, Booking, IdentitySession, NewBooking};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::Stream;
use std::pin::Pin;
use uuid::Uuid;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, Clone, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    /// A uniqueness constraint rejected the write.
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

impl PortError {
    /// Whether this error reports a uniqueness violation.
    ///
    /// Adapters should return [`PortError::Conflict`]. Backends that only
    /// surface the raw PostgreSQL message are still recognised through the
    /// `23505` code or the word "duplicate", which is brittle and only kept
    /// as a fallback.
    pub fn is_conflict(&self) -> bool {
        match self {
            PortError::Conflict(_) => true,
            PortError::Unexpected(message) => {
                let message = message.to_lowercase();
                message.contains("23505") || message.contains("duplicate")
            }
            _ => false,
        }
    }
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

/// Stream of identity changes. `None` means the identity signed out.
pub type SessionStream = Pin<Box<dyn Stream<Item = Option<IdentitySession>> + Send>>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait BookingStore: Send + Sync {
    /// Inserts a booking. Returns [`PortError::Conflict`] when the slot is already taken.
    async fn insert_booking(&self, booking: NewBooking) -> PortResult<Booking>;

    /// The `slot_id` of every stored booking, unfiltered.
    async fn booked_slot_ids(&self) -> PortResult<Vec<String>>;

    async fn list_bookings(&self) -> PortResult<Vec<Booking>>;

    async fn delete_booking(&self, booking_id: Uuid) -> PortResult<()>;
}

#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Reads a site setting by key. `Ok(None)` when no record exists.
    async fn get_setting(&self, key: &str) -> PortResult<Option<String>>;

    async fn put_setting(&self, key: &str, value: &str) -> PortResult<()>;
}

#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn get_account_by_email(&self, email: &str) -> PortResult<Account>;

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()>;

    /// Resolves a live (unexpired) auth session into the identity behind it.
    async fn validate_auth_session(&self, session_id: &str) -> PortResult<IdentitySession>;

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()>;
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    fn current_session(&self) -> Option<IdentitySession>;

    /// Emits on sign-in, sign-out and session refresh.
    fn session_changes(&self) -> SessionStream;

    async fn sign_in_with_password(&self, email: &str, password: &str)
        -> PortResult<IdentitySession>;

    async fn sign_out(&self) -> PortResult<()>;
}

#[async_trait]
pub trait NotificationService: Send + Sync {
    /// Invokes a hosted function by name with a JSON payload.
    async fn invoke(
        &self,
        function_name: &str,
        payload: serde_json::Value,
    ) -> PortResult<serde_json::Value>;
}
