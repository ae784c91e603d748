//! services/api/src/adapters/memory.rs
//!
//! An in-process implementation of the store ports, used when no
//! `DATABASE_URL` is configured and by the service tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use connection_hub_core::domain::{Account, Booking, IdentitySession, NewBooking};
use connection_hub_core::ports::{
    AccountStore, BookingStore, PortError, PortResult, SettingsStore,
};
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Default)]
struct MemoryData {
    /// Keyed by `slot_id`, which doubles as the uniqueness constraint.
    bookings: HashMap<String, Booking>,
    settings: HashMap<String, String>,
    /// Keyed by email.
    accounts: HashMap<String, Account>,
    auth_sessions: HashMap<String, (Uuid, DateTime<Utc>)>,
}

#[derive(Default)]
pub struct MemoryStore {
    data: Mutex<MemoryData>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an account. The password must already be hashed.
    pub async fn add_account(&self, email: &str, hashed_password: &str) -> PortResult<Account> {
        let mut data = self.data.lock().await;
        if data.accounts.contains_key(email) {
            return Err(PortError::Conflict(format!("Account {} already exists", email)));
        }
        let account = Account {
            user_id: Uuid::new_v4(),
            email: email.to_string(),
            hashed_password: hashed_password.to_string(),
        };
        data.accounts.insert(email.to_string(), account.clone());
        Ok(account)
    }
}

#[async_trait]
impl BookingStore for MemoryStore {
    async fn insert_booking(&self, booking: NewBooking) -> PortResult<Booking> {
        let mut data = self.data.lock().await;
        if data.bookings.contains_key(&booking.slot_id) {
            return Err(PortError::Conflict(format!(
                "duplicate key value violates unique constraint on slot_id {}",
                booking.slot_id
            )));
        }
        let stored = Booking {
            id: Uuid::new_v4(),
            slot_id: booking.slot_id,
            customer_name: booking.customer_name,
            customer_email: booking.customer_email,
            company_name: booking.company_name,
            appointment_time: booking.appointment_time,
            created_at: Utc::now(),
        };
        data.bookings.insert(stored.slot_id.clone(), stored.clone());
        Ok(stored)
    }

    async fn booked_slot_ids(&self) -> PortResult<Vec<String>> {
        Ok(self.data.lock().await.bookings.keys().cloned().collect())
    }

    async fn list_bookings(&self) -> PortResult<Vec<Booking>> {
        let mut bookings: Vec<Booking> =
            self.data.lock().await.bookings.values().cloned().collect();
        bookings.sort_by(|a, b| a.slot_id.cmp(&b.slot_id));
        Ok(bookings)
    }

    async fn delete_booking(&self, booking_id: Uuid) -> PortResult<()> {
        let mut data = self.data.lock().await;
        let slot_id = data
            .bookings
            .values()
            .find(|booking| booking.id == booking_id)
            .map(|booking| booking.slot_id.clone())
            .ok_or_else(|| PortError::NotFound(format!("Booking {} not found", booking_id)))?;
        data.bookings.remove(&slot_id);
        Ok(())
    }
}

#[async_trait]
impl SettingsStore for MemoryStore {
    async fn get_setting(&self, key: &str) -> PortResult<Option<String>> {
        Ok(self.data.lock().await.settings.get(key).cloned())
    }

    async fn put_setting(&self, key: &str, value: &str) -> PortResult<()> {
        self.data
            .lock()
            .await
            .settings
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn get_account_by_email(&self, email: &str) -> PortResult<Account> {
        self.data
            .lock()
            .await
            .accounts
            .get(email)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Account {} not found", email)))
    }

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        let mut data = self.data.lock().await;
        let now = Utc::now();
        data.auth_sessions.retain(|_, (_, until)| *until > now);
        if data.auth_sessions.contains_key(session_id) {
            return Err(PortError::Conflict(format!("Session {} already exists", session_id)));
        }
        data.auth_sessions
            .insert(session_id.to_string(), (user_id, expires_at));
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<IdentitySession> {
        let data = self.data.lock().await;
        let (user_id, expires_at) = data
            .auth_sessions
            .get(session_id)
            .copied()
            .filter(|(_, expires_at)| *expires_at > Utc::now())
            .ok_or(PortError::Unauthorized)?;
        let account = data
            .accounts
            .values()
            .find(|account| account.user_id == user_id)
            .ok_or(PortError::Unauthorized)?;

        Ok(IdentitySession {
            session_id: session_id.to_string(),
            user_id,
            email: account.email.clone(),
            expires_at,
        })
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        self.data.lock().await.auth_sessions.remove(session_id);
        Ok(())
    }
}
