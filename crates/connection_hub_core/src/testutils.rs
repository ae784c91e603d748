use crate::{
    domain::{Booking, IdentitySession, NewBooking},
    ports::{
        BookingStore, IdentityProvider, NotificationService, PortError, PortResult,
        SessionStream, SettingsStore,
    },
    session::broadcast_session_stream,
};
use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use std::{
    collections::{HashMap, VecDeque},
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};
use tokio::sync::broadcast;
use uuid::Uuid;

//=========================================================================================
// Booking store
//=========================================================================================

pub struct MockBookingStoreInner {
    pub calls_to_insert_booking: AtomicU64,
    pub calls_to_booked_slot_ids: AtomicU64,
    pub failure: Mutex<Option<String>>,
    pub bookings: Mutex<HashMap<String, Booking>>,
}

#[derive(Clone)]
pub struct MockBookingStore(pub Arc<MockBookingStoreInner>);

impl MockBookingStore {
    pub fn new() -> Self {
        Self(Arc::new(MockBookingStoreInner {
            calls_to_insert_booking: AtomicU64::default(),
            calls_to_booked_slot_ids: AtomicU64::default(),
            failure: Mutex::default(),
            bookings: Mutex::default(),
        }))
    }

    /// Every following call fails with `PortError::Unexpected(message)`.
    pub fn fail_with(&self, message: &str) {
        *self.0.failure.lock().unwrap() = Some(message.to_string());
    }

    pub fn seed_slot(&self, slot_id: &str) {
        let booking = Booking {
            id: Uuid::new_v4(),
            slot_id: slot_id.to_string(),
            customer_name: "Seeded".into(),
            customer_email: "seeded@example.com".into(),
            company_name: String::new(),
            appointment_time: String::new(),
            created_at: Utc::now(),
        };
        self.0
            .bookings
            .lock()
            .unwrap()
            .insert(slot_id.to_string(), booking);
    }

    pub fn booked(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.0.bookings.lock().unwrap().keys().cloned().collect();
        ids.sort();
        ids
    }

    fn result(&self) -> PortResult<()> {
        match self.0.failure.lock().unwrap().clone() {
            None => Ok(()),
            Some(message) => Err(PortError::Unexpected(message)),
        }
    }
}

#[async_trait]
impl BookingStore for MockBookingStore {
    async fn insert_booking(&self, booking: NewBooking) -> PortResult<Booking> {
        self.0.calls_to_insert_booking.fetch_add(1, Ordering::SeqCst);
        // Yield so concurrent submissions interleave before the write.
        tokio::task::yield_now().await;
        self.result()?;

        let mut bookings = self.0.bookings.lock().unwrap();
        if bookings.contains_key(&booking.slot_id) {
            return Err(PortError::Conflict(booking.slot_id));
        }
        let stored = Booking {
            id: Uuid::new_v4(),
            slot_id: booking.slot_id.clone(),
            customer_name: booking.customer_name,
            customer_email: booking.customer_email,
            company_name: booking.company_name,
            appointment_time: booking.appointment_time,
            created_at: Utc::now(),
        };
        bookings.insert(booking.slot_id, stored.clone());
        Ok(stored)
    }

    async fn booked_slot_ids(&self) -> PortResult<Vec<String>> {
        self.0.calls_to_booked_slot_ids.fetch_add(1, Ordering::SeqCst);
        self.result()?;
        Ok(self.booked())
    }

    async fn list_bookings(&self) -> PortResult<Vec<Booking>> {
        self.result()?;
        Ok(self.0.bookings.lock().unwrap().values().cloned().collect())
    }

    async fn delete_booking(&self, booking_id: Uuid) -> PortResult<()> {
        self.result()?;
        let mut bookings = self.0.bookings.lock().unwrap();
        let before = bookings.len();
        bookings.retain(|_, booking| booking.id != booking_id);
        if bookings.len() == before {
            return Err(PortError::NotFound(format!("Booking {} not found", booking_id)));
        }
        Ok(())
    }
}

//=========================================================================================
// Notifier
//=========================================================================================

pub struct MockNotifierInner {
    pub success: AtomicBool,
    pub calls_to_invoke: AtomicU64,
}

#[derive(Clone)]
pub struct MockNotifier(pub Arc<MockNotifierInner>);

impl MockNotifier {
    pub fn new() -> Self {
        Self(Arc::new(MockNotifierInner {
            success: AtomicBool::new(true),
            calls_to_invoke: AtomicU64::default(),
        }))
    }
}

#[async_trait]
impl NotificationService for MockNotifier {
    async fn invoke(
        &self,
        _function_name: &str,
        _payload: serde_json::Value,
    ) -> PortResult<serde_json::Value> {
        self.0.calls_to_invoke.fetch_add(1, Ordering::SeqCst);
        match self.0.success.load(Ordering::SeqCst) {
            true => Ok(serde_json::Value::Null),
            false => Err(PortError::Unexpected("Supposed to fail".into())),
        }
    }
}

//=========================================================================================
// Settings store
//=========================================================================================

pub struct MockSettingsStoreInner {
    pub calls_to_get_setting: AtomicU64,
    pub success: AtomicBool,
    pub value: Mutex<Option<String>>,
    /// Per-call latency, consumed front to back. Empty means no delay.
    pub delays: Mutex<VecDeque<Duration>>,
}

#[derive(Clone)]
pub struct MockSettingsStore(pub Arc<MockSettingsStoreInner>);

impl MockSettingsStore {
    pub fn new(value: Option<&str>) -> Self {
        Self(Arc::new(MockSettingsStoreInner {
            calls_to_get_setting: AtomicU64::default(),
            success: AtomicBool::new(true),
            value: Mutex::new(value.map(str::to_string)),
            delays: Mutex::default(),
        }))
    }

    pub fn with_admins(emails: &[&str]) -> Self {
        Self::new(Some(&serde_json::to_string(emails).unwrap()))
    }

    pub fn push_delay(&self, delay: Duration) {
        self.0.delays.lock().unwrap().push_back(delay);
    }

    pub fn calls(&self) -> u64 {
        self.0.calls_to_get_setting.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SettingsStore for MockSettingsStore {
    async fn get_setting(&self, _key: &str) -> PortResult<Option<String>> {
        self.0.calls_to_get_setting.fetch_add(1, Ordering::SeqCst);
        let delay = self.0.delays.lock().unwrap().pop_front();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        match self.0.success.load(Ordering::SeqCst) {
            true => Ok(self.0.value.lock().unwrap().clone()),
            false => Err(PortError::Unexpected("Supposed to fail".into())),
        }
    }

    async fn put_setting(&self, _key: &str, value: &str) -> PortResult<()> {
        *self.0.value.lock().unwrap() = Some(value.to_string());
        Ok(())
    }
}

//=========================================================================================
// Identity provider
//=========================================================================================

pub struct MockIdentityInner {
    pub current: Mutex<Option<IdentitySession>>,
    pub changes: broadcast::Sender<Option<IdentitySession>>,
    pub calls_to_sign_out: AtomicU64,
}

#[derive(Clone)]
pub struct MockIdentity(pub Arc<MockIdentityInner>);

impl MockIdentity {
    pub fn new(current: Option<&str>) -> Self {
        let (changes, _) = broadcast::channel(16);
        Self(Arc::new(MockIdentityInner {
            current: Mutex::new(current.map(session_for)),
            changes,
            calls_to_sign_out: AtomicU64::default(),
        }))
    }

    /// Simulates an auth-state change notification.
    pub fn emit(&self, email: Option<&str>) {
        let session = email.map(session_for);
        *self.0.current.lock().unwrap() = session.clone();
        let _ = self.0.changes.send(session);
    }
}

pub fn session_for(email: &str) -> IdentitySession {
    IdentitySession {
        session_id: format!("session-{}", email),
        user_id: Uuid::new_v4(),
        email: email.to_string(),
        expires_at: Utc::now() + ChronoDuration::days(1),
    }
}

#[async_trait]
impl IdentityProvider for MockIdentity {
    fn current_session(&self) -> Option<IdentitySession> {
        self.0.current.lock().unwrap().clone()
    }

    fn session_changes(&self) -> SessionStream {
        broadcast_session_stream(self.0.changes.subscribe())
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        _password: &str,
    ) -> PortResult<IdentitySession> {
        self.emit(Some(email));
        self.current_session().ok_or(PortError::Unauthorized)
    }

    async fn sign_out(&self) -> PortResult<()> {
        self.0.calls_to_sign_out.fetch_add(1, Ordering::SeqCst);
        self.emit(None);
        Ok(())
    }
}
