//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the store ports from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use connection_hub_core::domain::{Account, Booking, IdentitySession, NewBooking};
use connection_hub_core::ports::{
    AccountStore, BookingStore, PortError, PortResult, SettingsStore,
};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the booking, settings and account ports.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

/// Unique violations become `Conflict`; everything else is unexpected.
fn map_write_error(e: sqlx::Error) -> PortError {
    match &e {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            PortError::Conflict(db_err.message().to_string())
        }
        _ => PortError::Unexpected(e.to_string()),
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct BookingRecord {
    id: Uuid,
    slot_id: String,
    customer_name: String,
    customer_email: String,
    company_name: String,
    appointment_time: String,
    created_at: DateTime<Utc>,
}
impl BookingRecord {
    fn to_domain(self) -> Booking {
        Booking {
            id: self.id,
            slot_id: self.slot_id,
            customer_name: self.customer_name,
            customer_email: self.customer_email,
            company_name: self.company_name,
            appointment_time: self.appointment_time,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct AccountRecord {
    user_id: Uuid,
    email: String,
    hashed_password: String,
}
impl AccountRecord {
    fn to_domain(self) -> Account {
        Account {
            user_id: self.user_id,
            email: self.email,
            hashed_password: self.hashed_password,
        }
    }
}

#[derive(FromRow)]
struct AuthSessionRecord {
    id: String,
    user_id: Uuid,
    email: String,
    expires_at: DateTime<Utc>,
}
impl AuthSessionRecord {
    fn to_domain(self) -> IdentitySession {
        IdentitySession {
            session_id: self.id,
            user_id: self.user_id,
            email: self.email,
            expires_at: self.expires_at,
        }
    }
}

//=========================================================================================
// `BookingStore` Trait Implementation
//=========================================================================================

const BOOKING_COLUMNS: &str =
    "id, slot_id, customer_name, customer_email, company_name, appointment_time, created_at";

#[async_trait]
impl BookingStore for DbAdapter {
    async fn insert_booking(&self, booking: NewBooking) -> PortResult<Booking> {
        let query = format!(
            "INSERT INTO bookings (id, slot_id, customer_name, customer_email, company_name, appointment_time) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {}",
            BOOKING_COLUMNS
        );
        let record = sqlx::query_as::<_, BookingRecord>(&query)
            .bind(Uuid::new_v4())
            .bind(&booking.slot_id)
            .bind(&booking.customer_name)
            .bind(&booking.customer_email)
            .bind(&booking.company_name)
            .bind(&booking.appointment_time)
            .fetch_one(&self.pool)
            .await
            .map_err(map_write_error)?;
        Ok(record.to_domain())
    }

    async fn booked_slot_ids(&self) -> PortResult<Vec<String>> {
        sqlx::query_scalar::<_, String>("SELECT slot_id FROM bookings")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))
    }

    async fn list_bookings(&self) -> PortResult<Vec<Booking>> {
        let query = format!("SELECT {} FROM bookings ORDER BY slot_id ASC", BOOKING_COLUMNS);
        let records = sqlx::query_as::<_, BookingRecord>(&query)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let bookings = records.into_iter().map(|r| r.to_domain()).collect();
        Ok(bookings)
    }

    async fn delete_booking(&self, booking_id: Uuid) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM bookings WHERE id = $1")
            .bind(booking_id)
            .execute(&self.pool)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Booking {} not found", booking_id)));
        }
        Ok(())
    }
}

//=========================================================================================
// `SettingsStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl SettingsStore for DbAdapter {
    async fn get_setting(&self, key: &str) -> PortResult<Option<String>> {
        sqlx::query_scalar::<_, String>("SELECT value FROM site_settings WHERE key = $1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))
    }

    async fn put_setting(&self, key: &str, value: &str) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO site_settings (key, value) VALUES ($1, $2) \
             ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value, updated_at = NOW()",
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(())
    }
}

//=========================================================================================
// `AccountStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl AccountStore for DbAdapter {
    async fn get_account_by_email(&self, email: &str) -> PortResult<Account> {
        let record = sqlx::query_as::<_, AccountRecord>(
            "SELECT user_id, email, hashed_password FROM accounts WHERE email = $1",
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound(format!("Account {} not found", email)),
            _ => PortError::Unexpected(e.to_string()),
        })?;
        Ok(record.to_domain())
    }

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        sqlx::query("DELETE FROM auth_sessions WHERE expires_at <= NOW()")
            .execute(&self.pool)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        sqlx::query("INSERT INTO auth_sessions (id, user_id, expires_at) VALUES ($1, $2, $3)")
            .bind(session_id)
            .bind(user_id)
            .bind(expires_at)
            .execute(&self.pool)
            .await
            .map_err(map_write_error)?;
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<IdentitySession> {
        let record = sqlx::query_as::<_, AuthSessionRecord>(
            "SELECT s.id, s.user_id, a.email, s.expires_at \
             FROM auth_sessions s JOIN accounts a ON a.user_id = s.user_id \
             WHERE s.id = $1 AND s.expires_at > NOW()",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        record
            .map(AuthSessionRecord::to_domain)
            .ok_or(PortError::Unauthorized)
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        sqlx::query("DELETE FROM auth_sessions WHERE id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(())
    }
}
