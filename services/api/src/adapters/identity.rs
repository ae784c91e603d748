//! services/api/src/adapters/identity.rs
//!
//! Password-based identity provider. One instance represents one browser's
//! sign-in state and broadcasts every change of it.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use async_trait::async_trait;
use chrono::Utc;
use connection_hub_core::{
    broadcast_session_stream,
    domain::IdentitySession,
    ports::{AccountStore, IdentityProvider, PortError, PortResult, SessionStream},
};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::broadcast;
use tracing::{debug, error, info};
use uuid::Uuid;

const CHANGE_CHANNEL_CAPACITY: usize = 16;

/// Hashes a password for storage in `accounts.hashed_password`.
pub fn hash_password(password: &str) -> PortResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| {
            error!("Failed to hash password: {:?}", e);
            PortError::Unexpected("Failed to hash password".to_string())
        })
}

fn verify_password(password: &str, hashed_password: &str) -> PortResult<bool> {
    let parsed_hash = PasswordHash::new(hashed_password).map_err(|e| {
        error!("Failed to parse password hash: {:?}", e);
        PortError::Unexpected("Authentication error".to_string())
    })?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

pub struct PasswordIdentity {
    accounts: Arc<dyn AccountStore>,
    session_ttl: chrono::Duration,
    current: Mutex<Option<IdentitySession>>,
    changes: broadcast::Sender<Option<IdentitySession>>,
}

impl PasswordIdentity {
    /// A signed-out identity.
    pub fn new(accounts: Arc<dyn AccountStore>, session_ttl: chrono::Duration) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            accounts,
            session_ttl,
            current: Mutex::new(None),
            changes,
        }
    }

    /// An identity resumed from an auth session that was validated elsewhere.
    pub fn restore(
        accounts: Arc<dyn AccountStore>,
        session_ttl: chrono::Duration,
        session: IdentitySession,
    ) -> Self {
        let identity = Self::new(accounts, session_ttl);
        *identity.lock_current() = Some(session);
        identity
    }

    fn lock_current(&self) -> std::sync::MutexGuard<'_, Option<IdentitySession>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_current(&self, session: Option<IdentitySession>) {
        *self.lock_current() = session.clone();
        // No receivers is fine: nobody is watching yet.
        if self.changes.send(session).is_err() {
            debug!("Identity change emitted with no subscribers.");
        }
    }
}

#[async_trait]
impl IdentityProvider for PasswordIdentity {
    fn current_session(&self) -> Option<IdentitySession> {
        self.lock_current().clone()
    }

    fn session_changes(&self) -> SessionStream {
        broadcast_session_stream(self.changes.subscribe())
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> PortResult<IdentitySession> {
        let account = match self.accounts.get_account_by_email(email).await {
            Ok(account) => account,
            Err(PortError::NotFound(_)) => return Err(PortError::Unauthorized),
            Err(e) => return Err(e),
        };

        if !verify_password(password, &account.hashed_password)? {
            return Err(PortError::Unauthorized);
        }

        let session = IdentitySession {
            session_id: Uuid::new_v4().to_string(),
            user_id: account.user_id,
            email: account.email,
            expires_at: Utc::now() + self.session_ttl,
        };
        self.accounts
            .create_auth_session(&session.session_id, session.user_id, session.expires_at)
            .await?;

        info!("User {} signed in.", session.user_id);
        self.set_current(Some(session.clone()));
        Ok(session)
    }

    async fn sign_out(&self) -> PortResult<()> {
        let previous = self.lock_current().take();
        let result = match &previous {
            Some(session) => self.accounts.delete_auth_session(&session.session_id).await,
            None => Ok(()),
        };
        if let Some(session) = previous {
            info!("User {} signed out.", session.user_id);
        }
        self.set_current(None);
        result
    }
}
