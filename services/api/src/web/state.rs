//! services/api/src/web/state.rs
//!
//! Defines the application's shared state and the registry of per-browser
//! admin session contexts.

use crate::config::Config;
use chrono::Utc;
use connection_hub_core::{
    ports::{AccountStore, IdentityProvider, SettingsStore},
    AdminSession, BookingService,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
pub struct AppState {
    pub bookings: BookingService,
    pub settings: Arc<dyn SettingsStore>,
    pub accounts: Arc<dyn AccountStore>,
    pub config: Arc<Config>,
    pub sessions: SessionRegistry,
}

impl AppState {
    pub fn new(
        bookings: BookingService,
        settings: Arc<dyn SettingsStore>,
        accounts: Arc<dyn AccountStore>,
        config: Arc<Config>,
    ) -> Self {
        Self {
            bookings,
            settings,
            accounts,
            config,
            sessions: SessionRegistry::default(),
        }
    }

    /// Starts an admin session context for `identity` and registers it under
    /// the auth session id. If a context for that id already exists, it wins.
    pub async fn open_admin_session(
        &self,
        session_id: &str,
        identity: Arc<dyn IdentityProvider>,
    ) -> Arc<AdminSession> {
        let context =
            AdminSession::start(identity, self.settings.clone(), self.config.admin).await;
        self.sessions.insert(session_id, Arc::new(context)).await
    }
}

//=========================================================================================
// SessionRegistry (One Context per Signed-In Browser)
//=========================================================================================

#[derive(Default)]
pub struct SessionRegistry {
    contexts: Mutex<HashMap<String, Arc<AdminSession>>>,
}

impl SessionRegistry {
    pub async fn get(&self, session_id: &str) -> Option<Arc<AdminSession>> {
        self.contexts.lock().await.get(session_id).cloned()
    }

    /// Returns the registered context, which is `context` unless another one
    /// was registered first. A losing context shuts down when dropped.
    ///
    /// Contexts whose session has expired are evicted on the way.
    pub async fn insert(&self, session_id: &str, context: Arc<AdminSession>) -> Arc<AdminSession> {
        let mut contexts = self.contexts.lock().await;
        evict_expired(&mut contexts);
        let registered = contexts
            .entry(session_id.to_string())
            .or_insert(context)
            .clone();
        debug!("{} admin session contexts registered.", contexts.len());
        registered
    }

    /// Evicts every context whose session has expired or signed out.
    /// Returns how many were removed.
    pub async fn prune_expired(&self) -> usize {
        evict_expired(&mut *self.contexts.lock().await)
    }

    pub async fn count(&self) -> usize {
        self.contexts.lock().await.len()
    }

    /// Removes and shuts down the context for `session_id`.
    pub async fn remove(&self, session_id: &str) -> Option<Arc<AdminSession>> {
        let removed = self.contexts.lock().await.remove(session_id);
        if let Some(context) = &removed {
            context.shutdown();
        }
        removed
    }
}

fn evict_expired(contexts: &mut HashMap<String, Arc<AdminSession>>) -> usize {
    let now = Utc::now();
    let before = contexts.len();
    contexts.retain(|_, context| {
        let live = context
            .current_session()
            .is_some_and(|session| session.expires_at > now);
        if !live {
            context.shutdown();
        }
        live
    });
    let evicted = before - contexts.len();
    if evicted > 0 {
        info!("Evicted {} expired admin session contexts.", evicted);
    }
    evicted
}
