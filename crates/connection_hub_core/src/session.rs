//! crates/connection_hub_core/src/session.rs
//!
//! The admin session context: owns one [`AdminStatusResolver`] for an
//! authenticated identity and keeps it in step with the identity provider.

use crate::{
    admin::{AdminStatusConfig, AdminStatusResolver},
    domain::IdentitySession,
    ports::{IdentityProvider, SessionStream, SettingsStore},
};
use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Adapts a broadcast receiver of session changes into a [`SessionStream`].
///
/// Lagged receivers skip ahead instead of ending the stream; the stream ends
/// once the sender is dropped.
pub fn broadcast_session_stream(
    receiver: broadcast::Receiver<Option<IdentitySession>>,
) -> SessionStream {
    Box::pin(futures::stream::unfold(receiver, |mut receiver| async move {
        loop {
            match receiver.recv().await {
                Ok(session) => return Some((session, receiver)),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!("Session stream lagged, skipped {} notifications.", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }))
}

/// One signed-in browser session's view of its admin status.
///
/// Dropping the context (or calling [`AdminSession::shutdown`]) stops the
/// identity watcher and suppresses further publishes.
pub struct AdminSession {
    identity: Arc<dyn IdentityProvider>,
    resolver: Arc<AdminStatusResolver>,
    shutdown: CancellationToken,
}

impl AdminSession {
    /// Creates the context, resolves the admin status of an already existing
    /// session and starts watching identity changes.
    pub async fn start(
        identity: Arc<dyn IdentityProvider>,
        settings: Arc<dyn SettingsStore>,
        config: AdminStatusConfig,
    ) -> Self {
        let resolver = Arc::new(AdminStatusResolver::new(settings, config));
        let shutdown = CancellationToken::new();

        // Subscribe before the initial resolution so no change is missed.
        let changes = identity.session_changes();
        if let Some(session) = identity.current_session() {
            resolver.resolve_admin_status(&session.email, false).await;
        }
        tokio::spawn(watch_identity(
            changes,
            resolver.clone(),
            config,
            shutdown.clone(),
        ));

        Self {
            identity,
            resolver,
            shutdown,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.resolver.is_admin()
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.resolver.subscribe()
    }

    pub fn current_session(&self) -> Option<IdentitySession> {
        self.identity.current_session()
    }

    /// Re-resolves the current identity, bypassing the cache and any running lookup.
    pub async fn refresh_admin_status(&self) {
        match self.identity.current_session() {
            Some(session) => self.resolver.resolve_admin_status(&session.email, true).await,
            None => self.resolver.reset(),
        }
    }

    /// Signs the identity out, then clears the cached status and publishes `false`.
    pub async fn sign_out(&self) {
        if let Err(e) = self.identity.sign_out().await {
            warn!("Identity sign-out failed: {}", e);
        }
        self.resolver.reset();
    }

    /// Stops watching identity changes and silences the resolver.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
        self.resolver.unmount();
    }
}

impl Drop for AdminSession {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Debounces identity changes: each change replaces the pending one, and only
/// a change left alone for the debounce period reaches the resolver.
async fn watch_identity(
    mut changes: SessionStream,
    resolver: Arc<AdminStatusResolver>,
    config: AdminStatusConfig,
    shutdown: CancellationToken,
) {
    let mut pending: Option<CancellationToken> = None;

    loop {
        let change = tokio::select! {
            _ = shutdown.cancelled() => break,
            change = changes.next() => match change {
                Some(change) => change,
                None => break,
            },
        };

        let scheduled = shutdown.child_token();
        if let Some(previous) = pending.replace(scheduled.clone()) {
            previous.cancel();
        }

        let resolver = resolver.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = scheduled.cancelled() => return,
                _ = tokio::time::sleep(config.debounce) => {}
            }
            match change {
                Some(session) => resolver.resolve_admin_status(&session.email, false).await,
                None => resolver.reset(),
            }
        });
    }

    if let Some(pending) = pending {
        pending.cancel();
    }
    info!("Identity watcher stopped.");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutils::{MockIdentity, MockSettingsStore};
    use std::{sync::atomic::Ordering, time::Duration};

    async fn init(identity: &MockIdentity, store: &MockSettingsStore) -> AdminSession {
        AdminSession::start(
            Arc::new(identity.clone()),
            Arc::new(store.clone()),
            AdminStatusConfig::default(),
        )
        .await
    }

    #[tokio::test(start_paused = true)]
    async fn resolves_existing_session_on_start() {
        let identity = MockIdentity::new(Some("a@x.com"));
        let store = MockSettingsStore::with_admins(&["a@x.com"]);

        let session = init(&identity, &store).await;

        assert!(session.is_admin());
        assert_eq!(store.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn no_session_means_no_lookup() {
        let identity = MockIdentity::new(None);
        let store = MockSettingsStore::with_admins(&["a@x.com"]);

        let session = init(&identity, &store).await;

        assert!(!session.is_admin());
        assert_eq!(store.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn bursts_of_changes_resolve_once() {
        let identity = MockIdentity::new(None);
        let store = MockSettingsStore::with_admins(&["c@x.com"]);
        let session = init(&identity, &store).await;

        identity.emit(Some("a@x.com"));
        tokio::time::sleep(Duration::from_millis(40)).await;
        identity.emit(Some("b@x.com"));
        tokio::time::sleep(Duration::from_millis(40)).await;
        identity.emit(Some("c@x.com"));
        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(store.calls(), 0);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(store.calls(), 1);
        assert!(session.is_admin());
    }

    #[tokio::test(start_paused = true)]
    async fn separated_changes_each_resolve() {
        let identity = MockIdentity::new(None);
        let store = MockSettingsStore::with_admins(&["a@x.com"]);
        let session = init(&identity, &store).await;

        identity.emit(Some("a@x.com"));
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(session.is_admin());

        identity.emit(Some("b@x.com"));
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(!session.is_admin());
        assert_eq!(store.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn sign_out_notification_clears_status() {
        let identity = MockIdentity::new(Some("a@x.com"));
        let store = MockSettingsStore::with_admins(&["a@x.com"]);
        let session = init(&identity, &store).await;
        assert!(session.is_admin());

        identity.emit(None);
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert!(!session.is_admin());
    }

    #[tokio::test(start_paused = true)]
    async fn explicit_sign_out_clears_immediately() {
        let identity = MockIdentity::new(Some("a@x.com"));
        let store = MockSettingsStore::with_admins(&["a@x.com"]);
        let session = init(&identity, &store).await;

        session.sign_out().await;

        assert!(!session.is_admin());
        assert_eq!(identity.0.calls_to_sign_out.load(Ordering::SeqCst), 1);

        // Signing back in must go to the store again: the cache was cleared.
        identity.emit(Some("a@x.com"));
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(session.is_admin());
        assert_eq!(store.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn quick_sign_back_in_during_slow_lookup_resolves() {
        let identity = MockIdentity::new(None);
        let store = MockSettingsStore::with_admins(&["a@x.com"]);
        store.push_delay(Duration::from_secs(3));
        let session = init(&identity, &store).await;

        identity.emit(Some("a@x.com"));
        tokio::time::sleep(Duration::from_millis(600)).await;
        identity.emit(None);
        tokio::time::sleep(Duration::from_millis(600)).await;
        identity.emit(Some("a@x.com"));
        tokio::time::sleep(Duration::from_secs(20)).await;

        assert_eq!(store.calls(), 2);
        assert!(session.is_admin());
    }

    #[tokio::test(start_paused = true)]
    async fn subscribers_see_status_changes() {
        let identity = MockIdentity::new(None);
        let store = MockSettingsStore::with_admins(&["a@x.com"]);
        let session = init(&identity, &store).await;
        let mut status = session.subscribe();

        identity.emit(Some("a@x.com"));
        tokio::time::timeout(Duration::from_secs(2), status.changed())
            .await
            .unwrap()
            .unwrap();
        assert!(*status.borrow_and_update());

        session.sign_out().await;
        assert!(status.has_changed().unwrap());
        assert!(!*status.borrow_and_update());
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_forces_a_lookup() {
        let identity = MockIdentity::new(Some("a@x.com"));
        let store = MockSettingsStore::with_admins(&["a@x.com"]);
        let session = init(&identity, &store).await;

        *store.0.value.lock().unwrap() = Some("[]".into());
        session.refresh_admin_status().await;

        assert!(!session.is_admin());
        assert_eq!(store.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_cancels_pending_resolution() {
        let identity = MockIdentity::new(None);
        let store = MockSettingsStore::with_admins(&["a@x.com"]);
        let session = init(&identity, &store).await;

        identity.emit(Some("a@x.com"));
        tokio::time::sleep(Duration::from_millis(100)).await;
        session.shutdown();
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert_eq!(store.calls(), 0);
        assert!(!session.is_admin());
    }
}
