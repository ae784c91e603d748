//! crates/connection_hub_core/src/admin.rs
//!
//! Resolves whether the signed-in identity is an administrator.
//!
//! Resolution is triggered from UI-like events (sign-in, tab focus, token
//! refresh) that can fire in quick bursts. The resolver therefore keeps a
//! short-lived cache, collapses calls while a lookup is running, bounds every
//! lookup with a timeout and makes sure the most recent invocation wins even
//! when an older lookup completes last.

use crate::ports::SettingsStore;
use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};
use tokio::{sync::watch, time::Instant};
use tracing::{debug, info, warn};

/// Key of the site setting holding the JSON array of admin emails.
pub const ADMIN_EMAILS_SETTING: &str = "admin_emails";

/// Timing knobs of the admin status resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdminStatusConfig {
    /// How long a resolved status is reused without a lookup.
    pub cache_ttl: Duration,
    /// Upper bound on a single settings lookup.
    pub lookup_timeout: Duration,
    /// Quiet period applied to identity change notifications.
    pub debounce: Duration,
}

impl Default for AdminStatusConfig {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(5 * 60),
            lookup_timeout: Duration::from_secs(10),
            debounce: Duration::from_millis(500),
        }
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    email: String,
    is_admin: bool,
    resolved_at: Instant,
}

#[derive(Debug)]
struct InFlight {
    request_id: u64,
    email: String,
}

#[derive(Debug)]
struct ResolverState {
    request_counter: u64,
    in_flight: Option<InFlight>,
    cache: Option<CacheEntry>,
    mounted: bool,
}

/// Session-scoped admin status resolver.
///
/// The current value is published on a `watch` channel; [`subscribe`]
/// hands out receivers.
///
/// [`subscribe`]: AdminStatusResolver::subscribe
pub struct AdminStatusResolver {
    settings: Arc<dyn SettingsStore>,
    config: AdminStatusConfig,
    state: Mutex<ResolverState>,
    status: watch::Sender<bool>,
}

impl AdminStatusResolver {
    pub fn new(settings: Arc<dyn SettingsStore>, config: AdminStatusConfig) -> Self {
        let (status, _) = watch::channel(false);
        Self {
            settings,
            config,
            state: Mutex::new(ResolverState {
                request_counter: 0,
                in_flight: None,
                cache: None,
                mounted: true,
            }),
            status,
        }
    }

    /// The last published admin status.
    pub fn is_admin(&self) -> bool {
        *self.status.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.status.subscribe()
    }

    /// Resolves and publishes the admin status of `email`.
    ///
    /// Never fails: lookup errors and timeouts fall back to the cached value
    /// for `email`, or `false`.
    pub async fn resolve_admin_status(&self, email: &str, force_check: bool) {
        let request_id = {
            let mut state = self.state();

            // Only a lookup that is still the newest request can absorb this call.
            if !force_check {
                if let Some(in_flight) = &state.in_flight {
                    if in_flight.email == email && in_flight.request_id == state.request_counter {
                        debug!(
                            "Admin lookup for {} already running (request {}), dropping call.",
                            email, in_flight.request_id
                        );
                        return;
                    }
                }
            }

            state.request_counter += 1;
            let request_id = state.request_counter;

            if !force_check {
                let fresh = state
                    .cache
                    .as_ref()
                    .filter(|entry| {
                        entry.email == email && entry.resolved_at.elapsed() < self.config.cache_ttl
                    })
                    .map(|entry| entry.is_admin);
                if let Some(is_admin) = fresh {
                    debug!("Using cached admin status for {}.", email);
                    self.publish(&state, is_admin);
                    return;
                }
            }

            state.in_flight = Some(InFlight {
                request_id,
                email: email.to_string(),
            });
            request_id
        };

        let in_flight = InFlightGuard {
            resolver: self,
            request_id,
        };
        let outcome = tokio::time::timeout(
            self.config.lookup_timeout,
            self.settings.get_setting(ADMIN_EMAILS_SETTING),
        )
        .await;
        drop(in_flight);

        let mut state = self.state();
        if request_id != state.request_counter {
            debug!(
                "Discarding admin lookup {} for {}: superseded by request {}.",
                request_id, email, state.request_counter
            );
            return;
        }

        let lookup = match outcome {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(e.to_string()),
            Err(_) => Err(format!("timed out after {:?}", self.config.lookup_timeout)),
        };

        match lookup {
            Ok(None) => {
                warn!(
                    "No '{}' setting found, treating {} as non-admin.",
                    ADMIN_EMAILS_SETTING, email
                );
                self.publish(&state, false);
            }
            Ok(Some(raw)) => match parse_admin_emails(&raw) {
                Ok(admins) => {
                    let is_admin = admins.iter().any(|admin| admin == email);
                    state.cache = Some(CacheEntry {
                        email: email.to_string(),
                        is_admin,
                        resolved_at: Instant::now(),
                    });
                    info!("Resolved admin status for {}: {}.", email, is_admin);
                    self.publish(&state, is_admin);
                }
                Err(e) => {
                    warn!("Malformed '{}' setting: {}", ADMIN_EMAILS_SETTING, e);
                    let fallback = cached_status(&state, email);
                    self.publish(&state, fallback);
                }
            },
            Err(reason) => {
                let fallback = cached_status(&state, email);
                warn!(
                    "Admin lookup for {} failed ({}), falling back to {}.",
                    email, reason, fallback
                );
                self.publish(&state, fallback);
            }
        }
    }

    /// Clears the cache and publishes `false`.
    ///
    /// Also supersedes any lookup still running, so it cannot re-publish a
    /// status for an identity that has gone away, nor absorb the next call.
    pub fn reset(&self) {
        let mut state = self.state();
        state.request_counter += 1;
        state.in_flight = None;
        state.cache = None;
        self.publish(&state, false);
    }

    /// Stops all further publishes. Lookups still running finish silently.
    pub fn unmount(&self) {
        self.state().mounted = false;
    }

    fn publish(&self, state: &ResolverState, is_admin: bool) {
        if state.mounted {
            self.status.send_replace(is_admin);
        }
    }

    fn state(&self) -> MutexGuard<'_, ResolverState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Clears the in-flight marker when its owning request settles, including
/// when the resolving future is dropped mid-lookup.
struct InFlightGuard<'a> {
    resolver: &'a AdminStatusResolver,
    request_id: u64,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.resolver.state();
        if state
            .in_flight
            .as_ref()
            .is_some_and(|f| f.request_id == self.request_id)
        {
            state.in_flight = None;
        }
    }
}

fn cached_status(state: &ResolverState, email: &str) -> bool {
    state
        .cache
        .as_ref()
        .filter(|entry| entry.email == email)
        .map(|entry| entry.is_admin)
        .unwrap_or(false)
}

/// Parses the admin emails setting value (a JSON array of strings).
pub fn parse_admin_emails(raw: &str) -> Result<Vec<String>, serde_json::Error> {
    serde_json::from_str(raw)
}
