//! services/api/src/web/middleware.rs
//!
//! Authentication middleware for protecting routes.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
    Extension,
};
use chrono::Utc;
use connection_hub_core::{ports::PortError, AdminSession};
use std::sync::Arc;
use tracing::{error, info};

use crate::adapters::PasswordIdentity;
use crate::web::state::AppState;

pub const SESSION_COOKIE: &str = "session";

/// The authenticated browser session, inserted into request extensions by
/// [`require_auth`].
#[derive(Clone)]
pub struct AuthSession {
    pub session_id: String,
    pub admin: Arc<AdminSession>,
}

/// Reads the auth session id from the `session` cookie.
pub fn session_id_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .find_map(|c| {
            let c = c.trim();
            c.strip_prefix(SESSION_COOKIE)
                .and_then(|rest| rest.strip_prefix('='))
                .filter(|id| !id.is_empty())
                .map(str::to_string)
        })
}

/// Middleware that resolves the session cookie to its admin session context.
///
/// A cookie without a registered context (e.g. after a restart) is validated
/// against the account store and its context restored. Missing, unknown or
/// expired sessions get 401 Unauthorized.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    // 1. Parse session ID from cookie
    let session_id = session_id_from_headers(req.headers()).ok_or(StatusCode::UNAUTHORIZED)?;

    // 2. Use the live context, dropping it if its session has expired
    let context = match state.sessions.get(&session_id).await {
        Some(context) => match context.current_session() {
            Some(session) if session.expires_at > Utc::now() => Some(context),
            _ => {
                state.sessions.remove(&session_id).await;
                return Err(StatusCode::UNAUTHORIZED);
            }
        },
        None => None,
    };

    // 3. Otherwise validate against the store and restore the context
    let admin = match context {
        Some(context) => context,
        None => {
            let session = state
                .accounts
                .validate_auth_session(&session_id)
                .await
                .map_err(|e| match e {
                    PortError::Unauthorized | PortError::NotFound(_) => StatusCode::UNAUTHORIZED,
                    e => {
                        error!("Failed to validate auth session: {:?}", e);
                        StatusCode::INTERNAL_SERVER_ERROR
                    }
                })?;
            info!("Restoring admin session context for user {}.", session.user_id);
            let identity = PasswordIdentity::restore(
                state.accounts.clone(),
                state.config.session_ttl,
                session,
            );
            state
                .open_admin_session(&session_id, Arc::new(identity))
                .await
        }
    };

    // 4. Insert the session into request extensions
    req.extensions_mut().insert(AuthSession { session_id, admin });

    // 5. Continue to the handler
    Ok(next.run(req).await)
}

/// Middleware for admin-only routes; must run after [`require_auth`].
///
/// Reads the currently published admin flag and answers 403 Forbidden when
/// it is `false`.
pub async fn require_admin(
    Extension(auth): Extension<AuthSession>,
    req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    if !auth.admin.is_admin() {
        return Err(StatusCode::FORBIDDEN);
    }
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use test_case::test_case;

    #[test_case("session=abc", Some("abc") ; "single cookie")]
    #[test_case("theme=dark; session=abc; lang=en", Some("abc") ; "among others")]
    #[test_case("sessionid=abc", None ; "similar name")]
    #[test_case("session=", None ; "empty value")]
    #[test_case("theme=dark", None ; "absent")]
    fn parses_session_cookie(cookie: &str, expected: Option<&str>) {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_str(cookie).unwrap());

        assert_eq!(session_id_from_headers(&headers).as_deref(), expected);
    }
}
