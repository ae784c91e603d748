//! services/api/src/web/auth.rs
//!
//! Authentication endpoints: login, logout and the admin status of the
//! signed-in session.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Extension, Json,
};
use connection_hub_core::ports::{IdentityProvider, PortError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::adapters::PasswordIdentity;
use crate::web::middleware::{AuthSession, SESSION_COOKIE};
use crate::web::state::AppState;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct AuthResponse {
    pub user_id: Uuid,
    pub email: String,
    pub is_admin: bool,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct AdminStatusResponse {
    pub email: Option<String>,
    pub is_admin: bool,
}

impl AdminStatusResponse {
    fn from_session(auth: &AuthSession) -> Self {
        Self {
            email: auth.admin.current_session().map(|session| session.email),
            is_admin: auth.admin.is_admin(),
        }
    }
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /auth/login - Sign in with email and password
///
/// Starts the admin session context of the new session, so `is_admin` in the
/// response already reflects the admin list.
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    // 1. Sign in through a fresh identity for this browser
    let identity = Arc::new(PasswordIdentity::new(
        state.accounts.clone(),
        state.config.session_ttl,
    ));
    let session = identity
        .sign_in_with_password(req.email.trim(), &req.password)
        .await
        .map_err(|e| match e {
            PortError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "Invalid email or password".to_string(),
            ),
            e => {
                error!("Failed to sign in: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Failed to sign in".to_string())
            }
        })?;

    // 2. Start and register the admin session context
    let context = state
        .open_admin_session(&session.session_id, identity)
        .await;

    // 3. Create session cookie
    let cookie = format!(
        "{}={}; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age={}",
        SESSION_COOKIE,
        session.session_id,
        state.config.session_ttl.num_seconds()
    );

    let response = AuthResponse {
        user_id: session.user_id,
        email: session.email,
        is_admin: context.is_admin(),
    };

    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, cookie)],
        Json(response),
    ))
}

/// POST /auth/logout - Sign out and tear down the admin session context
#[utoipa::path(
    post,
    path = "/auth/logout",
    responses(
        (status = 200, description = "Logout successful"),
        (status = 401, description = "No active session")
    )
)]
pub async fn logout_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthSession>,
) -> impl IntoResponse {
    // Clears the cached status and publishes `false` before teardown.
    auth.admin.sign_out().await;
    state.sessions.remove(&auth.session_id).await;
    info!("Session closed.");

    let cookie = format!(
        "{}=; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age=0",
        SESSION_COOKIE
    );
    (StatusCode::OK, [(header::SET_COOKIE, cookie)])
}

/// GET /auth/admin-status - The currently published admin flag
#[utoipa::path(
    get,
    path = "/auth/admin-status",
    responses(
        (status = 200, description = "Admin status of the session", body = AdminStatusResponse),
        (status = 401, description = "No active session")
    )
)]
pub async fn admin_status_handler(
    Extension(auth): Extension<AuthSession>,
) -> Json<AdminStatusResponse> {
    Json(AdminStatusResponse::from_session(&auth))
}

/// POST /auth/admin-status/refresh - Re-check the admin list, bypassing the cache
#[utoipa::path(
    post,
    path = "/auth/admin-status/refresh",
    responses(
        (status = 200, description = "Admin status after a forced lookup", body = AdminStatusResponse),
        (status = 401, description = "No active session")
    )
)]
pub async fn refresh_admin_status_handler(
    Extension(auth): Extension<AuthSession>,
) -> Json<AdminStatusResponse> {
    auth.admin.refresh_admin_status().await;
    Json(AdminStatusResponse::from_session(&auth))
}
