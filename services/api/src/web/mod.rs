pub mod admin;
pub mod auth;
pub mod middleware;
pub mod rest;
pub mod state;

pub use middleware::{require_admin, require_auth};
pub use state::AppState;

use crate::config::ConfigError;
use axum::{
    http::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    middleware as axum_middleware,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Builds the complete application router, Swagger UI included.
pub fn router(app_state: Arc<AppState>) -> Result<Router, ConfigError> {
    let origin = app_state
        .config
        .allowed_origin
        .parse::<HeaderValue>()
        .map_err(|e| ConfigError::InvalidValue("ALLOWED_ORIGIN".to_string(), e.to_string()))?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT]);

    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/slots", get(rest::list_slots_handler))
        .route("/bookings", post(rest::create_booking_handler))
        .route("/auth/login", post(auth::login_handler));

    // Session routes (auth required)
    let session_routes = Router::new()
        .route("/auth/logout", post(auth::logout_handler))
        .route("/auth/admin-status", get(auth::admin_status_handler))
        .route(
            "/auth/admin-status/refresh",
            post(auth::refresh_admin_status_handler),
        )
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_auth,
        ));

    // Admin routes (auth + admin required). The last layer runs first.
    let admin_routes = Router::new()
        .route("/admin/bookings", get(admin::list_bookings_handler))
        .route("/admin/bookings/{id}", delete(admin::cancel_booking_handler))
        .layer(axum_middleware::from_fn(require_admin))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_auth,
        ));

    let api_router = Router::new()
        .merge(public_routes)
        .merge(session_routes)
        .merge(admin_routes)
        .layer(cors)
        .with_state(app_state);

    Ok(Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", rest::ApiDoc::openapi())))
}
