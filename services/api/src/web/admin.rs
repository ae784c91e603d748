//! services/api/src/web/admin.rs
//!
//! Booking management for site administrators. Mounted behind
//! `require_auth` and `require_admin`.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use connection_hub_core::ports::PortError;
use std::sync::Arc;
use tracing::error;
use uuid::Uuid;

use crate::web::{rest::BookingResponse, state::AppState};

/// List every booking, ordered by slot.
#[utoipa::path(
    get,
    path = "/admin/bookings",
    responses(
        (status = 200, description = "All bookings", body = [BookingResponse]),
        (status = 401, description = "No active session"),
        (status = 403, description = "Not an admin")
    )
)]
pub async fn list_bookings_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<BookingResponse>>, (StatusCode, String)> {
    let bookings = state.bookings.list_bookings().await.map_err(|e| {
        error!("Failed to list bookings: {:?}", e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to list bookings".to_string(),
        )
    })?;
    Ok(Json(bookings.into_iter().map(BookingResponse::from).collect()))
}

/// Cancel a booking, which frees its slot.
#[utoipa::path(
    delete,
    path = "/admin/bookings/{id}",
    params(
        ("id" = Uuid, Path, description = "Booking id")
    ),
    responses(
        (status = 204, description = "Booking deleted"),
        (status = 401, description = "No active session"),
        (status = 403, description = "Not an admin"),
        (status = 404, description = "No such booking")
    )
)]
pub async fn cancel_booking_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, (StatusCode, String)> {
    match state.bookings.cancel_booking(id).await {
        Ok(()) => Ok(StatusCode::NO_CONTENT),
        Err(PortError::NotFound(message)) => Err((StatusCode::NOT_FOUND, message)),
        Err(e) => {
            error!("Failed to cancel booking {}: {:?}", id, e);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to cancel booking".to_string(),
            ))
        }
    }
}
