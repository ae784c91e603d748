//! services/api/src/web/rest.rs
//!
//! Contains the public booking handlers and the master definition for the
//! OpenAPI specification.

use crate::web::{admin, auth, state::AppState};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use chrono::{DateTime, Local, NaiveDateTime, Utc};
use connection_hub_core::{
    domain::{Booking, Customer, Slot},
    load_week, BookingError, BookingReceipt,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;
use utoipa::{OpenApi, ToSchema};
use uuid::Uuid;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        list_slots_handler,
        create_booking_handler,
        auth::login_handler,
        auth::logout_handler,
        auth::admin_status_handler,
        auth::refresh_admin_status_handler,
        admin::list_bookings_handler,
        admin::cancel_booking_handler,
    ),
    components(
        schemas(
            SlotResponse,
            CreateBookingRequest,
            BookingResponse,
            auth::LoginRequest,
            auth::AuthResponse,
            auth::AdminStatusResponse,
        )
    ),
    tags(
        (name = "Connection Hub API", description = "Consultation booking and site administration.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

#[derive(Serialize, Deserialize, ToSchema)]
pub struct SlotResponse {
    /// `YYYY-MM-DD-HHMM`
    pub id: String,
    pub day: String,
    pub time: String,
    pub available: bool,
    pub starts_at: NaiveDateTime,
}

impl From<Slot> for SlotResponse {
    fn from(slot: Slot) -> Self {
        Self {
            id: slot.id,
            day: slot.day,
            time: slot.time,
            available: slot.available,
            starts_at: slot.starts_at,
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct CreateBookingRequest {
    pub slot_id: String,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub company_name: String,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct BookingResponse {
    pub id: Uuid,
    pub slot_id: String,
    pub customer_name: String,
    pub customer_email: String,
    pub company_name: String,
    pub appointment_time: String,
    pub created_at: DateTime<Utc>,
    /// Set when the booking is stored but the confirmation email failed.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub warning: Option<String>,
}

impl From<Booking> for BookingResponse {
    fn from(booking: Booking) -> Self {
        Self {
            id: booking.id,
            slot_id: booking.slot_id,
            customer_name: booking.customer_name,
            customer_email: booking.customer_email,
            company_name: booking.company_name,
            appointment_time: booking.appointment_time,
            created_at: booking.created_at,
            warning: None,
        }
    }
}

impl From<BookingReceipt> for BookingResponse {
    fn from(receipt: BookingReceipt) -> Self {
        let warning = receipt.warning();
        Self {
            warning,
            ..BookingResponse::from(receipt.booking)
        }
    }
}

fn booking_error_status(error: &BookingError) -> StatusCode {
    match error {
        BookingError::SlotTaken => StatusCode::CONFLICT,
        BookingError::Invalid(_) | BookingError::UnknownSlot(_) => StatusCode::BAD_REQUEST,
        BookingError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// List this week's consultation slots.
///
/// Weekdays only, 8:00 to 17:00 in 30-minute steps. If booked slots cannot
/// be loaded every slot is reported as available.
#[utoipa::path(
    get,
    path = "/slots",
    responses(
        (status = 200, description = "Slots for the next seven days", body = [SlotResponse])
    )
)]
pub async fn list_slots_handler(State(app_state): State<Arc<AppState>>) -> Json<Vec<SlotResponse>> {
    let slots = load_week(app_state.bookings.store(), Local::now().date_naive()).await;
    Json(slots.into_iter().map(SlotResponse::from).collect())
}

/// Book a slot.
///
/// The slot must belong to the currently offered week. Two concurrent
/// requests for the same slot yield one 201 and one 409.
#[utoipa::path(
    post,
    path = "/bookings",
    request_body = CreateBookingRequest,
    responses(
        (status = 201, description = "Booking stored", body = BookingResponse),
        (status = 400, description = "Invalid details or unknown slot"),
        (status = 409, description = "The slot has just been booked"),
        (status = 500, description = "The booking could not be saved")
    )
)]
pub async fn create_booking_handler(
    State(app_state): State<Arc<AppState>>,
    Json(req): Json<CreateBookingRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let week = load_week(app_state.bookings.store(), Local::now().date_naive()).await;
    let slot = week
        .into_iter()
        .find(|slot| slot.id == req.slot_id)
        .ok_or_else(|| {
            let e = BookingError::UnknownSlot(req.slot_id.clone());
            (booking_error_status(&e), e.to_string())
        })?;

    let customer = Customer {
        name: req.name,
        email: req.email,
        company_name: req.company_name,
    };

    match app_state.bookings.submit_booking(&slot, customer).await {
        Ok(receipt) => Ok((StatusCode::CREATED, Json(BookingResponse::from(receipt)))),
        Err(e) => {
            warn!("Booking for slot {} rejected: {:?}", slot.id, e);
            Err((booking_error_status(&e), e.to_string()))
        }
    }
}
