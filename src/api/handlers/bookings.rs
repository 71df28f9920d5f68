use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    api::state::AppState,
    domain::{Booking, BookingStatus, CreateBookingRequest},
    error::Result,
};

#[derive(Debug, Deserialize)]
pub struct ListParams {
    #[serde(default = "default_limit")]
    limit: i64,
    #[serde(default)]
    offset: i64,
    /// With a customer id, lists that customer's bookings; without one,
    /// lists confirmed bookings only.
    customer_id: Option<Uuid>,
}

fn default_limit() -> i64 {
    50
}

#[derive(Debug, Serialize)]
pub struct ListResponse {
    bookings: Vec<BookingDto>,
    total: usize,
}

#[derive(Debug, Serialize)]
pub struct BookingDto {
    id: Uuid,
    customer_id: Uuid,
    listing_id: Uuid,
    start_date: String,
    end_date: String,
    status: BookingStatus,
    total_price_minor: i64,
    total_price: String,
    created_at: String,
}

impl From<Booking> for BookingDto {
    fn from(booking: Booking) -> Self {
        Self {
            id: booking.id,
            customer_id: booking.customer_id,
            listing_id: booking.listing_id,
            start_date: booking.start_date.to_string(),
            end_date: booking.end_date.to_string(),
            status: booking.status,
            total_price_minor: booking.total_price_minor,
            total_price: booking.total_price_display(),
            created_at: booking.created_at.to_rfc3339(),
        }
    }
}

pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<ListResponse>> {
    let bookings = match params.customer_id {
        Some(customer_id) => {
            state
                .service_context
                .booking_repo
                .list_by_customer(customer_id, params.limit, params.offset)
                .await?
        }
        None => {
            state
                .service_context
                .booking_repo
                .list_confirmed(params.limit, params.offset)
                .await?
        }
    };

    let total = bookings.len();
    let bookings: Vec<BookingDto> = bookings.into_iter().map(Into::into).collect();

    Ok(Json(ListResponse { bookings, total }))
}

pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<BookingDto>> {
    let booking = state.service_context.booking_service.find_booking(id).await?;

    Ok(Json(booking.into()))
}

pub async fn create(
    State(state): State<AppState>,
    Json(request): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<BookingDto>)> {
    let booking = state
        .service_context
        .booking_service
        .create_booking(request)
        .await?;

    Ok((StatusCode::CREATED, Json(booking.into())))
}
