use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use crate::{
    domain::{
        compute_total_price, Booking, BookingStatus, ConfirmOutcome, CreateBookingRequest,
        Payment, PaymentStatus,
    },
    error::{AppError, Result},
    repository::{BookingRepository, ListingRepository, PaymentRepository, UserRepository},
};

/// Read model for the booking payment status endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentOverview {
    pub booking_status: BookingStatus,
    pub payment_status: Option<PaymentStatus>,
    pub checkout_url: Option<String>,
}

/// The booking ledger. Owns booking records, computes totals, and performs
/// the atomic overlap-checked confirmation. Overlap is deliberately NOT
/// checked at creation time: any number of pending bookings may compete for
/// a date range, and only the confirmation write decides the winner.
pub struct BookingService {
    booking_repo: Arc<dyn BookingRepository>,
    listing_repo: Arc<dyn ListingRepository>,
    user_repo: Arc<dyn UserRepository>,
    payment_repo: Arc<dyn PaymentRepository>,
}

impl BookingService {
    pub fn new(
        booking_repo: Arc<dyn BookingRepository>,
        listing_repo: Arc<dyn ListingRepository>,
        user_repo: Arc<dyn UserRepository>,
        payment_repo: Arc<dyn PaymentRepository>,
    ) -> Self {
        Self {
            booking_repo,
            listing_repo,
            user_repo,
            payment_repo,
        }
    }

    pub async fn create_booking(&self, request: CreateBookingRequest) -> Result<Booking> {
        if request.end_date <= request.start_date {
            return Err(AppError::InvalidDateRange);
        }
        if request.start_date < Utc::now().date_naive() {
            return Err(AppError::PastDate);
        }

        let listing = self
            .listing_repo
            .find_by_id(request.listing_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Listing not found".to_string()))?;

        self.user_repo
            .find_by_id(request.customer_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Customer not found".to_string()))?;

        let total_price_minor =
            compute_total_price(listing.price_per_night, request.start_date, request.end_date)
                .ok_or_else(|| {
                    AppError::Validation("Total price is out of range".to_string())
                })?;

        let booking = Booking {
            id: Uuid::new_v4(),
            customer_id: request.customer_id,
            listing_id: request.listing_id,
            start_date: request.start_date,
            end_date: request.end_date,
            status: BookingStatus::Pending,
            total_price_minor,
            created_at: Utc::now(),
        };

        let booking = self.booking_repo.create(booking).await?;

        tracing::info!(
            booking_id = %booking.id,
            listing_id = %booking.listing_id,
            total_minor = booking.total_price_minor,
            "Booking created"
        );

        Ok(booking)
    }

    /// Flips a pending booking to Confirmed if and only if no overlapping
    /// confirmed booking exists for the same listing. Idempotent: confirming
    /// an already-confirmed booking reports `AlreadyConfirmed`.
    pub async fn confirm_booking(&self, booking_id: Uuid) -> Result<ConfirmOutcome> {
        let outcome = self.booking_repo.confirm_if_no_overlap(booking_id).await?;

        if let ConfirmOutcome::Confirmed(booking) = &outcome {
            tracing::info!(booking_id = %booking.id, "Booking confirmed");
        }

        Ok(outcome)
    }

    pub async fn find_booking(&self, booking_id: Uuid) -> Result<Booking> {
        self.booking_repo
            .find_by_id(booking_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))
    }

    pub async fn find_active_payment(&self, booking_id: Uuid) -> Result<Option<Payment>> {
        self.payment_repo.find_by_booking(booking_id).await
    }

    pub async fn payment_overview(&self, booking_id: Uuid) -> Result<PaymentOverview> {
        let booking = self.find_booking(booking_id).await?;
        let payment = self.payment_repo.find_by_booking(booking_id).await?;

        Ok(PaymentOverview {
            booking_status: booking.status,
            payment_status: payment.as_ref().map(|p| p.status),
            checkout_url: payment.and_then(|p| p.checkout_url),
        })
    }
}
