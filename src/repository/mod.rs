use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::*;
use crate::error::Result;

pub mod booking_repository;
pub mod listing_repository;
pub mod payment_repository;
pub mod review_repository;
pub mod user_repository;

pub use booking_repository::SqliteBookingRepository;
pub use listing_repository::SqliteListingRepository;
pub use payment_repository::SqlitePaymentRepository;
pub use review_repository::SqliteReviewRepository;
pub use user_repository::SqliteUserRepository;

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create(&self, user: CreateUserRequest) -> Result<User>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>>;
    async fn find_by_username(&self, username: &str) -> Result<Option<User>>;
    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<User>>;
}

#[async_trait]
pub trait ListingRepository: Send + Sync {
    async fn create(&self, listing: CreateListingRequest) -> Result<Listing>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Listing>>;
    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<Listing>>;
    async fn update(&self, id: Uuid, update: UpdateListingRequest) -> Result<Listing>;
}

#[async_trait]
pub trait BookingRepository: Send + Sync {
    async fn create(&self, booking: Booking) -> Result<Booking>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Booking>>;
    async fn list_by_customer(&self, customer_id: Uuid, limit: i64, offset: i64) -> Result<Vec<Booking>>;
    async fn list_confirmed(&self, limit: i64, offset: i64) -> Result<Vec<Booking>>;
    /// The atomic confirmation write: flips Pending to Confirmed only when no
    /// overlapping Confirmed booking exists for the same listing. Errors with
    /// `Overlap` when the slot is taken, `Conflict` for cancelled bookings.
    async fn confirm_if_no_overlap(&self, id: Uuid) -> Result<ConfirmOutcome>;
}

#[async_trait]
pub trait PaymentRepository: Send + Sync {
    /// Inserts a new payment. A UNIQUE violation on booking_id or
    /// merchant_reference surfaces as `Conflict` so callers can converge on
    /// the winning row.
    async fn create(&self, payment: Payment) -> Result<Payment>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Payment>>;
    async fn find_by_booking(&self, booking_id: Uuid) -> Result<Option<Payment>>;
    async fn find_by_merchant_reference(&self, reference: &str) -> Result<Option<Payment>>;
    /// Re-initiation path: replaces the checkout URL and audit payloads
    /// without touching status.
    async fn update_checkout(
        &self,
        id: Uuid,
        checkout_url: Option<&str>,
        request_payload: &str,
        response_payload: &str,
    ) -> Result<Payment>;
    /// Conditional Pending/Processing -> Success. Returns None when the
    /// payment was not in an open state (a concurrent delivery won).
    async fn mark_succeeded(
        &self,
        id: Uuid,
        provider_event_id: &str,
        provider_tx_id: Option<&str>,
    ) -> Result<Option<Payment>>;
    /// Conditional Pending/Processing -> Failed|Cancelled. Returns None when
    /// the payment was not in an open state.
    async fn mark_dead(&self, id: Uuid, status: PaymentStatus) -> Result<Option<Payment>>;
}

#[async_trait]
pub trait ReviewRepository: Send + Sync {
    async fn create(&self, review: CreateReviewRequest) -> Result<Review>;
    async fn list_by_listing(&self, listing_id: Uuid) -> Result<Vec<Review>>;
}
