pub mod booking_service;
pub mod payment_service;

use std::sync::Arc;

use sqlx::SqlitePool;

use crate::repository::*;

pub use booking_service::{BookingService, PaymentOverview};
pub use payment_service::{InitiateOutcome, PaymentService, WebhookOutcome};

/// Shared handles to the repositories and the booking ledger. The payment
/// coordinator is wired separately because it only exists when the provider
/// is configured.
pub struct ServiceContext {
    pub user_repo: Arc<dyn UserRepository>,
    pub listing_repo: Arc<dyn ListingRepository>,
    pub booking_repo: Arc<dyn BookingRepository>,
    pub payment_repo: Arc<dyn PaymentRepository>,
    pub review_repo: Arc<dyn ReviewRepository>,
    pub booking_service: Arc<BookingService>,
    pub db_pool: SqlitePool,
}

impl ServiceContext {
    pub fn new(db_pool: SqlitePool) -> Self {
        let user_repo: Arc<dyn UserRepository> =
            Arc::new(SqliteUserRepository::new(db_pool.clone()));
        let listing_repo: Arc<dyn ListingRepository> =
            Arc::new(SqliteListingRepository::new(db_pool.clone()));
        let booking_repo: Arc<dyn BookingRepository> =
            Arc::new(SqliteBookingRepository::new(db_pool.clone()));
        let payment_repo: Arc<dyn PaymentRepository> =
            Arc::new(SqlitePaymentRepository::new(db_pool.clone()));
        let review_repo: Arc<dyn ReviewRepository> =
            Arc::new(SqliteReviewRepository::new(db_pool.clone()));

        let booking_service = Arc::new(BookingService::new(
            booking_repo.clone(),
            listing_repo.clone(),
            user_repo.clone(),
            payment_repo.clone(),
        ));

        Self {
            user_repo,
            listing_repo,
            booking_repo,
            payment_repo,
            review_repo,
            booking_service,
            db_pool,
        }
    }
}
