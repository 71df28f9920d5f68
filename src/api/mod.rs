pub mod handlers;
pub mod state;

use std::sync::Arc;

use axum::{
    routing::{get, post, put},
    Router,
};
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

use crate::{config::Settings, service::PaymentService, service::ServiceContext};
use state::AppState;

pub fn create_app(
    service_context: Arc<ServiceContext>,
    payment_service: Option<Arc<PaymentService>>,
    settings: Arc<Settings>,
) -> Router {
    let app_state = AppState::new(service_context, payment_service, settings);

    Router::new()
        // Root and health endpoints
        .route("/", get(handlers::root::root))
        .route("/health", get(handlers::root::health_check))
        .route("/api", get(handlers::root::api_info))
        // API routes
        .nest("/api", api_routes())
        .with_state(app_state)
        // Middleware
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive()) // Configure properly for production
        .layer(TraceLayer::new_for_http())
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/users", user_routes())
        .nest("/listings", listing_routes())
        .nest("/bookings", booking_routes())
        .nest("/reviews", review_routes())
        .nest("/payments", payment_routes())
}

fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::users::list))
        .route("/", post(handlers::users::create))
        .route("/:id", get(handlers::users::get))
}

fn listing_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::listings::list))
        .route("/", post(handlers::listings::create))
        .route("/:id", get(handlers::listings::get))
        .route("/:id", put(handlers::listings::update))
        .route("/:id/reviews", get(handlers::reviews::list_for_listing))
}

fn booking_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::bookings::list))
        .route("/", post(handlers::bookings::create))
        .route("/:id", get(handlers::bookings::get))
        .route("/:id/payment", get(handlers::payments::payment_overview))
        .route("/:id/pay", post(handlers::payments::pay))
}

fn review_routes() -> Router<AppState> {
    Router::new().route("/", post(handlers::reviews::create))
}

fn payment_routes() -> Router<AppState> {
    // Public webhook endpoint; authenticity comes from the HMAC signature,
    // not from a session.
    Router::new().route("/webhook", post(handlers::payments::webhook))
}
