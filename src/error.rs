use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Forbidden")]
    Forbidden,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("End date must be after start date")]
    InvalidDateRange,

    #[error("You cannot book for a past date")]
    PastDate,

    #[error("Booking is not pending")]
    BookingNotPending,

    #[error("Dates overlap an existing confirmed booking")]
    Overlap,

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Payment failed or cancelled")]
    PaymentDead,

    #[error("Payment provider rejected the request")]
    GatewayRejected,

    #[error("Payment provider unreachable: {0}")]
    Transport(String),

    #[error("Invalid webhook signature")]
    InvalidSignature,

    #[error("Malformed webhook payload: {0}")]
    MalformedPayload(String),

    #[error("Illegal payment state transition: {0}")]
    InvariantViolation(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl AppError {
    /// Stable machine-readable code carried in every error body.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Database(_) => "database_error",
            AppError::NotFound(_) => "not_found",
            AppError::Forbidden => "forbidden",
            AppError::Validation(_) => "validation_error",
            AppError::InvalidDateRange => "invalid_date_range",
            AppError::PastDate => "past_date",
            AppError::BookingNotPending => "booking_not_pending",
            AppError::Overlap => "booking_overlap",
            AppError::Conflict(_) => "conflict",
            AppError::PaymentDead => "payment_dead",
            AppError::GatewayRejected => "gateway_rejected",
            AppError::Transport(_) => "provider_unreachable",
            AppError::InvalidSignature => "invalid_signature",
            AppError::MalformedPayload(_) => "malformed_payload",
            AppError::InvariantViolation(_) => "invariant_violation",
            AppError::Internal(_) => "internal_error",
            AppError::ServiceUnavailable(_) => "service_unavailable",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let code = self.code();
        let (status, error_message) = match self {
            AppError::Database(ref msg) => {
                tracing::error!("Database error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Database error occurred".to_string())
            }
            AppError::NotFound(ref msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::Forbidden => (StatusCode::FORBIDDEN, "Forbidden".to_string()),
            AppError::Validation(ref msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::InvalidDateRange => {
                (StatusCode::BAD_REQUEST, "End date must be after start date".to_string())
            }
            AppError::PastDate => {
                (StatusCode::BAD_REQUEST, "You cannot book for a past date".to_string())
            }
            AppError::BookingNotPending => {
                (StatusCode::BAD_REQUEST, "Booking is not pending".to_string())
            }
            AppError::Overlap => (
                StatusCode::CONFLICT,
                "Dates overlap an existing confirmed booking".to_string(),
            ),
            AppError::Conflict(ref msg) => (StatusCode::CONFLICT, msg.clone()),
            AppError::PaymentDead => {
                (StatusCode::FAILED_DEPENDENCY, "Payment failed or cancelled".to_string())
            }
            AppError::GatewayRejected => {
                tracing::warn!("Payment provider rejected an initiation request");
                (StatusCode::BAD_GATEWAY, "Payment provider rejected the request".to_string())
            }
            AppError::Transport(ref msg) => {
                tracing::error!("Payment provider transport error: {}", msg);
                (StatusCode::BAD_GATEWAY, "Payment provider unreachable".to_string())
            }
            AppError::InvalidSignature => {
                tracing::warn!("Webhook rejected: invalid signature");
                (StatusCode::UNAUTHORIZED, "Invalid webhook signature".to_string())
            }
            AppError::MalformedPayload(ref msg) => {
                (StatusCode::BAD_REQUEST, format!("Malformed webhook payload: {}", msg))
            }
            AppError::InvariantViolation(ref msg) => {
                tracing::error!("Invariant violation: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
            AppError::Internal(ref msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
            AppError::ServiceUnavailable(ref msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, msg.clone())
            }
        };

        let body = Json(json!({
            "error": error_message,
            "code": code,
        }));

        (status, body).into_response()
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Database(err.to_string())
    }
}
