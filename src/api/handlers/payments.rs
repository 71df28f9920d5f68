use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::{
    api::state::AppState,
    error::{AppError, Result},
    payments::{webhook, SIGNATURE_HEADER},
    service::{InitiateOutcome, PaymentOverview, PaymentService, WebhookOutcome},
};

fn require_payments(state: &AppState) -> Result<Arc<PaymentService>> {
    state
        .payment_service
        .clone()
        .ok_or_else(|| AppError::ServiceUnavailable("Payments are not configured".to_string()))
}

pub async fn payment_overview(
    State(state): State<AppState>,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<PaymentOverview>> {
    let overview = state
        .service_context
        .booking_service
        .payment_overview(booking_id)
        .await?;

    Ok(Json(overview))
}

#[derive(Debug, Deserialize)]
pub struct PayRequest {
    requester_id: Uuid,
}

pub async fn pay(
    State(state): State<AppState>,
    Path(booking_id): Path<Uuid>,
    Json(request): Json<PayRequest>,
) -> Result<Response> {
    let payments = require_payments(&state)?;

    // The two expected rejections answer with the documented `msg` bodies
    // rather than the generic error shape.
    let outcome = match payments
        .initiate_payment(booking_id, request.requester_id)
        .await
    {
        Ok(outcome) => outcome,
        Err(AppError::BookingNotPending) => {
            return Ok((
                StatusCode::BAD_REQUEST,
                Json(json!({ "msg": "Booking is not pending", "code": "booking_not_pending" })),
            )
                .into_response());
        }
        Err(AppError::PaymentDead) => {
            return Ok((
                StatusCode::FAILED_DEPENDENCY,
                Json(json!({ "msg": "Payment failed or cancelled", "code": "payment_dead" })),
            )
                .into_response());
        }
        Err(e) => return Err(e),
    };

    let response = match outcome {
        InitiateOutcome::Initiated { checkout_url } => (
            StatusCode::OK,
            Json(json!({
                "msg": "Payment initiated",
                "redirect_url": checkout_url,
            })),
        ),
        InitiateOutcome::BookingConfirmed => (
            StatusCode::ACCEPTED,
            Json(json!({ "msg": "Booking Confirmed" })),
        ),
    };

    Ok(response.into_response())
}

/// The provider's callback. Signature first, over the raw bytes; only then
/// is the body parsed and the coordinator invoked. Every outcome short of a
/// transport failure is acknowledged with 200 so the provider stops retrying.
pub async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response> {
    let payments = require_payments(&state)?;

    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or(AppError::InvalidSignature)?;

    webhook::verify_signature(&state.settings.payment.webhook_secret, &body, signature)?;

    let payload = webhook::parse_payload(&body)?;

    tracing::info!(tx_ref = %payload.tx_ref, event_id = %payload.reference, "Webhook received");

    let outcome = payments.process_webhook(payload).await?;

    let status_label = match outcome {
        WebhookOutcome::Ignored => "ignored",
        WebhookOutcome::AlreadyProcessed => "already_processed",
        WebhookOutcome::Confirmed => "confirmed",
        WebhookOutcome::ConfirmedWithoutBooking => "flagged_for_refund",
        WebhookOutcome::MarkedDead => "failed",
        WebhookOutcome::StillPending => "pending",
    };

    Ok((StatusCode::OK, Json(json!({ "status": status_label }))).into_response())
}
