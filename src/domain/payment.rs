use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A charge attempt against the payment provider. At most one exists per
/// booking (UNIQUE at the data layer) and rows are never deleted: the raw
/// request/response payloads are the audit trail for every provider exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub status: PaymentStatus,
    /// Minor currency units, copied from the booking total at creation.
    pub amount_minor: i64,
    pub currency: String,
    /// Locally generated, sent to the provider as `tx_ref`, never reused.
    pub merchant_reference: String,
    pub provider_tx_id: Option<String>,
    pub checkout_url: Option<String>,
    /// Provider event id from the webhook that settled this payment.
    pub provider_event_id: Option<String>,
    pub request_payload: Option<String>,
    pub response_payload: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PaymentStatus {
    Pending,
    Processing,
    Success,
    Cancelled,
    Failed,
    Refunded,
}

impl PaymentStatus {
    /// The only legal moves. Everything else is an invariant violation and
    /// must never reach the store.
    pub fn can_transition_to(self, to: PaymentStatus) -> bool {
        use PaymentStatus::*;
        matches!(
            (self, to),
            (Pending | Processing, Success | Failed | Cancelled) | (Success, Refunded)
        )
    }

    /// Dead payments are terminal for initiation: the merchant reference is
    /// burned and the caller must start over with a fresh booking.
    pub fn is_dead(self) -> bool {
        matches!(self, PaymentStatus::Cancelled | PaymentStatus::Failed)
    }
}
