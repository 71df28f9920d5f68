//! Payment provider integration: the outbound gateway client and
//! inbound webhook verification.

pub mod gateway;
pub mod webhook;

pub use gateway::{
    HttpPaymentGateway, InitiateRequest, InitiateResponse, PaymentGateway, ProviderStatus,
    VerifyResponse,
};
pub use webhook::{WebhookPayload, SIGNATURE_HEADER};
