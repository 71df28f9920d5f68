use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::config::PaymentConfig;
use crate::error::{AppError, Result};

/// Transaction state as reported by the provider, in responses and
/// verification lookups. Anything we don't recognize maps to `Unknown`
/// so a new provider status never gets mistaken for a settlement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderStatus {
    Success,
    Pending,
    Failed,
    Cancelled,
    Unknown,
}

impl ProviderStatus {
    pub fn parse(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "success" => ProviderStatus::Success,
            "pending" => ProviderStatus::Pending,
            "failed" | "error" => ProviderStatus::Failed,
            "cancelled" | "canceled" => ProviderStatus::Cancelled,
            _ => ProviderStatus::Unknown,
        }
    }
}

/// Body of the checkout initiation call. Field names match the provider's
/// wire format; `amount` is a decimal string in major units ("300.00").
#[derive(Debug, Clone, Serialize)]
pub struct InitiateRequest {
    pub amount: String,
    pub currency: String,
    pub email: String,
    pub tx_ref: String,
    pub callback_url: String,
}

#[derive(Debug, Clone)]
pub struct InitiateResponse {
    pub status: ProviderStatus,
    pub checkout_url: Option<String>,
    /// Raw response body, persisted with the payment for auditing.
    pub raw_body: String,
}

#[derive(Debug, Clone)]
pub struct VerifyResponse {
    pub status: ProviderStatus,
    /// Provider-side transaction id, when the provider reports one.
    pub provider_tx_id: Option<String>,
    pub raw_body: String,
}

/// Outbound calls to the payment provider. `Err` means we could not get
/// an answer (network, timeout, unparseable body); a declined transaction
/// is an `Ok` response with a non-success status.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn initiate(&self, request: &InitiateRequest) -> Result<InitiateResponse>;

    async fn verify(&self, merchant_reference: &str) -> Result<VerifyResponse>;
}

/// Gateway backed by the provider's HTTP API.
pub struct HttpPaymentGateway {
    client: reqwest::Client,
    config: PaymentConfig,
}

impl HttpPaymentGateway {
    pub fn new(config: PaymentConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    fn parse_body(raw: &str) -> Result<serde_json::Value> {
        serde_json::from_str(raw)
            .map_err(|e| AppError::Transport(format!("Unparseable provider response: {}", e)))
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    async fn initiate(&self, request: &InitiateRequest) -> Result<InitiateResponse> {
        let response = self
            .client
            .post(&self.config.base_url)
            .bearer_auth(&self.config.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| AppError::Transport(e.to_string()))?;

        let http_status = response.status();
        let raw_body = response
            .text()
            .await
            .map_err(|e| AppError::Transport(e.to_string()))?;

        // Declines come back as parseable JSON with an in-band status,
        // sometimes on a non-2xx HTTP code. Only an unreadable body is
        // treated as a transport failure.
        let body = Self::parse_body(&raw_body)?;
        let status =
            ProviderStatus::parse(body.get("status").and_then(|v| v.as_str()).unwrap_or(""));
        let checkout_url = body
            .pointer("/data/checkout_url")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string());

        tracing::debug!(
            tx_ref = %request.tx_ref,
            http_status = %http_status,
            ?status,
            "Provider initiation response"
        );

        Ok(InitiateResponse {
            status,
            checkout_url,
            raw_body,
        })
    }

    async fn verify(&self, merchant_reference: &str) -> Result<VerifyResponse> {
        let url = format!(
            "{}/{}",
            self.config.verify_url.trim_end_matches('/'),
            merchant_reference
        );

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.config.api_key)
            .send()
            .await
            .map_err(|e| AppError::Transport(e.to_string()))?;

        let http_status = response.status();
        let raw_body = response
            .text()
            .await
            .map_err(|e| AppError::Transport(e.to_string()))?;

        let body = Self::parse_body(&raw_body)?;
        let status =
            ProviderStatus::parse(body.get("status").and_then(|v| v.as_str()).unwrap_or(""));
        let provider_tx_id = body
            .pointer("/data/reference")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string());

        tracing::debug!(
            %merchant_reference,
            http_status = %http_status,
            ?status,
            "Provider verification response"
        );

        Ok(VerifyResponse {
            status,
            provider_tx_id,
            raw_body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_status_parses_known_values() {
        assert_eq!(ProviderStatus::parse("success"), ProviderStatus::Success);
        assert_eq!(ProviderStatus::parse("Success"), ProviderStatus::Success);
        assert_eq!(ProviderStatus::parse("pending"), ProviderStatus::Pending);
        assert_eq!(ProviderStatus::parse("failed"), ProviderStatus::Failed);
        assert_eq!(ProviderStatus::parse("error"), ProviderStatus::Failed);
        assert_eq!(
            ProviderStatus::parse("cancelled"),
            ProviderStatus::Cancelled
        );
        assert_eq!(ProviderStatus::parse("canceled"), ProviderStatus::Cancelled);
    }

    #[test]
    fn provider_status_never_guesses() {
        assert_eq!(ProviderStatus::parse("settled"), ProviderStatus::Unknown);
        assert_eq!(ProviderStatus::parse(""), ProviderStatus::Unknown);
    }

    #[test]
    fn initiate_request_uses_provider_field_names() {
        let request = InitiateRequest {
            amount: "300.00".to_string(),
            currency: "GHS".to_string(),
            email: "guest@example.com".to_string(),
            tx_ref: "bk-0011223344556677".to_string(),
            callback_url: "https://sojourn.example/api/payments/webhook".to_string(),
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["amount"], "300.00");
        assert_eq!(json["currency"], "GHS");
        assert_eq!(json["email"], "guest@example.com");
        assert_eq!(json["tx_ref"], "bk-0011223344556677");
        assert_eq!(
            json["callback_url"],
            "https://sojourn.example/api/payments/webhook"
        );
    }
}
