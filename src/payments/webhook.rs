use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::error::{AppError, Result};

/// Header carrying the hex-encoded HMAC-SHA256 of the raw request body.
pub const SIGNATURE_HEADER: &str = "x-provider-signature";

/// The two fields every delivery must carry. The provider sends more,
/// but nothing else is trusted; status is re-checked against the
/// verification endpoint.
#[derive(Debug, Deserialize)]
pub struct WebhookPayload {
    /// Merchant reference the event refers to.
    pub tx_ref: String,
    /// Provider-assigned id for this event.
    pub reference: String,
}

/// Checks the signature header against the raw body. Must run before
/// the body is parsed.
pub fn verify_signature(secret: &str, body: &[u8], signature_hex: &str) -> Result<()> {
    let claimed = hex::decode(signature_hex.trim()).map_err(|_| AppError::InvalidSignature)?;
    let expected = compute_signature(secret, body);

    if !constant_time_compare(&expected, &claimed) {
        return Err(AppError::InvalidSignature);
    }

    Ok(())
}

pub fn parse_payload(body: &[u8]) -> Result<WebhookPayload> {
    let payload: WebhookPayload =
        serde_json::from_slice(body).map_err(|e| AppError::MalformedPayload(e.to_string()))?;

    if payload.tx_ref.is_empty() {
        return Err(AppError::MalformedPayload("tx_ref is empty".to_string()));
    }
    if payload.reference.is_empty() {
        return Err(AppError::MalformedPayload("reference is empty".to_string()));
    }

    Ok(payload)
}

/// Hex signature for a body, as the provider would send it. Used by
/// test fixtures and local webhook simulation.
pub fn sign(secret: &str, body: &[u8]) -> String {
    hex::encode(compute_signature(secret, body))
}

fn compute_signature(secret: &str, body: &[u8]) -> Vec<u8> {
    let mut mac =
        Hmac::<Sha256>::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(body);
    mac.finalize().into_bytes().to_vec()
}

fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test_secret";

    #[test]
    fn accepts_valid_signature() {
        let body = br#"{"tx_ref":"bk-abc","reference":"evt-1","status":"success"}"#;
        let signature = sign(SECRET, body);

        assert!(verify_signature(SECRET, body, &signature).is_ok());
    }

    #[test]
    fn rejects_tampered_body() {
        let body = br#"{"tx_ref":"bk-abc","reference":"evt-1"}"#;
        let signature = sign(SECRET, body);
        let tampered = br#"{"tx_ref":"bk-xyz","reference":"evt-1"}"#;

        let result = verify_signature(SECRET, tampered, &signature);
        assert!(matches!(result, Err(AppError::InvalidSignature)));
    }

    #[test]
    fn rejects_wrong_secret() {
        let body = br#"{"tx_ref":"bk-abc","reference":"evt-1"}"#;
        let signature = sign("some_other_secret", body);

        let result = verify_signature(SECRET, body, &signature);
        assert!(matches!(result, Err(AppError::InvalidSignature)));
    }

    #[test]
    fn rejects_non_hex_signature() {
        let body = br#"{"tx_ref":"bk-abc","reference":"evt-1"}"#;

        let result = verify_signature(SECRET, body, "not hex at all");
        assert!(matches!(result, Err(AppError::InvalidSignature)));
    }

    #[test]
    fn rejects_truncated_signature() {
        let body = br#"{"tx_ref":"bk-abc","reference":"evt-1"}"#;
        let signature = sign(SECRET, body);

        let result = verify_signature(SECRET, body, &signature[..32]);
        assert!(matches!(result, Err(AppError::InvalidSignature)));
    }

    #[test]
    fn payload_requires_tx_ref_and_reference() {
        let missing_ref = br#"{"tx_ref":"bk-abc","status":"success"}"#;
        assert!(matches!(
            parse_payload(missing_ref),
            Err(AppError::MalformedPayload(_))
        ));

        let empty_tx_ref = br#"{"tx_ref":"","reference":"evt-1"}"#;
        assert!(matches!(
            parse_payload(empty_tx_ref),
            Err(AppError::MalformedPayload(_))
        ));

        let not_json = b"tx_ref=bk-abc&reference=evt-1";
        assert!(matches!(
            parse_payload(not_json),
            Err(AppError::MalformedPayload(_))
        ));
    }

    #[test]
    fn payload_ignores_extra_fields() {
        let body = br#"{"tx_ref":"bk-abc","reference":"evt-1","status":"success","amount":"300.00"}"#;
        let payload = parse_payload(body).unwrap();

        assert_eq!(payload.tx_ref, "bk-abc");
        assert_eq!(payload.reference, "evt-1");
    }
}
