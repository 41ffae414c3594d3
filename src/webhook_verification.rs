//! # Webhook Signature Verification
//!
//! Optional HMAC-SHA256 check of inbound platform webhooks. The signature is
//! the hex digest of the raw request body keyed with the platform's webhook
//! secret, sent in `X-Webhook-Signature` with an optional `sha256=` prefix.
//! A platform without a configured secret is not verified.

use std::sync::Arc;

use axum::{
    Json,
    body::Body,
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::{debug, warn};

use crate::config::AppConfig;
use crate::handlers::webhooks::{WebhookResponse, record};
use crate::models::Platform;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "x-webhook-signature";
const SIGNATURE_PREFIX: &str = "sha256=";

/// Largest webhook body buffered for verification.
const MAX_WEBHOOK_BODY_BYTES: usize = 2 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum VerificationError {
    #[error("missing required signature header: {header}")]
    MissingSignature { header: &'static str },

    #[error("invalid signature format: {reason}")]
    InvalidSignatureFormat { reason: &'static str },

    #[error("signature verification failed")]
    VerificationFailed,

    #[error("failed to read webhook body")]
    UnreadableBody,
}

impl VerificationError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            VerificationError::UnreadableBody => StatusCode::BAD_REQUEST,
            _ => StatusCode::UNAUTHORIZED,
        }
    }
}

impl IntoResponse for VerificationError {
    fn into_response(self) -> Response {
        (
            self.status_code(),
            Json(WebhookResponse::failure(self.to_string())),
        )
            .into_response()
    }
}

/// Hex HMAC-SHA256 of `body` under `secret`, as a sender would compute it.
pub fn sign(body: &[u8], secret: &str) -> Result<String, VerificationError> {
    Ok(hex::encode(digest(body, secret)?))
}

fn digest(body: &[u8], secret: &str) -> Result<Vec<u8>, VerificationError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| VerificationError::VerificationFailed)?;
    mac.update(body);
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Checks `signature_header` against the body digest in constant time.
pub fn verify_signature(
    body: &[u8],
    signature_header: &str,
    secret: &str,
) -> Result<(), VerificationError> {
    let signature = signature_header.trim();
    if signature.is_empty() {
        return Err(VerificationError::MissingSignature {
            header: "X-Webhook-Signature",
        });
    }

    let signature = signature.strip_prefix(SIGNATURE_PREFIX).unwrap_or(signature);
    let provided = hex::decode(signature).map_err(|_| VerificationError::InvalidSignatureFormat {
        reason: "signature is not valid hex",
    })?;

    let expected = digest(body, secret)?;
    if subtle::ConstantTimeEq::ct_eq(expected.as_slice(), provided.as_slice()).into() {
        Ok(())
    } else {
        Err(VerificationError::VerificationFailed)
    }
}

fn secret_for<'a>(config: &'a AppConfig, platform: Platform) -> Option<&'a str> {
    let secret = match platform {
        Platform::Docuseal => config.docuseal.webhook_secret.as_deref(),
        Platform::N8n => config.n8n.webhook_secret.as_deref(),
    };
    secret.filter(|value| !value.is_empty())
}

fn signature_header(headers: &HeaderMap) -> &str {
    headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("")
}

/// Verifies webhook deliveries on `/api/webhooks/{platform}` routes.
pub async fn webhook_verification_middleware(
    State(config): State<Arc<AppConfig>>,
    request: Request,
    next: Next,
) -> Result<Response, VerificationError> {
    let platform = request
        .uri()
        .path()
        .rsplit('/')
        .next()
        .and_then(|segment| segment.parse::<Platform>().ok());

    let Some((platform, secret)) =
        platform.and_then(|platform| secret_for(&config, platform).map(|s| (platform, s)))
    else {
        return Ok(next.run(request).await);
    };

    let (parts, body) = request.into_parts();
    let body_bytes = axum::body::to_bytes(body, MAX_WEBHOOK_BODY_BYTES)
        .await
        .map_err(|e| {
            warn!(%platform, error = %e, "Failed to read webhook body for verification");
            VerificationError::UnreadableBody
        })?;

    if let Err(err) = verify_signature(&body_bytes, signature_header(&parts.headers), secret) {
        warn!(%platform, error = %err, "Rejecting webhook with bad signature");
        record(platform, "unverified", "rejected");
        return Err(err);
    }

    debug!(%platform, body_size = body_bytes.len(), "Webhook signature verified");
    let request = Request::from_parts(parts, Body::from(body_bytes));
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test";

    #[test]
    fn test_valid_signature_with_and_without_prefix() {
        let body = br#"{"event":"submission.completed","data":{"id":1}}"#;
        let signature = sign(body, SECRET).unwrap();

        assert!(verify_signature(body, &signature, SECRET).is_ok());
        assert!(verify_signature(body, &format!("sha256={}", signature), SECRET).is_ok());
    }

    #[test]
    fn test_tampered_body_fails() {
        let signature = sign(b"original", SECRET).unwrap();
        assert!(matches!(
            verify_signature(b"tampered", &signature, SECRET),
            Err(VerificationError::VerificationFailed)
        ));
    }

    #[test]
    fn test_wrong_secret_fails() {
        let signature = sign(b"body", "other-secret").unwrap();
        assert!(matches!(
            verify_signature(b"body", &signature, SECRET),
            Err(VerificationError::VerificationFailed)
        ));
    }

    #[test]
    fn test_missing_or_malformed_signature() {
        assert!(matches!(
            verify_signature(b"body", "", SECRET),
            Err(VerificationError::MissingSignature { .. })
        ));
        assert!(matches!(
            verify_signature(b"body", "sha256=not-hex", SECRET),
            Err(VerificationError::InvalidSignatureFormat { .. })
        ));
        // Truncated digest compares unequal rather than panicking
        assert!(matches!(
            verify_signature(b"body", "abcd", SECRET),
            Err(VerificationError::VerificationFailed)
        ));
    }

    #[test]
    fn test_empty_secret_disables_verification() {
        let mut config = AppConfig::default();
        config.docuseal.webhook_secret = Some(String::new());
        config.n8n.webhook_secret = Some(SECRET.to_string());

        assert_eq!(secret_for(&config, Platform::Docuseal), None);
        assert_eq!(secret_for(&config, Platform::N8n), Some(SECRET));
    }

    #[test]
    fn test_error_status_codes() {
        assert_eq!(
            VerificationError::VerificationFailed.status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            VerificationError::UnreadableBody.status_code(),
            StatusCode::BAD_REQUEST
        );
    }
}
