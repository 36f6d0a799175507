//! Webhook signature verification.
//!
//! Two schemes coexist. The keyed scheme signs `{id}.{timestamp}.{raw body}`
//! with HMAC-SHA256 and ships base64 signatures in a `v1,<sig>` list; the
//! legacy scheme is a single hex HMAC of the raw body. Both compare in
//! constant time through `Mac::verify_slice`.

use axum::http::HeaderMap;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::warn;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, thiserror::Error)]
pub enum SignatureError {
    #[error("no signature headers present")]
    MissingHeaders,

    #[error("signature does not match payload")]
    Mismatch,
}

pub struct WebhookVerifier {
    secret: Option<String>,
}

impl WebhookVerifier {
    pub fn new(secret: Option<String>) -> Self {
        if secret.is_none() {
            warn!("no webhook secret configured, accepting unsigned events");
        }
        Self { secret }
    }

    /// Verify an incoming webhook request. Keyed headers take precedence over
    /// the legacy header when both are present.
    pub fn verify(&self, headers: &HeaderMap, body: &[u8]) -> Result<(), SignatureError> {
        let Some(secret) = self.secret.as_deref() else {
            return Ok(());
        };

        if let Some((id, timestamp, signatures)) = keyed_headers(headers) {
            return verify_keyed(secret, id, timestamp, signatures, body);
        }
        if let Some(signature) = header_str(headers, "x-webhook-signature") {
            return verify_legacy(secret, signature, body);
        }
        Err(SignatureError::MissingHeaders)
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// The keyed scheme's header triple, with `svix-*` names preferred and
/// `webhook-*` as the fallback spelling.
fn keyed_headers(headers: &HeaderMap) -> Option<(&str, &str, &str)> {
    let id = header_str(headers, "svix-id").or_else(|| header_str(headers, "webhook-id"))?;
    let timestamp =
        header_str(headers, "svix-timestamp").or_else(|| header_str(headers, "webhook-timestamp"))?;
    let signatures =
        header_str(headers, "svix-signature").or_else(|| header_str(headers, "webhook-signature"))?;
    Some((id, timestamp, signatures))
}

/// Keyed secrets may carry a `whsec_` prefix over base64 key material; a
/// secret that fails to decode is used verbatim.
fn keyed_secret_bytes(secret: &str) -> Vec<u8> {
    match secret.strip_prefix("whsec_") {
        Some(encoded) => BASE64
            .decode(encoded)
            .unwrap_or_else(|_| encoded.as_bytes().to_vec()),
        None => secret.as_bytes().to_vec(),
    }
}

fn verify_keyed(
    secret: &str,
    id: &str,
    timestamp: &str,
    signatures: &str,
    body: &[u8],
) -> Result<(), SignatureError> {
    let key = keyed_secret_bytes(secret);
    let mut mac = HmacSha256::new_from_slice(&key).map_err(|_| SignatureError::Mismatch)?;
    mac.update(id.as_bytes());
    mac.update(b".");
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(body);

    // The header lists space-separated candidates, each `v1,<base64>`.
    for candidate in signatures.split_whitespace() {
        let encoded = candidate.strip_prefix("v1,").unwrap_or(candidate);
        let Ok(bytes) = BASE64.decode(encoded) else {
            continue;
        };
        if mac.clone().verify_slice(&bytes).is_ok() {
            return Ok(());
        }
    }
    Err(SignatureError::Mismatch)
}

fn verify_legacy(secret: &str, signature: &str, body: &[u8]) -> Result<(), SignatureError> {
    let bytes = hex::decode(signature.trim()).map_err(|_| SignatureError::Mismatch)?;
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| SignatureError::Mismatch)?;
    mac.update(body);
    mac.verify_slice(&bytes).map_err(|_| SignatureError::Mismatch)
}
