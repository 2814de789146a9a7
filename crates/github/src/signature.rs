//! Webhook signature verification.
//!
//! GitHub signs each delivery with the shared secret and sends
//! `sha256=<hex(HMAC-SHA256(secret, body))>` in `X-Hub-Signature-256`. The
//! signature covers the raw body bytes, so verification must happen before any
//! JSON decoding.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the body signature.
pub const SIGNATURE_HEADER: &str = "x-hub-signature-256";

/// Prefix of the header value.
pub const SIGNATURE_PREFIX: &str = "sha256=";

/// The shared webhook secret, held as a keyed HMAC ready to be cloned per
/// request. Never printed.
#[derive(Clone)]
pub struct WebhookSecret(HmacSha256);

impl WebhookSecret {
    /// Returns `None` for an empty secret.
    pub fn new(secret: impl AsRef<[u8]>) -> Option<Self> {
        let secret = secret.as_ref();
        if secret.is_empty() {
            return None;
        }
        HmacSha256::new_from_slice(secret).ok().map(Self)
    }

    fn mac(&self) -> HmacSha256 {
        self.0.clone()
    }
}

impl std::fmt::Debug for WebhookSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("WebhookSecret(***)")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    #[error("Missing X-Hub-Signature-256 header")]
    MissingHeader,

    #[error("Empty request body")]
    EmptyBody,

    #[error("Signature does not match")]
    Mismatch,
}

/// Computes the header value GitHub would send for `body`.
pub fn sign(secret: &WebhookSecret, body: &[u8]) -> String {
    let mut mac = secret.mac();
    mac.update(body);
    format!("{SIGNATURE_PREFIX}{}", hex::encode(mac.finalize().into_bytes()))
}

/// Checks `header` against the signature of `body`.
///
/// The header must equal `sha256=` followed by the lowercase hex digest, byte
/// for byte; the comparison runs in constant time. A missing header or an empty
/// body is rejected before any digest is computed.
pub fn verify(secret: &WebhookSecret, body: &[u8], header: Option<&str>) -> Result<(), SignatureError> {
    let header = header.ok_or(SignatureError::MissingHeader)?;
    if body.is_empty() {
        return Err(SignatureError::EmptyBody);
    }
    let expected = sign(secret, body);
    if bool::from(expected.as_bytes().ct_eq(header.as_bytes())) {
        Ok(())
    } else {
        Err(SignatureError::Mismatch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secret() -> WebhookSecret {
        WebhookSecret::new("It's a Secret to Everybody").unwrap()
    }

    #[test]
    fn test_known_github_vector() {
        // Example from GitHub's "Validating webhook deliveries" documentation.
        assert_eq!(
            sign(&secret(), b"Hello, World!"),
            "sha256=757107ea0eb2509fc211221cce984b8a37570b6d7586c22c46f4379c8b043e17"
        );
    }

    #[test]
    fn test_valid_signature_accepted() {
        let body = br#"{"zen":"Non-blocking is better than blocking."}"#;
        let header = sign(&secret(), body);
        assert_eq!(verify(&secret(), body, Some(header.as_str())), Ok(()));
    }

    #[test]
    fn test_tampered_body_rejected() {
        let header = sign(&secret(), b"original");
        assert_eq!(
            verify(&secret(), b"tampered", Some(header.as_str())),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let other = WebhookSecret::new("another secret").unwrap();
        let header = sign(&other, b"body");
        assert_eq!(
            verify(&secret(), b"body", Some(header.as_str())),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn test_missing_header_and_body() {
        assert_eq!(verify(&secret(), b"body", None), Err(SignatureError::MissingHeader));
        let header = sign(&secret(), b"");
        assert_eq!(verify(&secret(), b"", Some(header.as_str())), Err(SignatureError::EmptyBody));
    }

    #[test]
    fn test_malformed_header_rejected() {
        let header = sign(&secret(), b"body");
        let unprefixed = header.trim_start_matches(SIGNATURE_PREFIX);
        assert_eq!(verify(&secret(), b"body", Some(unprefixed)), Err(SignatureError::Mismatch));
        assert_eq!(verify(&secret(), b"body", Some("sha256=zz")), Err(SignatureError::Mismatch));
        assert_eq!(verify(&secret(), b"body", Some("sha1=abcd")), Err(SignatureError::Mismatch));
    }

    #[test]
    fn test_digest_must_be_lowercase_hex() {
        let header = sign(&secret(), b"body");
        let digest = header.trim_start_matches(SIGNATURE_PREFIX);
        let uppercase = format!("{SIGNATURE_PREFIX}{}", digest.to_ascii_uppercase());
        assert_eq!(verify(&secret(), b"body", Some(uppercase.as_str())), Err(SignatureError::Mismatch));

        let upper_prefix = format!("SHA256={digest}");
        assert_eq!(verify(&secret(), b"body", Some(upper_prefix.as_str())), Err(SignatureError::Mismatch));

        let padded = format!("{header} ");
        assert_eq!(verify(&secret(), b"body", Some(padded.as_str())), Err(SignatureError::Mismatch));
    }

    #[test]
    fn test_secret_is_redacted_and_non_empty() {
        assert!(WebhookSecret::new("").is_none());
        assert_eq!(format!("{:?}", secret()), "WebhookSecret(***)");
    }
}
