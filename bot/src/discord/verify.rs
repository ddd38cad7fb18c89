//! Ed25519 request signature check.
//!
//! Discord signs `timestamp || body` with the application's key and sends the
//! signature and timestamp as headers. Requests that fail the check must be
//! rejected with `401`.

use ed25519_dalek::{Signature, VerifyingKey};
use thiserror::Error;

/// Header carrying the hex-encoded signature.
pub const SIGNATURE_HEADER: &str = "x-signature-ed25519";
/// Header carrying the signed timestamp.
pub const TIMESTAMP_HEADER: &str = "x-signature-timestamp";

/// Signature verification errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VerifyError {
    /// The configured public key is not a valid Ed25519 key.
    #[error("Invalid public key: {0}")]
    InvalidKey(String),

    /// A signature header was absent.
    #[error("Missing header: {0}")]
    MissingHeader(&'static str),

    /// The signature header was not 64 hex-encoded bytes.
    #[error("Malformed signature")]
    MalformedSignature,

    /// The signature does not match the request.
    #[error("Signature mismatch")]
    Mismatch,
}

/// Verifies inbound interaction requests.
#[derive(Clone, Debug)]
pub struct SignatureVerifier {
    key: VerifyingKey,
}

impl SignatureVerifier {
    /// Build a verifier from the hex-encoded application public key.
    ///
    /// # Errors
    ///
    /// Returns [`VerifyError::InvalidKey`] when the key is not 32 hex-encoded
    /// bytes or not a valid curve point.
    pub fn from_hex(public_key: &str) -> Result<Self, VerifyError> {
        let bytes: [u8; 32] = hex::decode(public_key.trim())
            .map_err(|e| VerifyError::InvalidKey(e.to_string()))?
            .try_into()
            .map_err(|_| VerifyError::InvalidKey("expected 32 bytes".to_string()))?;
        let key = VerifyingKey::from_bytes(&bytes).map_err(|e| VerifyError::InvalidKey(e.to_string()))?;
        Ok(Self { key })
    }

    /// Wrap an existing key.
    #[must_use]
    pub const fn new(key: VerifyingKey) -> Self {
        Self { key }
    }

    /// Check a request's signature headers against its raw body.
    ///
    /// # Errors
    ///
    /// - `MissingHeader`: a header was absent
    /// - `MalformedSignature`: the signature is not 64 hex-encoded bytes
    /// - `Mismatch`: the signature does not cover `timestamp || body`
    pub fn verify(&self, signature: Option<&str>, timestamp: Option<&str>, body: &[u8]) -> Result<(), VerifyError> {
        let signature = signature.ok_or(VerifyError::MissingHeader(SIGNATURE_HEADER))?;
        let timestamp = timestamp.ok_or(VerifyError::MissingHeader(TIMESTAMP_HEADER))?;

        let bytes: [u8; 64] = hex::decode(signature)
            .map_err(|_| VerifyError::MalformedSignature)?
            .try_into()
            .map_err(|_| VerifyError::MalformedSignature)?;
        let signature = Signature::from_bytes(&bytes);

        let mut message = Vec::with_capacity(timestamp.len() + body.len());
        message.extend_from_slice(timestamp.as_bytes());
        message.extend_from_slice(body);

        self.key
            .verify_strict(&message, &signature)
            .map_err(|_| VerifyError::Mismatch)
    }
}
