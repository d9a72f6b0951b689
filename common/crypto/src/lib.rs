use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;
use zeroize::Zeroizing;

type HmacSha256 = Hmac<Sha256>;

/// Optional scheme marker some senders put in front of the hex digest.
const SHA256_PREFIX: &str = "sha256=";

/// Errors produced by the common-crypto helpers.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("signature does not match payload")]
    Mismatch,
    #[error("signature is not valid hex")]
    Malformed,
    #[error("invalid HMAC key length")]
    InvalidMacKey,
}

/// Shared secret used to sign webhook payloads. The bytes are wiped on drop
/// and never printed.
#[derive(Clone)]
pub struct SigningSecret(Zeroizing<Vec<u8>>);

impl SigningSecret {
    pub fn new<B>(bytes: B) -> Self
    where
        B: AsRef<[u8]>,
    {
        Self(Zeroizing::new(bytes.as_ref().to_vec()))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Hex-encoded HMAC-SHA256 of `payload` under this secret.
    pub fn sign_hex(&self, payload: &[u8]) -> Result<String, SignatureError> {
        let digest = hmac_sha256(self.as_bytes(), payload)?;
        Ok(hex::encode(digest))
    }

    /// Verify a hex digest (optionally `sha256=`-prefixed) against `payload`.
    pub fn verify_hex(&self, payload: &[u8], provided: &str) -> Result<(), SignatureError> {
        verify_hex(self.as_bytes(), payload, provided)
    }
}

impl std::fmt::Debug for SigningSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningSecret")
            .field("bytes", &"***redacted***")
            .finish()
    }
}

/// Raw HMAC-SHA256 over `payload`.
pub fn hmac_sha256(key: &[u8], payload: &[u8]) -> Result<Vec<u8>, SignatureError> {
    let mut mac =
        <HmacSha256 as Mac>::new_from_slice(key).map_err(|_| SignatureError::InvalidMacKey)?;
    mac.update(payload);
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Recompute the digest over the exact payload bytes and compare it with the
/// provided hex value in constant time.
pub fn verify_hex(key: &[u8], payload: &[u8], provided: &str) -> Result<(), SignatureError> {
    let trimmed = provided.trim();
    let hex_part = trimmed.strip_prefix(SHA256_PREFIX).unwrap_or(trimmed);
    let provided_bytes = hex::decode(hex_part).map_err(|_| SignatureError::Malformed)?;
    let expected = hmac_sha256(key, payload)?;
    // ct_eq on slices of different length returns false without leaking content
    if expected.as_slice().ct_eq(provided_bytes.as_slice()).unwrap_u8() == 1 {
        Ok(())
    } else {
        Err(SignatureError::Mismatch)
    }
}
