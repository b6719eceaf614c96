use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine as _;
use hmac::{Hmac, Mac};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;
use thiserror::Error;
use zeroize::Zeroizing;

type HmacSha256 = Hmac<Sha256>;

const MIN_SECRET_LENGTH: usize = 32;

/// Errors produced by the crypto helpers.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("secret is too weak: expected at least {expected} bytes, got {actual}")]
    WeakSecret { expected: usize, actual: usize },
    #[error("base64 decode error: {0}")]
    Base64Decode(#[from] base64::DecodeError),
    #[error("invalid HMAC key length")]
    InvalidMacKey,
}

/// The identity provider's signing secret, held only in memory. Must be at
/// least 32 random bytes; a shorter secret is fatal at startup, not
/// something the server silently tolerates.
#[derive(Clone)]
pub struct SigningSecret(Zeroizing<Vec<u8>>);

impl SigningSecret {
    /// Load and validate a signing secret. Returns `WeakSecret` rather than
    /// panicking so the caller (config loader) can turn it into a clean
    /// startup failure with a readable message.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Result<Self, CryptoError> {
        let bytes = bytes.into();
        if bytes.len() < MIN_SECRET_LENGTH {
            return Err(CryptoError::WeakSecret {
                expected: MIN_SECRET_LENGTH,
                actual: bytes.len(),
            });
        }
        Ok(Self(Zeroizing::new(bytes)))
    }

    pub fn from_base64(value: &str) -> Result<Self, CryptoError> {
        let decoded = BASE64_STANDARD.decode(value.trim())?;
        Self::from_bytes(decoded)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Generate a fresh random secret, for local development bootstrapping only.
    pub fn generate() -> Self {
        let mut bytes = vec![0u8; MIN_SECRET_LENGTH];
        OsRng.fill_bytes(&mut bytes);
        Self(Zeroizing::new(bytes))
    }
}

impl std::fmt::Debug for SigningSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningSecret").field("bytes", &"***redacted***").finish()
    }
}

/// Produce a stable, irreversible fingerprint of an offered credential
/// (bearer token, password) for audit logging. The identity verifier
/// records this fingerprint on auth failure instead of the credential
/// itself: useful for correlating repeated bad attempts without ever
/// persisting the secret.
pub fn credential_fingerprint(secret: &SigningSecret, credential: &str) -> String {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts any key length");
    mac.update(credential.as_bytes());
    let digest = mac.finalize().into_bytes();
    hex::encode(digest)
}

mod hex {
    pub fn encode(bytes: impl AsRef<[u8]>) -> String {
        bytes.as_ref().iter().map(|b| format!("{b:02x}")).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_secret_is_rejected() {
        let err = SigningSecret::from_bytes(vec![0u8; 16]).unwrap_err();
        assert!(matches!(err, CryptoError::WeakSecret { expected: 32, actual: 16 }));
    }

    #[test]
    fn fingerprint_is_deterministic_and_does_not_reveal_the_credential() {
        let secret = SigningSecret::generate();
        let a = credential_fingerprint(&secret, "Bearer abc.def.ghi");
        let b = credential_fingerprint(&secret, "Bearer abc.def.ghi");
        let c = credential_fingerprint(&secret, "Bearer different");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(!a.contains("abc.def.ghi"));
    }

    #[test]
    fn base64_secret_round_trips_through_bytes() {
        let raw = SigningSecret::generate();
        let encoded = BASE64_STANDARD.encode(raw.as_bytes());
        let parsed = SigningSecret::from_base64(&encoded).unwrap();
        assert_eq!(parsed.as_bytes(), raw.as_bytes());
    }
}
