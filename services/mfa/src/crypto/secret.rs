//! At-rest encryption of TOTP secrets with AES-256-GCM.

use aes_gcm::aead::rand_core::RngCore;
use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::error::MfaError;

const NONCE_LEN: usize = 12;

/// Symmetric codec for sensitive MFA values. Blobs are
/// `base64(nonce || ciphertext || tag)` and opaque to callers.
#[derive(Clone)]
pub struct SecretCodec {
    cipher: Aes256Gcm,
}

impl SecretCodec {
    pub fn new(key: &[u8; 32]) -> Self {
        Self {
            cipher: Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key)),
        }
    }

    pub fn encrypt(&self, plaintext: &str) -> Result<String, MfaError> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|_| MfaError::InvalidCiphertext)?;

        let mut combined = nonce_bytes.to_vec();
        combined.extend_from_slice(&ciphertext);
        Ok(STANDARD.encode(combined))
    }

    /// Decrypt an opaque blob. Malformed or foreign ciphertext is
    /// unrecoverable for that value and always errors.
    pub fn decrypt(&self, encoded: &str) -> Result<String, MfaError> {
        let combined = STANDARD
            .decode(encoded)
            .map_err(|_| MfaError::InvalidCiphertext)?;

        if combined.len() <= NONCE_LEN {
            return Err(MfaError::InvalidCiphertext);
        }

        let (nonce_bytes, ciphertext) = combined.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|_| MfaError::InvalidCiphertext)?;

        String::from_utf8(plaintext).map_err(|_| MfaError::InvalidCiphertext)
    }
}
