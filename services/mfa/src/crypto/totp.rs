//! TOTP enrollment and verification (RFC 6238: SHA-1, 6 digits, 30 s steps).

use std::time::{SystemTime, UNIX_EPOCH};

use subtle::ConstantTimeEq;
use totp_rs::{Algorithm, Secret, TOTP};

use crate::domain::types::CODE_LEN;
use crate::error::MfaError;

/// Seconds per TOTP time step.
pub const STEP_SECONDS: u64 = 30;

/// Default verification tolerance in steps on either side of now.
pub const DEFAULT_WINDOW: u64 = 1;

/// Fresh TOTP enrollment material. The Base32 secret and QR artifact are
/// shown to the user once; only the encrypted secret is persisted.
#[derive(Debug)]
pub struct Enrollment {
    /// 160-bit secret, 32 Base32 characters.
    pub secret: String,
    pub provisioning_uri: String,
    /// PNG QR code of the URI as a `data:` URL for the setup UI.
    pub qr_code: String,
}

/// Generate a fresh enrollment for `label` under `issuer`.
pub fn generate_enrollment(issuer: &str, label: &str) -> Result<Enrollment, MfaError> {
    let secret = Secret::generate_secret();
    let totp = build(
        secret
            .to_bytes()
            .map_err(|e| MfaError::Internal(anyhow::anyhow!("secret bytes: {e}")))?,
        issuer,
        label,
    )
    .map_err(|e| MfaError::Internal(anyhow::anyhow!("totp init: {e}")))?;

    let qr_png = totp
        .get_qr_base64()
        .map_err(|e| MfaError::Internal(anyhow::anyhow!("qr render: {e}")))?;

    Ok(Enrollment {
        secret: secret.to_encoded().to_string(),
        provisioning_uri: totp.get_url(),
        qr_code: format!("data:image/png;base64,{qr_png}"),
    })
}

/// Verify a submitted code against a Base32 secret with ±`window` steps of
/// tolerance. Returns false on malformed secret or code, never errors.
pub fn verify(secret_b32: &str, code: &str, window: u64) -> bool {
    matching_step(secret_b32, code, window, now_secs()).is_some()
}

/// Like [`verify`], but returns the time step the code matched so callers
/// can reject a replay of the same step.
pub fn matching_step(secret_b32: &str, code: &str, window: u64, at: u64) -> Option<u64> {
    if code.len() != CODE_LEN || !code.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let secret_bytes = Secret::Encoded(secret_b32.to_owned()).to_bytes().ok()?;
    // Issuer/label do not affect code derivation.
    let totp = build(secret_bytes, "verify", "verify").ok()?;

    let window = window as i64;
    for offset in -window..=window {
        let t = at as i64 + offset * STEP_SECONDS as i64;
        if t < 0 {
            continue;
        }
        let expected = totp.generate(t as u64);
        if expected.as_bytes().ct_eq(code.as_bytes()).into() {
            return Some(t as u64 / STEP_SECONDS);
        }
    }
    None
}

/// Current time step index.
pub fn current_step() -> u64 {
    now_secs() / STEP_SECONDS
}

fn build(secret_bytes: Vec<u8>, issuer: &str, label: &str) -> Result<TOTP, totp_rs::TotpUrlError> {
    TOTP::new(
        Algorithm::SHA1,
        CODE_LEN,
        1,
        STEP_SECONDS,
        secret_bytes,
        Some(issuer.to_owned()),
        label.to_owned(),
    )
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before UNIX epoch")
        .as_secs()
}
