//! One-time numeric codes and backup recovery codes.

use rand::RngExt;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::domain::types::{BACKUP_CODE_COUNT, CODE_LEN};

/// Generate a numeric verification code with uniform digit selection.
pub fn generate_numeric_code() -> String {
    let mut rng = rand::rng();
    (0..CODE_LEN)
        .map(|_| char::from(b'0' + rng.random_range(0..10u8)))
        .collect()
}

/// Generate a batch of backup codes, formatted `XXXX-XXXX` for legibility.
/// The plaintext is returned to the caller exactly once; persist hashes only.
pub fn generate_backup_codes() -> Vec<String> {
    let mut rng = rand::rng();
    (0..BACKUP_CODE_COUNT)
        .map(|_| {
            let bytes: [u8; 4] = rng.random();
            let hex: String = bytes.iter().map(|b| format!("{b:02X}")).collect();
            format!("{}-{}", &hex[..4], &hex[4..])
        })
        .collect()
}

/// Normalize a backup code for comparison: uppercase, dashes/spaces stripped.
pub fn normalize_backup_code(code: &str) -> String {
    code.chars()
        .filter(|c| *c != '-' && *c != ' ')
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// SHA-256 hex digest used for stored codes and recovery tokens.
pub fn hash_code(code: &str) -> String {
    let digest = Sha256::digest(code.as_bytes());
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// Constant-time comparison of a submitted code against a stored hash.
pub fn matches_hash(submitted: &str, stored_hash: &str) -> bool {
    hash_code(submitted)
        .as_bytes()
        .ct_eq(stored_hash.as_bytes())
        .into()
}
