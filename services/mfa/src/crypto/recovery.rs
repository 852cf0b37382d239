//! Signed, time-boxed recovery tokens (HS256).
//!
//! The signature proves issuance and bounds lifetime; single use is
//! enforced separately against the persisted [`RecoveryToken`] record.
//!
//! [`RecoveryToken`]: crate::domain::types::RecoveryToken

use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

use crate::domain::types::RECOVERY_TOKEN_TTL_HOURS;
use crate::error::MfaError;

const RECOVERY_PURPOSE: &str = "mfa_recovery";

/// Claims carried by a recovery token.
#[derive(Debug, Serialize, Deserialize)]
pub struct RecoveryClaims {
    pub sub: String,
    pub purpose: String,
    pub exp: u64,
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before UNIX epoch")
        .as_secs()
}

/// Issue a signed recovery token for `user_id`, valid for 24 hours.
pub fn issue_recovery_token(user_id: Uuid, secret: &str) -> Result<String, MfaError> {
    let claims = RecoveryClaims {
        sub: user_id.to_string(),
        purpose: RECOVERY_PURPOSE.to_owned(),
        exp: now_secs() + (RECOVERY_TOKEN_TTL_HOURS as u64) * 3600,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| MfaError::Internal(e.into()))
}

/// Validate signature, expiry and purpose. Fails closed: any verification
/// error, expired signature or wrong purpose yields `None`.
pub fn verify_recovery_token(token: &str, secret: &str) -> Option<Uuid> {
    let mut validation = Validation::new(jsonwebtoken::Algorithm::HS256);
    validation.validate_exp = true;
    validation.required_spec_claims.clear();
    validation.set_required_spec_claims(&["exp", "sub"]);

    let data = decode::<RecoveryClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .ok()?;

    if data.claims.purpose != RECOVERY_PURPOSE {
        return None;
    }
    data.claims.sub.parse::<Uuid>().ok()
}
