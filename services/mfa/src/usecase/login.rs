use chrono::Utc;
use uuid::Uuid;

use crate::crypto::codes::{matches_hash, normalize_backup_code};
use crate::crypto::secret::SecretCodec;
use crate::crypto::totp;
use crate::domain::repository::{
    AttemptCounter, AttemptLog, BackupCodeStore, MethodStore, PendingStore,
};
use crate::domain::types::{FailureReason, MethodType, RequestContext, VerificationAttempt};
use crate::error::MfaError;
use crate::limiter::RateLimiter;

/// Proof supplied from the `MFA_REQUIRED` state. The two paths are
/// mutually exclusive by construction; exactly one is taken per call.
#[derive(Debug, Clone)]
pub enum LoginProof {
    MethodCode { method: MethodType, code: String },
    BackupCode { code: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyLoginOutput {
    pub verified: bool,
    /// Specific rejection cause, recorded for the audit trail. Callers
    /// surface only the generic verified/rejected outcome to users.
    pub failure_reason: Option<FailureReason>,
}

/// Answers "is this login verified" for a user in `MFA_REQUIRED`, and
/// records the attempt. `VERIFIED` marks the method used (token paths);
/// session creation is the caller's responsibility.
pub struct VerifyLoginUseCase<M, B, P, A, C>
where
    M: MethodStore,
    B: BackupCodeStore,
    P: PendingStore,
    A: AttemptLog,
    C: AttemptCounter,
{
    pub methods: M,
    pub backup_codes: B,
    pub pending: P,
    pub attempts: A,
    pub limiter: RateLimiter<C>,
    pub codec: SecretCodec,
}

impl<M, B, P, A, C> VerifyLoginUseCase<M, B, P, A, C>
where
    M: MethodStore,
    B: BackupCodeStore,
    P: PendingStore,
    A: AttemptLog,
    C: AttemptCounter,
{
    /// Infallible at the boundary: codec, store and limiter failures are
    /// logged and collapse into a `verification_error` rejection.
    pub async fn execute(
        &self,
        user_id: Uuid,
        proof: LoginProof,
        ctx: &RequestContext,
    ) -> VerifyLoginOutput {
        let (method_label, outcome) = match &proof {
            LoginProof::BackupCode { code } => {
                ("backup_code", self.verify_backup(user_id, code).await)
            }
            LoginProof::MethodCode { method, code } => {
                let outcome = match method {
                    MethodType::Totp => self.verify_totp(user_id, code).await,
                    MethodType::Sms | MethodType::Email => {
                        self.verify_pending(user_id, *method, code).await
                    }
                };
                (method.as_str(), outcome)
            }
        };

        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(error = %e, %user_id, "login verification error");
                Err(FailureReason::VerificationError)
            }
        };

        let attempt = VerificationAttempt::record(user_id, method_label, outcome, ctx);
        if let Err(e) = self.attempts.record(&attempt).await {
            tracing::error!(error = %e, %user_id, "failed to record verification attempt");
        }

        VerifyLoginOutput {
            verified: outcome.is_ok(),
            failure_reason: outcome.err(),
        }
    }

    async fn verify_totp(
        &self,
        user_id: Uuid,
        code: &str,
    ) -> Result<Result<(), FailureReason>, MfaError> {
        let Some(method) = self.methods.find(user_id, MethodType::Totp).await? else {
            return Ok(Err(FailureReason::MethodNotEnabled));
        };
        if !method.is_usable() {
            return Ok(Err(FailureReason::MethodNotEnabled));
        }
        let Some(encrypted) = method.totp_secret.as_deref() else {
            return Ok(Err(FailureReason::MethodNotEnabled));
        };

        if self.limiter.is_rate_limited(user_id, "totp_verify").await? {
            return Ok(Err(FailureReason::RateLimited));
        }

        let secret = self.codec.decrypt(encrypted)?;
        let Some(step) = totp::matching_step(&secret, code.trim(), totp::DEFAULT_WINDOW, now_unix())
        else {
            return Ok(Err(FailureReason::InvalidTotp));
        };

        // A code is tied to its time step; accepting the same step twice
        // would allow replay inside the tolerance window.
        if method.last_used_step == Some(step) {
            return Ok(Err(FailureReason::InvalidTotp));
        }

        self.methods
            .mark_used(method.id, Utc::now(), Some(step))
            .await?;
        Ok(Ok(()))
    }

    async fn verify_pending(
        &self,
        user_id: Uuid,
        method_type: MethodType,
        code: &str,
    ) -> Result<Result<(), FailureReason>, MfaError> {
        let Some(method) = self.methods.find(user_id, method_type).await? else {
            return Ok(Err(FailureReason::MethodNotEnabled));
        };
        if !method.is_usable() {
            return Ok(Err(FailureReason::MethodNotEnabled));
        }

        let Some(pending) = self.pending.find_latest(user_id, method_type).await? else {
            return Ok(Err(FailureReason::ExpiredOrNotFound));
        };
        if pending.is_expired() {
            return Ok(Err(FailureReason::ExpiredOrNotFound));
        }
        if pending.attempts_exhausted() {
            return Ok(Err(FailureReason::MaxAttemptsReached));
        }

        let matched = matches_hash(code.trim(), &pending.code_hash);
        self.pending.increment_attempts(pending.id).await?;

        if !matched {
            return Ok(Err(FailureReason::InvalidCode));
        }
        // First success deletes the record; a raced second verification
        // must see it gone.
        if !self.pending.delete(pending.id).await? {
            return Ok(Err(FailureReason::ExpiredOrNotFound));
        }

        self.methods.mark_used(method.id, Utc::now(), None).await?;
        Ok(Ok(()))
    }

    async fn verify_backup(
        &self,
        user_id: Uuid,
        code: &str,
    ) -> Result<Result<(), FailureReason>, MfaError> {
        let normalized = normalize_backup_code(code);
        if normalized.is_empty() {
            return Ok(Err(FailureReason::InvalidBackupCode));
        }

        for backup in self.backup_codes.list_unused(user_id).await? {
            if matches_hash(&normalized, &backup.code_hash) {
                // Consume at most once, even against a concurrent match.
                if self.backup_codes.mark_used(backup.id).await? {
                    return Ok(Ok(()));
                }
                return Ok(Err(FailureReason::InvalidBackupCode));
            }
        }
        Ok(Err(FailureReason::InvalidBackupCode))
    }
}

fn now_unix() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before UNIX epoch")
        .as_secs()
}
