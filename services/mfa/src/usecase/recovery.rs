use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::crypto::codes::hash_code;
use crate::crypto::recovery::{issue_recovery_token, verify_recovery_token};
use crate::domain::repository::{
    AttemptLog, BackupCodeStore, EmailSink, MethodStore, RecoveryTokenStore,
};
use crate::domain::types::{
    RECOVERY_TOKEN_TTL_HOURS, RecoveryToken, RequestContext, VerificationAttempt,
};
use crate::error::MfaError;

// ── RequestRecovery ──────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct RequestRecoveryOutput {
    /// The signed token, returned directly only when it could not be
    /// delivered out of band.
    pub token: Option<String>,
    pub sent_via_email: bool,
}

pub struct RequestRecoveryUseCase<R, E>
where
    R: RecoveryTokenStore,
    E: EmailSink,
{
    pub tokens: R,
    pub email: E,
    pub signing_secret: String,
}

impl<R, E> RequestRecoveryUseCase<R, E>
where
    R: RecoveryTokenStore,
    E: EmailSink,
{
    /// Issue a 24h recovery token for a full MFA reset. The token hash is
    /// persisted for server-side single-use enforcement; the signature
    /// alone does not authorize recovery.
    pub async fn execute(
        &self,
        user_id: Uuid,
        email_address: Option<&str>,
        ctx: &RequestContext,
    ) -> Result<RequestRecoveryOutput, MfaError> {
        let token = issue_recovery_token(user_id, &self.signing_secret)?;

        let record = RecoveryToken {
            id: Uuid::new_v4(),
            user_id,
            token_hash: hash_code(&token),
            is_used: false,
            expires_at: Utc::now() + Duration::hours(RECOVERY_TOKEN_TTL_HOURS),
            used_at: None,
            ip_address: ctx.ip_address.clone(),
            created_at: Utc::now(),
        };
        self.tokens.insert(&record).await?;

        if let Some(to_address) = email_address {
            let body = format!(
                "A recovery token was requested for your account.\n\n\
                 Token: {token}\n\n\
                 It expires in 24 hours. If you didn't request this, ignore this email."
            );
            let sent = match self
                .email
                .send(to_address, "Boardroom account recovery", &body)
                .await
            {
                Ok(sent) => sent,
                Err(e) => {
                    tracing::error!(error = %e, %user_id, "recovery email dispatch error");
                    false
                }
            };
            if sent {
                return Ok(RequestRecoveryOutput {
                    token: None,
                    sent_via_email: true,
                });
            }
        }

        Ok(RequestRecoveryOutput {
            token: Some(token),
            sent_via_email: false,
        })
    }
}

// ── RecoverMfa ───────────────────────────────────────────────────────────────

pub struct RecoverMfaUseCase<R, M, B, A>
where
    R: RecoveryTokenStore,
    M: MethodStore,
    B: BackupCodeStore,
    A: AttemptLog,
{
    pub tokens: R,
    pub methods: M,
    pub backup_codes: B,
    pub attempts: A,
    pub signing_secret: String,
}

impl<R, M, B, A> RecoverMfaUseCase<R, M, B, A>
where
    R: RecoveryTokenStore,
    M: MethodStore,
    B: BackupCodeStore,
    A: AttemptLog,
{
    /// Verify a recovery token and, when valid, reset MFA: every method is
    /// disabled and all backup codes invalidated. Fails closed to `None`
    /// on any signature, expiry, purpose or reuse problem.
    pub async fn execute(
        &self,
        token: &str,
        ctx: &RequestContext,
    ) -> Result<Option<Uuid>, MfaError> {
        let Some(user_id) = verify_recovery_token(token, &self.signing_secret) else {
            return Ok(None);
        };

        // Signature checks out; the persisted record decides single use.
        let Some(record) = self.tokens.find_active(user_id, &hash_code(token)).await? else {
            tracing::warn!(%user_id, "recovery token replayed or unknown");
            return Ok(None);
        };
        self.tokens.mark_used(record.id).await?;

        for method in self.methods.list_enabled(user_id).await? {
            self.methods.set_enabled(method.id, false).await?;
        }
        self.backup_codes.mark_all_used(user_id).await?;

        let attempt = VerificationAttempt::record(user_id, "recovery", Ok(()), ctx);
        self.attempts.record(&attempt).await?;

        Ok(Some(user_id))
    }
}
