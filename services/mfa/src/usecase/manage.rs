use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::domain::repository::{AttemptLog, BackupCodeStore, MethodStore};
use crate::domain::types::{
    ATTEMPT_HISTORY_LIMIT, FailureReason, MethodType, mask_email, mask_phone,
};
use crate::error::MfaError;

// ── MfaStatus ────────────────────────────────────────────────────────────────

/// One enrolled method, with contact details masked for display.
#[derive(Debug, Serialize)]
pub struct MethodSummary {
    pub method_type: MethodType,
    pub is_enabled: bool,
    pub is_verified: bool,
    pub phone_number: Option<String>,
    pub email_address: Option<String>,
    pub last_used: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct MfaStatusOutput {
    pub mfa_enabled: bool,
    pub methods: Vec<MethodSummary>,
    pub backup_codes_remaining: usize,
}

pub struct MfaStatusUseCase<M, B>
where
    M: MethodStore,
    B: BackupCodeStore,
{
    pub methods: M,
    pub backup_codes: B,
}

impl<M, B> MfaStatusUseCase<M, B>
where
    M: MethodStore,
    B: BackupCodeStore,
{
    pub async fn execute(&self, user_id: Uuid) -> Result<MfaStatusOutput, MfaError> {
        let enabled = self.methods.list_enabled(user_id).await?;
        let unused = self.backup_codes.list_unused(user_id).await?;

        let methods = enabled
            .into_iter()
            .map(|m| MethodSummary {
                method_type: m.method_type,
                is_enabled: m.is_enabled,
                is_verified: m.is_verified,
                phone_number: m.phone_number.as_deref().map(mask_phone),
                email_address: m.email_address.as_deref().map(mask_email),
                last_used: m.last_used,
            })
            .collect::<Vec<_>>();

        Ok(MfaStatusOutput {
            mfa_enabled: !methods.is_empty(),
            methods,
            backup_codes_remaining: unused.len(),
        })
    }
}

// ── DisableMethod ────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct DisableMethodOutput {
    pub disabled: bool,
    /// True when disabling this method also invalidated the backup codes.
    pub backup_codes_invalidated: bool,
}

pub struct DisableMethodUseCase<M, B>
where
    M: MethodStore,
    B: BackupCodeStore,
{
    pub methods: M,
    pub backup_codes: B,
}

impl<M, B> DisableMethodUseCase<M, B>
where
    M: MethodStore,
    B: BackupCodeStore,
{
    /// Disable one method. When it was the last enabled method the backup
    /// codes are invalidated too, so a disabled account has no live
    /// second-factor credentials at all.
    pub async fn execute(
        &self,
        user_id: Uuid,
        method_type: MethodType,
    ) -> Result<DisableMethodOutput, MfaError> {
        let method = self
            .methods
            .find(user_id, method_type)
            .await?
            .ok_or(MfaError::MethodNotFound)?;

        self.methods.set_enabled(method.id, false).await?;

        let last_one = self.methods.list_enabled(user_id).await?.is_empty();
        if last_one {
            self.backup_codes.mark_all_used(user_id).await?;
        }

        Ok(DisableMethodOutput {
            disabled: true,
            backup_codes_invalidated: last_one,
        })
    }
}

// ── ListAttempts ─────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct AttemptSummary {
    pub method: String,
    pub success: bool,
    pub failure_reason: Option<FailureReason>,
    pub ip_address: String,
    pub timestamp: DateTime<Utc>,
}

pub struct ListAttemptsUseCase<A>
where
    A: AttemptLog,
{
    pub attempts: A,
}

impl<A> ListAttemptsUseCase<A>
where
    A: AttemptLog,
{
    /// Recent verification history for security review, newest first.
    pub async fn execute(&self, user_id: Uuid) -> Result<Vec<AttemptSummary>, MfaError> {
        let attempts = self.attempts.recent(user_id, ATTEMPT_HISTORY_LIMIT).await?;
        Ok(attempts
            .into_iter()
            .map(|a| AttemptSummary {
                method: a.method,
                success: a.success,
                failure_reason: a.failure_reason,
                ip_address: a.ip_address,
                timestamp: a.timestamp,
            })
            .collect())
    }
}
