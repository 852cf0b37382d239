use chrono::Utc;
use uuid::Uuid;

use crate::crypto::codes::{generate_backup_codes, hash_code};
use crate::domain::repository::{BackupCodeStore, MethodStore};
use crate::domain::types::BackupCode;
use crate::error::MfaError;

/// Persist a fresh backup batch and return the plaintext codes. The
/// plaintext leaves the core exactly once, here.
pub(crate) async fn issue_backup_batch<B: BackupCodeStore>(
    user_id: Uuid,
    store: &B,
) -> Result<Vec<String>, MfaError> {
    let codes = generate_backup_codes();
    let now = Utc::now();
    let records: Vec<BackupCode> = codes
        .iter()
        .map(|code| BackupCode {
            id: Uuid::new_v4(),
            user_id,
            code_hash: hash_code(&crate::crypto::codes::normalize_backup_code(code)),
            is_used: false,
            used_at: None,
            created_at: now,
        })
        .collect();
    store.insert_batch(&records).await?;
    Ok(codes)
}

/// Issue the batch only when the method being confirmed is the user's
/// first enabled one.
pub(crate) async fn issue_backup_batch_if_first<B: BackupCodeStore>(
    user_id: Uuid,
    first_method: bool,
    store: &B,
) -> Result<Option<Vec<String>>, MfaError> {
    if !first_method {
        return Ok(None);
    }
    Ok(Some(issue_backup_batch(user_id, store).await?))
}

// ── RegenerateBackupCodes ────────────────────────────────────────────────────

pub struct RegenerateBackupCodesUseCase<M, B>
where
    M: MethodStore,
    B: BackupCodeStore,
{
    pub methods: M,
    pub backup_codes: B,
}

impl<M, B> RegenerateBackupCodesUseCase<M, B>
where
    M: MethodStore,
    B: BackupCodeStore,
{
    /// Invalidate every existing code, then mint a fresh batch. Old codes
    /// never stay valid past a regeneration.
    pub async fn execute(&self, user_id: Uuid) -> Result<Vec<String>, MfaError> {
        if self.methods.list_enabled(user_id).await?.is_empty() {
            return Err(MfaError::MfaNotEnabled);
        }

        self.backup_codes.mark_all_used(user_id).await?;
        issue_backup_batch(user_id, &self.backup_codes).await
    }
}
