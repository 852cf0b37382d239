#![allow(async_fn_in_trait)]

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::domain::types::{
    BackupCode, MethodType, MfaMethod, PendingVerification, RecoveryToken, VerificationAttempt,
};
use crate::error::MfaError;

/// Store for enrolled MFA methods, keyed by (user, method type).
pub trait MethodStore: Send + Sync {
    async fn find(
        &self,
        user_id: Uuid,
        method_type: MethodType,
    ) -> Result<Option<MfaMethod>, MfaError>;

    /// All methods currently enabled for the user.
    async fn list_enabled(&self, user_id: Uuid) -> Result<Vec<MfaMethod>, MfaError>;

    /// Insert or replace the record for (method.user_id, method.method_type).
    async fn upsert(&self, method: &MfaMethod) -> Result<(), MfaError>;

    async fn set_enabled(&self, id: Uuid, enabled: bool) -> Result<(), MfaError>;

    /// Record a successful use: `last_used` and, for totp, the accepted step.
    async fn mark_used(
        &self,
        id: Uuid,
        at: DateTime<Utc>,
        step: Option<u64>,
    ) -> Result<(), MfaError>;
}

/// Store for single-use backup codes.
pub trait BackupCodeStore: Send + Sync {
    async fn list_unused(&self, user_id: Uuid) -> Result<Vec<BackupCode>, MfaError>;

    async fn insert_batch(&self, codes: &[BackupCode]) -> Result<(), MfaError>;

    /// Consume one code. Must be atomic per row: a code can be marked used
    /// at most once across concurrent callers. Returns false if already used.
    async fn mark_used(&self, id: Uuid) -> Result<bool, MfaError>;

    async fn mark_all_used(&self, user_id: Uuid) -> Result<(), MfaError>;
}

/// Store for pending sms/email verifications. One active record per
/// (user, method type).
pub trait PendingStore: Send + Sync {
    async fn find_latest(
        &self,
        user_id: Uuid,
        method_type: MethodType,
    ) -> Result<Option<PendingVerification>, MfaError>;

    /// Insert, superseding any previous record for the same (user, method).
    async fn replace(&self, pending: &PendingVerification) -> Result<(), MfaError>;

    async fn increment_attempts(&self, id: Uuid) -> Result<(), MfaError>;

    /// Delete a consumed or abandoned record. Must be atomic per row: the
    /// first successful verification deletes it, a concurrent second check
    /// then sees "not found". Returns false if already gone.
    async fn delete(&self, id: Uuid) -> Result<bool, MfaError>;
}

/// Append-only verification audit log.
pub trait AttemptLog: Send + Sync {
    async fn record(&self, attempt: &VerificationAttempt) -> Result<(), MfaError>;

    /// Most recent attempts, newest first.
    async fn recent(
        &self,
        user_id: Uuid,
        limit: u64,
    ) -> Result<Vec<VerificationAttempt>, MfaError>;
}

/// Store for recovery token state (server-side single-use enforcement).
pub trait RecoveryTokenStore: Send + Sync {
    async fn insert(&self, token: &RecoveryToken) -> Result<(), MfaError>;

    /// Find an unused, unexpired record by user and token hash.
    async fn find_active(
        &self,
        user_id: Uuid,
        token_hash: &str,
    ) -> Result<Option<RecoveryToken>, MfaError>;

    async fn mark_used(&self, id: Uuid) -> Result<(), MfaError>;
}

/// Durable shared counter behind the rate limiter. Implementations must
/// record the attempt and return the trailing-window count as one atomic
/// unit (e.g. a Redis pipeline or a transactional counter table).
pub trait AttemptCounter: Send + Sync {
    async fn record_and_count(&self, key: &str, window: Duration) -> Result<u64, MfaError>;
}

/// Outbound email dispatch. `Ok(false)` means the provider rejected the
/// message; transport failures surface as `Err`.
pub trait EmailSink: Send + Sync {
    async fn send(&self, to_address: &str, subject: &str, body: &str) -> Result<bool, MfaError>;
}

/// Outbound SMS dispatch.
pub trait SmsSink: Send + Sync {
    async fn send(&self, to_number: &str, body: &str) -> Result<bool, MfaError>;
}
