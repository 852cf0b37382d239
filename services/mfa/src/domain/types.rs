use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An enrolled second factor. At most one record exists per
/// (user, method type); `upsert` in the store is keyed on that pair.
#[derive(Debug, Clone)]
pub struct MfaMethod {
    pub id: Uuid,
    pub user_id: Uuid,
    pub method_type: MethodType,
    /// SecretCodec ciphertext of the Base32 TOTP secret (totp only).
    pub totp_secret: Option<String>,
    pub phone_number: Option<String>,
    pub email_address: Option<String>,
    pub is_enabled: bool,
    pub is_verified: bool,
    pub last_used: Option<DateTime<Utc>>,
    /// Time step of the last accepted TOTP code, for replay rejection.
    pub last_used_step: Option<u64>,
    pub created_at: DateTime<Utc>,
}

impl MfaMethod {
    pub fn new(user_id: Uuid, method_type: MethodType) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            method_type,
            totp_secret: None,
            phone_number: None,
            email_address: None,
            is_enabled: false,
            is_verified: false,
            last_used: None,
            last_used_step: None,
            created_at: Utc::now(),
        }
    }

    /// A method participates in login only once enabled and verified.
    pub fn is_usable(&self) -> bool {
        self.is_enabled && self.is_verified
    }

    /// Destination a login challenge is dispatched to (sms/email only).
    pub fn destination(&self) -> Option<&str> {
        match self.method_type {
            MethodType::Sms => self.phone_number.as_deref(),
            MethodType::Email => self.email_address.as_deref(),
            MethodType::Totp => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MethodType {
    Totp,
    Sms,
    Email,
}

impl MethodType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Totp => "totp",
            Self::Sms => "sms",
            Self::Email => "email",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "totp" => Some(Self::Totp),
            "sms" => Some(Self::Sms),
            "email" => Some(Self::Email),
            _ => None,
        }
    }
}

/// Single-use recovery credential. Only the hash is stored; the plaintext
/// batch is shown to the user exactly once at generation time.
#[derive(Debug, Clone)]
pub struct BackupCode {
    pub id: Uuid,
    pub user_id: Uuid,
    pub code_hash: String,
    pub is_used: bool,
    pub used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Ephemeral record of an issued sms/email code awaiting confirmation.
/// Creating a new one for the same (user, method) replaces the previous.
#[derive(Debug, Clone)]
pub struct PendingVerification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub method_type: MethodType,
    pub code_hash: String,
    /// Phone number or email address the code was dispatched to.
    pub contact_info: String,
    pub attempts: u32,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl PendingVerification {
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }

    pub fn attempts_exhausted(&self) -> bool {
        self.attempts >= MAX_CODE_ATTEMPTS
    }
}

/// Append-only audit row for one verification try. Never mutated.
#[derive(Debug, Clone)]
pub struct VerificationAttempt {
    pub id: Uuid,
    pub user_id: Uuid,
    /// Method type string, or "backup_code" / "recovery".
    pub method: String,
    pub success: bool,
    pub failure_reason: Option<FailureReason>,
    pub ip_address: String,
    pub user_agent: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl VerificationAttempt {
    pub fn record(
        user_id: Uuid,
        method: &str,
        outcome: Result<(), FailureReason>,
        ctx: &RequestContext,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            method: method.to_owned(),
            success: outcome.is_ok(),
            failure_reason: outcome.err(),
            ip_address: ctx.ip_address.clone(),
            user_agent: ctx.user_agent.clone(),
            timestamp: Utc::now(),
        }
    }
}

/// Server-side state backing a signed recovery token. The signature alone
/// is not sufficient: the record enforces single use after verification.
#[derive(Debug, Clone)]
pub struct RecoveryToken {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    pub is_used: bool,
    pub expires_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
    pub ip_address: String,
    pub created_at: DateTime<Utc>,
}

/// Caller context threaded into every verification for the attempt log.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub ip_address: String,
    pub user_agent: Option<String>,
}

/// Why a verification was rejected. Recorded internally; callers only see
/// the generic verified/rejected outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    InvalidTotp,
    InvalidCode,
    InvalidBackupCode,
    ExpiredOrNotFound,
    MaxAttemptsReached,
    MethodNotEnabled,
    RateLimited,
    VerificationError,
}

impl FailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidTotp => "invalid_totp",
            Self::InvalidCode => "invalid_code",
            Self::InvalidBackupCode => "invalid_backup_code",
            Self::ExpiredOrNotFound => "expired_or_not_found",
            Self::MaxAttemptsReached => "max_attempts_reached",
            Self::MethodNotEnabled => "method_not_enabled",
            Self::RateLimited => "rate_limited",
            Self::VerificationError => "verification_error",
        }
    }
}

/// Mask an email address for user-facing summaries.
pub fn mask_email(email: &str) -> String {
    let Some((local, domain)) = email.split_once('@') else {
        return email.to_owned();
    };
    let masked_local = if local.chars().count() <= 2 {
        "*".repeat(local.chars().count())
    } else {
        let first = local.chars().next().unwrap();
        let last = local.chars().next_back().unwrap();
        format!("{first}{}{last}", "*".repeat(local.chars().count() - 2))
    };
    format!("{masked_local}@{domain}")
}

/// Mask a phone number to its last four digits.
pub fn mask_phone(phone: &str) -> String {
    let tail: String = phone
        .chars()
        .rev()
        .take(4)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    format!("***{tail}")
}

/// Number of backup codes in a batch.
pub const BACKUP_CODE_COUNT: usize = 10;

/// One-time code length in digits.
pub const CODE_LEN: usize = 6;

/// One-time code time-to-live.
pub const CODE_TTL_MINUTES: i64 = 10;

/// Maximum verification attempts per pending code.
pub const MAX_CODE_ATTEMPTS: u32 = 5;

/// Recovery token time-to-live in hours.
pub const RECOVERY_TOKEN_TTL_HOURS: i64 = 24;

/// Attempts allowed per (subject, action) inside the rate-limit window.
pub const RATE_LIMIT_MAX_ATTEMPTS: u64 = 5;

/// Trailing rate-limit window in minutes.
pub const RATE_LIMIT_WINDOW_MINUTES: i64 = 15;

/// How many audit rows `ListAttempts` returns.
pub const ATTEMPT_HISTORY_LIMIT: u64 = 20;
