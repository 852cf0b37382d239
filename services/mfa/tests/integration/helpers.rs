#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use boardroom_mfa::crypto::secret::SecretCodec;
use boardroom_mfa::domain::repository::{
    AttemptCounter, AttemptLog, BackupCodeStore, EmailSink, MethodStore, PendingStore,
    RecoveryTokenStore, SmsSink,
};
use boardroom_mfa::domain::types::{
    BackupCode, MethodType, MfaMethod, PendingVerification, RecoveryToken, RequestContext,
    VerificationAttempt,
};
use boardroom_mfa::error::MfaError;

pub const TEST_ENCRYPTION_KEY: [u8; 32] = [7u8; 32];
pub const TEST_SIGNING_SECRET: &str = "test-signing-secret-for-tests-only";

pub fn test_codec() -> SecretCodec {
    SecretCodec::new(&TEST_ENCRYPTION_KEY)
}

pub fn test_ctx() -> RequestContext {
    RequestContext {
        ip_address: "203.0.113.7".to_owned(),
        user_agent: Some("integration-tests".to_owned()),
    }
}

/// Compute the code an authenticator app would show right now.
pub fn totp_code_now(secret_b32: &str) -> String {
    let bytes = totp_rs::Secret::Encoded(secret_b32.to_owned())
        .to_bytes()
        .unwrap();
    totp_rs::TOTP::new(
        totp_rs::Algorithm::SHA1,
        6,
        1,
        30,
        bytes,
        Some("test".to_owned()),
        "test".to_owned(),
    )
    .unwrap()
    .generate_current()
    .unwrap()
}

/// Every code the verifier would currently accept (previous, current and
/// next step).
pub fn totp_codes_in_window(secret_b32: &str) -> Vec<String> {
    let bytes = totp_rs::Secret::Encoded(secret_b32.to_owned())
        .to_bytes()
        .unwrap();
    let totp = totp_rs::TOTP::new(
        totp_rs::Algorithm::SHA1,
        6,
        1,
        30,
        bytes,
        Some("test".to_owned()),
        "test".to_owned(),
    )
    .unwrap();
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_secs();
    [now - 30, now, now + 30]
        .iter()
        .map(|t| totp.generate(*t))
        .collect()
}

/// A well-formed six-digit code guaranteed not to verify right now.
pub fn wrong_totp_code(secret_b32: &str) -> String {
    let live = totp_codes_in_window(secret_b32);
    ["000000", "111111", "222222", "333333"]
        .iter()
        .find(|c| !live.contains(&(*c).to_string()))
        .unwrap()
        .to_string()
}

/// Pull the six-digit code out of a dispatched message body.
pub fn extract_code(body: &str) -> String {
    body.chars().filter(|c| c.is_ascii_digit()).take(6).collect()
}

/// An enabled, verified TOTP method with an encrypted copy of `secret_b32`.
pub fn enabled_totp_method(user_id: Uuid, secret_b32: &str) -> MfaMethod {
    let mut method = MfaMethod::new(user_id, MethodType::Totp);
    method.totp_secret = Some(test_codec().encrypt(secret_b32).unwrap());
    method.is_enabled = true;
    method.is_verified = true;
    method
}

pub fn enabled_contact_method(user_id: Uuid, method_type: MethodType, dest: &str) -> MfaMethod {
    let mut method = MfaMethod::new(user_id, method_type);
    match method_type {
        MethodType::Sms => method.phone_number = Some(dest.to_owned()),
        _ => method.email_address = Some(dest.to_owned()),
    }
    method.is_enabled = true;
    method.is_verified = true;
    method
}

// ── InMemoryMethodStore ──────────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct InMemoryMethodStore {
    pub methods: Arc<Mutex<Vec<MfaMethod>>>,
}

impl InMemoryMethodStore {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with(methods: Vec<MfaMethod>) -> Self {
        Self {
            methods: Arc::new(Mutex::new(methods)),
        }
    }

    pub fn get(&self, user_id: Uuid, method_type: MethodType) -> Option<MfaMethod> {
        self.methods
            .lock()
            .unwrap()
            .iter()
            .find(|m| m.user_id == user_id && m.method_type == method_type)
            .cloned()
    }
}

impl MethodStore for InMemoryMethodStore {
    async fn find(
        &self,
        user_id: Uuid,
        method_type: MethodType,
    ) -> Result<Option<MfaMethod>, MfaError> {
        Ok(self.get(user_id, method_type))
    }

    async fn list_enabled(&self, user_id: Uuid) -> Result<Vec<MfaMethod>, MfaError> {
        Ok(self
            .methods
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.user_id == user_id && m.is_enabled)
            .cloned()
            .collect())
    }

    async fn upsert(&self, method: &MfaMethod) -> Result<(), MfaError> {
        let mut methods = self.methods.lock().unwrap();
        methods.retain(|m| !(m.user_id == method.user_id && m.method_type == method.method_type));
        methods.push(method.clone());
        Ok(())
    }

    async fn set_enabled(&self, id: Uuid, enabled: bool) -> Result<(), MfaError> {
        let mut methods = self.methods.lock().unwrap();
        if let Some(m) = methods.iter_mut().find(|m| m.id == id) {
            m.is_enabled = enabled;
        }
        Ok(())
    }

    async fn mark_used(
        &self,
        id: Uuid,
        at: DateTime<Utc>,
        step: Option<u64>,
    ) -> Result<(), MfaError> {
        let mut methods = self.methods.lock().unwrap();
        if let Some(m) = methods.iter_mut().find(|m| m.id == id) {
            m.last_used = Some(at);
            if step.is_some() {
                m.last_used_step = step;
            }
        }
        Ok(())
    }
}

// ── InMemoryBackupCodeStore ──────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct InMemoryBackupCodeStore {
    pub codes: Arc<Mutex<Vec<BackupCode>>>,
}

impl InMemoryBackupCodeStore {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn all(&self) -> Vec<BackupCode> {
        self.codes.lock().unwrap().clone()
    }
}

impl BackupCodeStore for InMemoryBackupCodeStore {
    async fn list_unused(&self, user_id: Uuid) -> Result<Vec<BackupCode>, MfaError> {
        Ok(self
            .codes
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.user_id == user_id && !c.is_used)
            .cloned()
            .collect())
    }

    async fn insert_batch(&self, batch: &[BackupCode]) -> Result<(), MfaError> {
        self.codes.lock().unwrap().extend_from_slice(batch);
        Ok(())
    }

    async fn mark_used(&self, id: Uuid) -> Result<bool, MfaError> {
        let mut codes = self.codes.lock().unwrap();
        match codes.iter_mut().find(|c| c.id == id) {
            Some(code) if !code.is_used => {
                code.is_used = true;
                code.used_at = Some(Utc::now());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn mark_all_used(&self, user_id: Uuid) -> Result<(), MfaError> {
        let now = Utc::now();
        for code in self.codes.lock().unwrap().iter_mut() {
            if code.user_id == user_id && !code.is_used {
                code.is_used = true;
                code.used_at = Some(now);
            }
        }
        Ok(())
    }
}

// ── InMemoryPendingStore ─────────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct InMemoryPendingStore {
    pub records: Arc<Mutex<Vec<PendingVerification>>>,
}

impl InMemoryPendingStore {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with(records: Vec<PendingVerification>) -> Self {
        Self {
            records: Arc::new(Mutex::new(records)),
        }
    }

    pub fn get(&self, user_id: Uuid, method_type: MethodType) -> Option<PendingVerification> {
        self.records
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.user_id == user_id && p.method_type == method_type)
            .max_by_key(|p| p.created_at)
            .cloned()
    }
}

impl PendingStore for InMemoryPendingStore {
    async fn find_latest(
        &self,
        user_id: Uuid,
        method_type: MethodType,
    ) -> Result<Option<PendingVerification>, MfaError> {
        Ok(self.get(user_id, method_type))
    }

    async fn replace(&self, pending: &PendingVerification) -> Result<(), MfaError> {
        let mut records = self.records.lock().unwrap();
        records.retain(|p| {
            !(p.user_id == pending.user_id && p.method_type == pending.method_type)
        });
        records.push(pending.clone());
        Ok(())
    }

    async fn increment_attempts(&self, id: Uuid) -> Result<(), MfaError> {
        let mut records = self.records.lock().unwrap();
        if let Some(p) = records.iter_mut().find(|p| p.id == id) {
            p.attempts += 1;
        }
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<bool, MfaError> {
        let mut records = self.records.lock().unwrap();
        let before = records.len();
        records.retain(|p| p.id != id);
        Ok(records.len() < before)
    }
}

// ── InMemoryAttemptLog ───────────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct InMemoryAttemptLog {
    pub attempts: Arc<Mutex<Vec<VerificationAttempt>>>,
}

impl InMemoryAttemptLog {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn all(&self) -> Vec<VerificationAttempt> {
        self.attempts.lock().unwrap().clone()
    }
}

impl AttemptLog for InMemoryAttemptLog {
    async fn record(&self, attempt: &VerificationAttempt) -> Result<(), MfaError> {
        self.attempts.lock().unwrap().push(attempt.clone());
        Ok(())
    }

    async fn recent(
        &self,
        user_id: Uuid,
        limit: u64,
    ) -> Result<Vec<VerificationAttempt>, MfaError> {
        let attempts = self.attempts.lock().unwrap();
        Ok(attempts
            .iter()
            .filter(|a| a.user_id == user_id)
            .rev()
            .take(limit as usize)
            .cloned()
            .collect())
    }
}

// ── InMemoryRecoveryTokenStore ───────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct InMemoryRecoveryTokenStore {
    pub tokens: Arc<Mutex<Vec<RecoveryToken>>>,
}

impl InMemoryRecoveryTokenStore {
    pub fn empty() -> Self {
        Self::default()
    }
}

impl RecoveryTokenStore for InMemoryRecoveryTokenStore {
    async fn insert(&self, token: &RecoveryToken) -> Result<(), MfaError> {
        self.tokens.lock().unwrap().push(token.clone());
        Ok(())
    }

    async fn find_active(
        &self,
        user_id: Uuid,
        token_hash: &str,
    ) -> Result<Option<RecoveryToken>, MfaError> {
        Ok(self
            .tokens
            .lock()
            .unwrap()
            .iter()
            .find(|t| {
                t.user_id == user_id
                    && t.token_hash == token_hash
                    && !t.is_used
                    && t.expires_at > Utc::now()
            })
            .cloned())
    }

    async fn mark_used(&self, id: Uuid) -> Result<(), MfaError> {
        let mut tokens = self.tokens.lock().unwrap();
        if let Some(t) = tokens.iter_mut().find(|t| t.id == id) {
            t.is_used = true;
            t.used_at = Some(Utc::now());
        }
        Ok(())
    }
}

// ── InMemoryCounter ──────────────────────────────────────────────────────────

/// Sliding-window counter with the same record-and-count contract as the
/// Redis implementation, for single-process tests.
#[derive(Clone, Default)]
pub struct InMemoryCounter {
    pub entries: Arc<Mutex<HashMap<String, Vec<DateTime<Utc>>>>>,
}

impl InMemoryCounter {
    pub fn empty() -> Self {
        Self::default()
    }
}

impl AttemptCounter for InMemoryCounter {
    async fn record_and_count(&self, key: &str, window: Duration) -> Result<u64, MfaError> {
        let now = Utc::now();
        let cutoff = now - window;
        let mut entries = self.entries.lock().unwrap();
        let timestamps = entries.entry(key.to_owned()).or_default();
        timestamps.retain(|t| *t > cutoff);
        timestamps.push(now);
        Ok(timestamps.len() as u64)
    }
}

// ── Mock dispatch sinks ──────────────────────────────────────────────────────

#[derive(Clone)]
pub struct MockEmailSink {
    pub sent: Arc<Mutex<Vec<(String, String, String)>>>,
    pub succeed: bool,
}

impl MockEmailSink {
    pub fn working() -> Self {
        Self {
            sent: Arc::new(Mutex::new(vec![])),
            succeed: true,
        }
    }

    pub fn failing() -> Self {
        Self {
            sent: Arc::new(Mutex::new(vec![])),
            succeed: false,
        }
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

impl EmailSink for MockEmailSink {
    async fn send(&self, to_address: &str, subject: &str, body: &str) -> Result<bool, MfaError> {
        if self.succeed {
            self.sent.lock().unwrap().push((
                to_address.to_owned(),
                subject.to_owned(),
                body.to_owned(),
            ));
        }
        Ok(self.succeed)
    }
}

#[derive(Clone)]
pub struct MockSmsSink {
    pub sent: Arc<Mutex<Vec<(String, String)>>>,
    pub succeed: bool,
}

impl MockSmsSink {
    pub fn working() -> Self {
        Self {
            sent: Arc::new(Mutex::new(vec![])),
            succeed: true,
        }
    }

    pub fn failing() -> Self {
        Self {
            sent: Arc::new(Mutex::new(vec![])),
            succeed: false,
        }
    }
}

impl SmsSink for MockSmsSink {
    async fn send(&self, to_number: &str, body: &str) -> Result<bool, MfaError> {
        if self.succeed {
            self.sent
                .lock()
                .unwrap()
                .push((to_number.to_owned(), body.to_owned()));
        }
        Ok(self.succeed)
    }
}
