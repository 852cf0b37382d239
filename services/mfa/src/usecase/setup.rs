use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::crypto::codes::{generate_numeric_code, hash_code, matches_hash};
use crate::crypto::secret::SecretCodec;
use crate::crypto::totp;
use crate::domain::repository::{
    AttemptCounter, AttemptLog, BackupCodeStore, EmailSink, MethodStore, PendingStore, SmsSink,
};
use crate::domain::types::{
    CODE_LEN, CODE_TTL_MINUTES, FailureReason, MethodType, MfaMethod, PendingVerification,
    RequestContext, VerificationAttempt, mask_email, mask_phone,
};
use crate::error::MfaError;
use crate::limiter::RateLimiter;
use crate::usecase::backup::issue_backup_batch_if_first;

fn is_code_shaped(code: &str) -> bool {
    code.len() == CODE_LEN && code.bytes().all(|b| b.is_ascii_digit())
}

// ── SetupTotp ────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct SetupTotpOutput {
    /// Base32 secret, returned for initial setup only.
    pub secret: String,
    pub provisioning_uri: String,
    /// PNG data URL for the authenticator-app QR scan.
    pub qr_code: String,
}

pub struct SetupTotpUseCase<M>
where
    M: MethodStore,
{
    pub methods: M,
    pub codec: SecretCodec,
    pub issuer: String,
}

impl<M> SetupTotpUseCase<M>
where
    M: MethodStore,
{
    /// Provision a fresh TOTP secret for the user. The method stays
    /// disabled and unverified until a live code confirms it.
    pub async fn execute(&self, user_id: Uuid, label: &str) -> Result<SetupTotpOutput, MfaError> {
        let existing = self.methods.find(user_id, MethodType::Totp).await?;
        if existing.as_ref().is_some_and(|m| m.is_enabled) {
            return Err(MfaError::TotpAlreadyEnabled);
        }

        let enrollment = totp::generate_enrollment(&self.issuer, label)?;

        // Re-running setup overwrites a never-confirmed secret.
        let mut method =
            existing.unwrap_or_else(|| MfaMethod::new(user_id, MethodType::Totp));
        method.totp_secret = Some(self.codec.encrypt(&enrollment.secret)?);
        method.is_verified = false;
        method.is_enabled = false;
        method.last_used_step = None;
        self.methods.upsert(&method).await?;

        Ok(SetupTotpOutput {
            secret: enrollment.secret,
            provisioning_uri: enrollment.provisioning_uri,
            qr_code: enrollment.qr_code,
        })
    }
}

// ── ConfirmTotp ──────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct ConfirmTotpOutput {
    pub enabled: bool,
    pub failure_reason: Option<FailureReason>,
    /// Present when this confirmation enabled the user's first method.
    pub backup_codes: Option<Vec<String>>,
}

pub struct ConfirmTotpUseCase<M, B, A, C>
where
    M: MethodStore,
    B: BackupCodeStore,
    A: AttemptLog,
    C: AttemptCounter,
{
    pub methods: M,
    pub backup_codes: B,
    pub attempts: A,
    pub limiter: RateLimiter<C>,
    pub codec: SecretCodec,
}

impl<M, B, A, C> ConfirmTotpUseCase<M, B, A, C>
where
    M: MethodStore,
    B: BackupCodeStore,
    A: AttemptLog,
    C: AttemptCounter,
{
    /// Confirm a provisioned TOTP secret with a live code. Success flips
    /// the method to enabled+verified and issues the first backup batch.
    pub async fn execute(
        &self,
        user_id: Uuid,
        code: &str,
        ctx: &RequestContext,
    ) -> Result<ConfirmTotpOutput, MfaError> {
        let code = code.trim();
        if !is_code_shaped(code) {
            return Err(MfaError::InvalidCodeFormat);
        }

        let Some(mut method) = self.methods.find(user_id, MethodType::Totp).await? else {
            return Err(MfaError::MethodNotFound);
        };
        let Some(encrypted) = method.totp_secret.clone() else {
            return Err(MfaError::MethodNotFound);
        };

        if self.limiter.is_rate_limited(user_id, "totp_verify").await? {
            return Err(MfaError::RateLimited);
        }

        let outcome = match self.codec.decrypt(&encrypted) {
            Ok(secret) => {
                match totp::matching_step(&secret, code, totp::DEFAULT_WINDOW, now_unix()) {
                    Some(step) => Ok(step),
                    None => Err(FailureReason::InvalidTotp),
                }
            }
            Err(e) => {
                tracing::error!(error = %e, %user_id, "totp secret unreadable during confirmation");
                Err(FailureReason::VerificationError)
            }
        };

        let attempt = VerificationAttempt::record(
            user_id,
            MethodType::Totp.as_str(),
            outcome.as_ref().map(|_| ()).map_err(|r| *r),
            ctx,
        );
        self.attempts.record(&attempt).await?;

        let step = match outcome {
            Ok(step) => step,
            Err(reason) => {
                return Ok(ConfirmTotpOutput {
                    enabled: false,
                    failure_reason: Some(reason),
                    backup_codes: None,
                });
            }
        };

        let first_method = self.methods.list_enabled(user_id).await?.is_empty();
        method.is_verified = true;
        method.is_enabled = true;
        method.last_used = Some(Utc::now());
        method.last_used_step = Some(step);
        self.methods.upsert(&method).await?;

        let backup_codes =
            issue_backup_batch_if_first(user_id, first_method, &self.backup_codes).await?;

        Ok(ConfirmTotpOutput {
            enabled: true,
            failure_reason: None,
            backup_codes,
        })
    }
}

// ── RequestCode ──────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct RequestCodeOutput {
    pub sent: bool,
    /// Masked destination for the "code sent to ..." UI hint.
    pub masked_destination: Option<String>,
}

pub struct RequestCodeUseCase<M, P, C, E, S>
where
    M: MethodStore,
    P: PendingStore,
    C: AttemptCounter,
    E: EmailSink,
    S: SmsSink,
{
    pub methods: M,
    pub pending: P,
    pub limiter: RateLimiter<C>,
    pub email: E,
    pub sms: S,
}

impl<M, P, C, E, S> RequestCodeUseCase<M, P, C, E, S>
where
    M: MethodStore,
    P: PendingStore,
    C: AttemptCounter,
    E: EmailSink,
    S: SmsSink,
{
    /// Issue a one-time code over sms/email. With an explicit destination
    /// this starts enrollment of that contact method; without one the code
    /// goes to the already-enrolled destination (login challenge).
    ///
    /// A pending record is only written after the sink accepts the
    /// dispatch; a failed send leaves no state behind.
    pub async fn execute(
        &self,
        user_id: Uuid,
        method_type: MethodType,
        destination: Option<String>,
    ) -> Result<RequestCodeOutput, MfaError> {
        if method_type == MethodType::Totp {
            return Err(MfaError::UnknownMethod);
        }

        let destination = match destination {
            Some(dest) => {
                let dest = dest.trim().to_owned();
                validate_destination(method_type, &dest)?;
                dest
            }
            None => {
                let method = self
                    .methods
                    .find(user_id, method_type)
                    .await?
                    .ok_or(MfaError::MethodNotFound)?;
                if !method.is_usable() {
                    return Err(MfaError::MethodNotEnabled);
                }
                method
                    .destination()
                    .ok_or(MfaError::MethodNotEnabled)?
                    .to_owned()
            }
        };

        let action = format!("{}_send", method_type.as_str());
        if self.limiter.is_rate_limited(user_id, &action).await? {
            return Err(MfaError::RateLimited);
        }

        let code = generate_numeric_code();
        let sent = self.dispatch(method_type, &destination, &code).await;
        if !sent {
            tracing::warn!(%user_id, method = method_type.as_str(), "code dispatch failed");
            return Ok(RequestCodeOutput {
                sent: false,
                masked_destination: None,
            });
        }

        let pending = PendingVerification {
            id: Uuid::new_v4(),
            user_id,
            method_type,
            code_hash: hash_code(&code),
            contact_info: destination.clone(),
            attempts: 0,
            expires_at: Utc::now() + Duration::minutes(CODE_TTL_MINUTES),
            created_at: Utc::now(),
        };
        self.pending.replace(&pending).await?;

        let masked = match method_type {
            MethodType::Sms => mask_phone(&destination),
            _ => mask_email(&destination),
        };
        Ok(RequestCodeOutput {
            sent: true,
            masked_destination: Some(masked),
        })
    }

    async fn dispatch(&self, method_type: MethodType, destination: &str, code: &str) -> bool {
        let result = match method_type {
            MethodType::Sms => {
                let body =
                    format!("Your Boardroom verification code is: {code}. Valid for 10 minutes.");
                self.sms.send(destination, &body).await
            }
            _ => {
                let body = format!(
                    "Your verification code is: {code}\n\n\
                     This code will expire in 10 minutes.\n\n\
                     If you didn't request this code, please ignore this email."
                );
                self.email
                    .send(destination, "Boardroom verification code", &body)
                    .await
            }
        };
        match result {
            Ok(sent) => sent,
            Err(e) => {
                tracing::error!(error = %e, method = method_type.as_str(), "dispatch sink error");
                false
            }
        }
    }
}

fn validate_destination(method_type: MethodType, destination: &str) -> Result<(), MfaError> {
    match method_type {
        MethodType::Sms => {
            // International format, e.g. +15551234567.
            if !destination.starts_with('+') || destination.len() < 10 {
                return Err(MfaError::InvalidPhoneNumber);
            }
        }
        MethodType::Email => {
            if !destination.contains('@') {
                return Err(MfaError::InvalidEmailAddress);
            }
        }
        MethodType::Totp => return Err(MfaError::UnknownMethod),
    }
    Ok(())
}

// ── ConfirmContact ───────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct ConfirmContactOutput {
    pub enabled: bool,
    pub failure_reason: Option<FailureReason>,
    /// Present when this confirmation enabled the user's first method.
    pub backup_codes: Option<Vec<String>>,
}

pub struct ConfirmContactUseCase<M, P, B, A>
where
    M: MethodStore,
    P: PendingStore,
    B: BackupCodeStore,
    A: AttemptLog,
{
    pub methods: M,
    pub pending: P,
    pub backup_codes: B,
    pub attempts: A,
}

impl<M, P, B, A> ConfirmContactUseCase<M, P, B, A>
where
    M: MethodStore,
    P: PendingStore,
    B: BackupCodeStore,
    A: AttemptLog,
{
    /// Confirm an sms/email enrollment code and enable the method for the
    /// destination the code was dispatched to.
    pub async fn execute(
        &self,
        user_id: Uuid,
        method_type: MethodType,
        code: &str,
        ctx: &RequestContext,
    ) -> Result<ConfirmContactOutput, MfaError> {
        if method_type == MethodType::Totp {
            return Err(MfaError::UnknownMethod);
        }
        let code = code.trim();
        if !is_code_shaped(code) {
            return Err(MfaError::InvalidCodeFormat);
        }

        let outcome = self.check_pending(user_id, method_type, code).await?;

        let attempt = VerificationAttempt::record(
            user_id,
            method_type.as_str(),
            outcome.as_ref().map(|_| ()).map_err(|r| *r),
            ctx,
        );
        self.attempts.record(&attempt).await?;

        let contact_info = match outcome {
            Ok(contact_info) => contact_info,
            Err(reason) => {
                return Ok(ConfirmContactOutput {
                    enabled: false,
                    failure_reason: Some(reason),
                    backup_codes: None,
                });
            }
        };

        let first_method = self.methods.list_enabled(user_id).await?.is_empty();

        let mut method = self
            .methods
            .find(user_id, method_type)
            .await?
            .unwrap_or_else(|| MfaMethod::new(user_id, method_type));
        match method_type {
            MethodType::Sms => method.phone_number = Some(contact_info),
            _ => method.email_address = Some(contact_info),
        }
        method.is_verified = true;
        method.is_enabled = true;
        method.last_used = Some(Utc::now());
        self.methods.upsert(&method).await?;

        let backup_codes =
            issue_backup_batch_if_first(user_id, first_method, &self.backup_codes).await?;

        Ok(ConfirmContactOutput {
            enabled: true,
            failure_reason: None,
            backup_codes,
        })
    }

    /// Returns the verified destination on success.
    async fn check_pending(
        &self,
        user_id: Uuid,
        method_type: MethodType,
        code: &str,
    ) -> Result<Result<String, FailureReason>, MfaError> {
        let Some(pending) = self.pending.find_latest(user_id, method_type).await? else {
            return Ok(Err(FailureReason::ExpiredOrNotFound));
        };
        if pending.is_expired() {
            return Ok(Err(FailureReason::ExpiredOrNotFound));
        }
        if pending.attempts_exhausted() {
            return Ok(Err(FailureReason::MaxAttemptsReached));
        }

        let matched = matches_hash(code, &pending.code_hash);
        self.pending.increment_attempts(pending.id).await?;

        if !matched {
            return Ok(Err(FailureReason::InvalidCode));
        }
        // First consumer wins; a raced delete means someone else already
        // verified this code.
        if !self.pending.delete(pending.id).await? {
            return Ok(Err(FailureReason::ExpiredOrNotFound));
        }
        Ok(Ok(pending.contact_info))
    }
}

fn now_unix() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before UNIX epoch")
        .as_secs()
}
