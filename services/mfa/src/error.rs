/// MFA service domain error variants.
#[derive(Debug, thiserror::Error)]
pub enum MfaError {
    #[error("invalid code format")]
    InvalidCodeFormat,
    #[error("invalid phone number")]
    InvalidPhoneNumber,
    #[error("invalid email address")]
    InvalidEmailAddress,
    #[error("unknown mfa method")]
    UnknownMethod,
    #[error("mfa method not found")]
    MethodNotFound,
    #[error("mfa method not enabled")]
    MethodNotEnabled,
    #[error("totp already enabled")]
    TotpAlreadyEnabled,
    #[error("mfa not enabled")]
    MfaNotEnabled,
    #[error("invalid ciphertext")]
    InvalidCiphertext,
    #[error("too many requests")]
    RateLimited,
    #[error("internal error")]
    Internal(#[from] anyhow::Error),
}

impl MfaError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidCodeFormat => "INVALID_CODE_FORMAT",
            Self::InvalidPhoneNumber => "INVALID_PHONE_NUMBER",
            Self::InvalidEmailAddress => "INVALID_EMAIL_ADDRESS",
            Self::UnknownMethod => "UNKNOWN_METHOD",
            Self::MethodNotFound => "METHOD_NOT_FOUND",
            Self::MethodNotEnabled => "METHOD_NOT_ENABLED",
            Self::TotpAlreadyEnabled => "TOTP_ALREADY_ENABLED",
            Self::MfaNotEnabled => "MFA_NOT_ENABLED",
            Self::InvalidCiphertext => "INVALID_CIPHERTEXT",
            Self::RateLimited => "RATE_LIMITED",
            Self::Internal(_) => "INTERNAL",
        }
    }
}
