use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// MFA service configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct MfaConfig {
    /// AES-256-GCM key for encrypting TOTP secrets at rest.
    pub encryption_key: [u8; 32],
    /// HMAC secret for signing recovery tokens.
    pub signing_secret: String,
    /// Issuer name embedded in otpauth provisioning URIs.
    pub issuer: String,
}

impl MfaConfig {
    /// Load configuration from the environment.
    ///
    /// `MFA_ENCRYPTION_KEY` (base64, 32 bytes) and `MFA_SIGNING_SECRET` are
    /// required. Missing keys are a startup failure unless `MFA_DEV_KEYS=1`,
    /// which generates ephemeral keys (never persisted) and warns.
    pub fn from_env() -> Self {
        let dev_keys = std::env::var("MFA_DEV_KEYS").is_ok_and(|v| v == "1");

        let encryption_key = match std::env::var("MFA_ENCRYPTION_KEY") {
            Ok(encoded) => decode_key(&encoded).expect("MFA_ENCRYPTION_KEY must be base64 of 32 bytes"),
            Err(_) if dev_keys => {
                tracing::warn!("MFA_ENCRYPTION_KEY missing, generated ephemeral dev key");
                generate_key()
            }
            Err(_) => panic!("MFA_ENCRYPTION_KEY"),
        };

        let signing_secret = match std::env::var("MFA_SIGNING_SECRET") {
            Ok(secret) => secret,
            Err(_) if dev_keys => {
                tracing::warn!("MFA_SIGNING_SECRET missing, generated ephemeral dev secret");
                STANDARD.encode(generate_key())
            }
            Err(_) => panic!("MFA_SIGNING_SECRET"),
        };

        Self {
            encryption_key,
            signing_secret,
            issuer: std::env::var("MFA_ISSUER").unwrap_or_else(|_| "Boardroom".to_owned()),
        }
    }
}

fn decode_key(encoded: &str) -> Option<[u8; 32]> {
    let bytes = STANDARD.decode(encoded).ok()?;
    bytes.try_into().ok()
}

/// Generate a random 32-byte key from the OS CSPRNG.
pub fn generate_key() -> [u8; 32] {
    use aes_gcm::aead::OsRng;
    use aes_gcm::aead::rand_core::RngCore;

    let mut key = [0u8; 32];
    OsRng.fill_bytes(&mut key);
    key
}
