pub mod codes;
pub mod recovery;
pub mod secret;
pub mod totp;
