pub mod config;
pub mod crypto;
pub mod domain;
pub mod error;
pub mod infra;
pub mod limiter;
pub mod usecase;
