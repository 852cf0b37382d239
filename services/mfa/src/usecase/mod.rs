pub mod backup;
pub mod login;
pub mod manage;
pub mod recovery;
pub mod setup;
