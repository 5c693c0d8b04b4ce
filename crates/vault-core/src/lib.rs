//! Detection core for SecureVault.
//!
//! Everything here is synchronous and free of background tasks: exclusion rules,
//! hashing, the persisted baseline, one-shot scans, the activity log, alert types
//! and the alert channel. The monitors that run continuously live in
//! `vault-service`.

pub mod activity_log;
pub mod alert;
pub mod baseline;
pub mod detector;
pub mod error;
pub mod exclusion;
pub mod hasher;
pub mod honeypot;
pub mod paths;
pub mod settings;
pub mod window;

pub use error::{Result, VaultError};
