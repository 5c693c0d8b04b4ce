//! Error types for SecureVault

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VaultError {
    #[error("baseline not found at {}", .0.display())]
    BaselineMissing(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Walk error: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("Invalid digest: {0}")]
    InvalidDigest(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl VaultError {
    pub fn is_baseline_missing(&self) -> bool {
        matches!(self, VaultError::BaselineMissing(_))
    }
}

pub type Result<T> = std::result::Result<T, VaultError>;
