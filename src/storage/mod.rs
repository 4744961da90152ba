//! Settings and credential storage.
//!
//! This module provides the storage layer for courier, including:
//!
//! - The [`SettingsStore`] key-value abstraction the account registry persists through
//! - [`EncryptedFileStore`], an AES-256-GCM sealed JSON document on disk
//! - OS keychain integration holding the store's encryption key

mod encrypted;
mod keychain;
mod store;

pub use encrypted::{EncryptedFileStore, KEY_LEN};
pub use keychain::{KeychainAccess, KeychainError};
pub use store::{MemoryStore, SettingsStore};

use thiserror::Error;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Encryption error: {0}")]
    Encryption(String),

    #[error(transparent)]
    Keychain(#[from] KeychainError),

    #[error("Failed to spawn blocking task: {0}")]
    TaskFailed(String),
}

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;
