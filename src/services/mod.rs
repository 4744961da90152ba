//! Business services layer.
//!
//! This module contains the services that orchestrate account management,
//! coordinating between providers, storage, and domain types.
//!
//! # Architecture
//!
//! ```text
//! Application boundary
//!          |
//!          v
//!   ProviderManager  --->  ProviderFactory ---> EmailProvider
//!          |
//!          v
//!   AccountRegistry  --->  SettingsStore
//! ```

mod account_registry;
mod provider_manager;

pub use account_registry::{AccountDraft, AccountRegistry, ACCOUNTS_KEY};
pub use provider_manager::ProviderManager;

use thiserror::Error;

use crate::domain::{AccountId, ProviderType};
use crate::providers::email::ProviderError;
use crate::storage::StorageError;

/// Errors that can occur during account operations.
#[derive(Debug, Error)]
pub enum AccountError {
    /// The requested provider kind is not one of the supported backends.
    #[error("unsupported provider: {0}")]
    UnsupportedProvider(String),

    /// No account with this id is registered.
    #[error("account not found: {0}")]
    AccountNotFound(AccountId),

    /// An account with the same provider and email already exists.
    #[error("{provider} account already exists for {email}")]
    DuplicateAccount {
        provider: ProviderType,
        email: String,
    },

    /// The configuration does not fit the requested provider.
    #[error("invalid account configuration: {0}")]
    InvalidConfig(String),

    /// The provider backend failed.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// Reading or writing the account store failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Result type for account operations.
pub type AccountResult<T> = Result<T, AccountError>;
