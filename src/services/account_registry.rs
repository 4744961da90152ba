//! Persisted registry of configured email accounts.
//!
//! The whole collection lives under a single store key and is read and
//! written as one JSON array. Insertion order is display order.

use std::sync::Arc;

use tokio::sync::Mutex;

use super::{AccountError, AccountResult};
use crate::config::{AccountSettings, DuplicatePolicy, PrimaryPolicy};
use crate::domain::{Account, AccountId, ProviderConfig, ProviderType};
use crate::storage::{SettingsStore, StorageError};

/// Store key holding the account collection.
pub const ACCOUNTS_KEY: &str = "emailAccounts";

/// Everything needed to register an account except the fields the registry
/// assigns itself.
#[derive(Debug, Clone, PartialEq)]
pub struct AccountDraft {
    /// Mailbox address reported by the backend.
    pub email: String,
    /// Display name, if the backend reported one.
    pub name: Option<String>,
    /// Connection settings, including tokens obtained while connecting.
    pub config: ProviderConfig,
}

impl AccountDraft {
    /// Creates a draft without a display name.
    pub fn new(email: impl Into<String>, config: ProviderConfig) -> Self {
        Self {
            email: email.into(),
            name: None,
            config,
        }
    }

    /// Sets the display name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Backend type, taken from the configuration.
    pub fn provider_type(&self) -> ProviderType {
        self.config.provider_type()
    }
}

/// Ordered, persisted collection of [`Account`] records.
///
/// Every read-modify-write cycle runs under one lock, so concurrent
/// registrations cannot both become primary and no update is lost.
pub struct AccountRegistry {
    store: Arc<dyn SettingsStore>,
    settings: AccountSettings,
    write_lock: Mutex<()>,
}

impl AccountRegistry {
    /// Creates a registry with default policies.
    pub fn new(store: Arc<dyn SettingsStore>) -> Self {
        Self::with_settings(store, AccountSettings::default())
    }

    /// Creates a registry with explicit policies.
    pub fn with_settings(store: Arc<dyn SettingsStore>, settings: AccountSettings) -> Self {
        Self {
            store,
            settings,
            write_lock: Mutex::new(()),
        }
    }

    /// Registers a new account.
    ///
    /// The account is marked connected and becomes primary only if the
    /// registry was empty.
    ///
    /// # Errors
    ///
    /// Returns [`AccountError::DuplicateAccount`] under
    /// [`DuplicatePolicy::Reject`] when the type and email are already
    /// registered, or a storage error if the collection cannot be written.
    pub async fn add_account(&self, draft: AccountDraft) -> AccountResult<Account> {
        let _guard = self.write_lock.lock().await;
        let mut accounts = self.load().await?;

        let provider_type = draft.provider_type();
        if self.settings.duplicate_policy == DuplicatePolicy::Reject
            && accounts.iter().any(|a| {
                a.provider_type == provider_type && a.email.eq_ignore_ascii_case(&draft.email)
            })
        {
            return Err(AccountError::DuplicateAccount {
                provider: provider_type,
                email: draft.email,
            });
        }

        let account = Account {
            id: AccountId::generate(),
            provider_type,
            name: draft
                .name
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| Account::default_name(&draft.email)),
            email: draft.email,
            provider: provider_type.label().to_string(),
            connected: true,
            primary: accounts.is_empty(),
            config: draft.config,
        };

        accounts.push(account.clone());
        self.save(&accounts).await?;

        tracing::info!(
            account_id = %account.id,
            provider = %provider_type,
            primary = account.primary,
            "Account added"
        );
        Ok(account)
    }

    /// Removes an account by id, returning it if it was present.
    ///
    /// Removing an unknown id succeeds without touching the store.
    pub async fn remove_account(&self, id: &AccountId) -> AccountResult<Option<Account>> {
        let _guard = self.write_lock.lock().await;
        let mut accounts = self.load().await?;

        let Some(index) = accounts.iter().position(|a| &a.id == id) else {
            tracing::debug!(account_id = %id, "Account already absent");
            return Ok(None);
        };
        let removed = accounts.remove(index);

        if removed.primary && self.settings.primary_policy == PrimaryPolicy::PromoteOldest {
            if let Some(oldest) = accounts.first_mut() {
                oldest.primary = true;
                tracing::info!(account_id = %oldest.id, "Promoted account to primary");
            }
        }

        self.save(&accounts).await?;

        tracing::info!(account_id = %id, provider = %removed.provider_type, "Account removed");
        Ok(Some(removed))
    }

    /// Returns every account in insertion order.
    pub async fn list_accounts(&self) -> AccountResult<Vec<Account>> {
        self.load().await
    }

    /// Returns one account.
    pub async fn get_account(&self, id: &AccountId) -> AccountResult<Account> {
        self.load()
            .await?
            .into_iter()
            .find(|a| &a.id == id)
            .ok_or_else(|| AccountError::AccountNotFound(id.clone()))
    }

    async fn load(&self) -> AccountResult<Vec<Account>> {
        match self.store.get(ACCOUNTS_KEY).await? {
            Some(value) => Ok(serde_json::from_value(value).map_err(StorageError::from)?),
            None => Ok(Vec::new()),
        }
    }

    async fn save(&self, accounts: &[Account]) -> AccountResult<()> {
        let value = serde_json::to_value(accounts).map_err(StorageError::from)?;
        self.store.set(ACCOUNTS_KEY, value).await?;
        Ok(())
    }
}
