//! Provider manager facade.
//!
//! The single entry point the application boundary uses to connect
//! accounts, send and fetch mail, and disconnect. It picks an adapter through
//! the [`ProviderFactory`], keeps one live adapter per account and records
//! accounts in the [`AccountRegistry`].

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};

use super::{AccountDraft, AccountError, AccountRegistry, AccountResult};
use crate::domain::{
    Account, AccountId, MessageSummary, OutgoingMessage, ProviderConfig, ProviderType,
};
use crate::providers::email::{EmailProvider, ProviderError, ProviderFactory};

type SharedProvider = Arc<Mutex<Box<dyn EmailProvider>>>;

/// Facade over the registry and the provider adapters.
pub struct ProviderManager {
    registry: Arc<AccountRegistry>,
    factory: Arc<dyn ProviderFactory>,
    sessions: Mutex<HashMap<AccountId, SharedProvider>>,
    /// Held for writing by disconnects so no session is rebuilt for an
    /// account that is being removed.
    lifecycle: RwLock<()>,
}

impl ProviderManager {
    /// Creates a manager over an existing registry.
    pub fn new(registry: Arc<AccountRegistry>, factory: Arc<dyn ProviderFactory>) -> Self {
        Self {
            registry,
            factory,
            sessions: Mutex::new(HashMap::new()),
            lifecycle: RwLock::new(()),
        }
    }

    /// Connects a new account of the given kind and registers it.
    ///
    /// `kind` is the provider tag (`"gmail"`, `"outlook"` or `"smtp"`). The
    /// stored configuration is the adapter's configuration after connecting,
    /// so tokens obtained during the handshake are kept.
    ///
    /// # Errors
    ///
    /// - [`AccountError::UnsupportedProvider`] for unknown kinds; nothing is
    ///   built and the registry is untouched.
    /// - [`AccountError::InvalidConfig`] if `config` belongs to another kind.
    /// - [`AccountError::Provider`] if the backend rejects the connection.
    pub async fn connect_provider(
        &self,
        kind: &str,
        config: ProviderConfig,
    ) -> AccountResult<Account> {
        let provider_type: ProviderType = kind
            .parse()
            .map_err(|_| AccountError::UnsupportedProvider(kind.to_string()))?;

        if config.provider_type() != provider_type {
            return Err(AccountError::InvalidConfig(format!(
                "{} configuration supplied for {} account",
                config.provider_type(),
                provider_type
            )));
        }

        let mut provider = self.factory.create(config)?;
        let profile = match provider.connect().await {
            Ok(profile) => profile,
            Err(e) => {
                tracing::warn!(provider = %provider_type, error = %e, "Connect failed");
                return Err(e.into());
            }
        };

        let draft = AccountDraft {
            email: profile.email,
            name: profile.name,
            config: provider.config(),
        };

        match self.registry.add_account(draft).await {
            Ok(account) => {
                self.sessions
                    .lock()
                    .await
                    .insert(account.id.clone(), Arc::new(Mutex::new(provider)));
                tracing::info!(account_id = %account.id, provider = %provider_type, "Provider connected");
                Ok(account)
            }
            Err(e) => {
                // The grant may be shared with an already registered account,
                // so the session is dropped without revoking it.
                drop(provider);
                tracing::warn!(provider = %provider_type, error = %e, "Registration failed");
                Err(e)
            }
        }
    }

    /// Disconnects an account and removes it from the registry.
    ///
    /// Backend failures while revoking are logged and ignored; the account
    /// is removed regardless. Unknown ids succeed.
    ///
    /// # Errors
    ///
    /// Only storage failures are returned.
    pub async fn disconnect_account(&self, id: &AccountId) -> AccountResult<()> {
        let _lifecycle = self.lifecycle.write().await;
        let live = self.sessions.lock().await.remove(id);

        let provider = match live {
            Some(provider) => Some(provider),
            None => self.rebuild_for_disconnect(id).await?,
        };

        if let Some(provider) = provider {
            let mut provider = provider.lock().await;
            if let Err(e) = provider.disconnect().await {
                tracing::warn!(account_id = %id, error = %e, "Disconnect failed, removing account anyway");
            }
        }

        if self.registry.remove_account(id).await?.is_some() {
            tracing::info!(account_id = %id, "Account disconnected");
        }
        Ok(())
    }

    /// Returns every registered account in display order.
    pub async fn list_accounts(&self) -> AccountResult<Vec<Account>> {
        self.registry.list_accounts().await
    }

    /// Sends a message through an account.
    ///
    /// Uses the live adapter, or rebuilds and connects one from the stored
    /// configuration. Every backend failure, including a rejected session,
    /// is reported as [`ProviderError::Send`].
    pub async fn send_message(
        &self,
        id: &AccountId,
        message: &OutgoingMessage,
    ) -> AccountResult<()> {
        let (account, provider) = {
            let _lifecycle = self.lifecycle.read().await;
            let account = self.registry.get_account(id).await?;
            let provider = self.session_for(&account).await.map_err(|e| match e {
                AccountError::Provider(err) if !matches!(err, ProviderError::Send(_)) => {
                    AccountError::Provider(ProviderError::Send(format!(
                        "could not open session: {}",
                        err
                    )))
                }
                other => other,
            })?;
            (account, provider)
        };

        let provider = provider.lock().await;
        provider.send_message(message).await?;

        tracing::info!(account_id = %id, provider = %account.provider_type, "Message sent");
        Ok(())
    }

    /// Fetches the most recent messages of an account.
    ///
    /// Send-only accounts fail with [`ProviderError::UnsupportedOperation`]
    /// without contacting their backend.
    pub async fn fetch_messages(&self, id: &AccountId) -> AccountResult<Vec<MessageSummary>> {
        let provider = {
            let _lifecycle = self.lifecycle.read().await;
            let account = self.registry.get_account(id).await?;
            if !account.provider_type.supports_fetch() {
                return Err(ProviderError::UnsupportedOperation {
                    provider: account.provider_type,
                    operation: "fetch_messages",
                }
                .into());
            }
            self.session_for(&account).await?
        };
        let messages = provider.lock().await.fetch_messages().await?;

        tracing::debug!(account_id = %id, count = messages.len(), "Fetched messages");
        Ok(messages)
    }

    /// Callers hold the lifecycle read guard.
    async fn session_for(&self, account: &Account) -> AccountResult<SharedProvider> {
        if let Some(provider) = self.sessions.lock().await.get(&account.id) {
            return Ok(provider.clone());
        }

        let mut provider = self.factory.create(account.config.clone())?;
        provider.connect().await?;
        tracing::debug!(account_id = %account.id, "Rebuilt provider session");

        let mut sessions = self.sessions.lock().await;
        let shared = sessions
            .entry(account.id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(provider)));
        Ok(shared.clone())
    }

    async fn rebuild_for_disconnect(&self, id: &AccountId) -> AccountResult<Option<SharedProvider>> {
        let account = match self.registry.get_account(id).await {
            Ok(account) => account,
            Err(AccountError::AccountNotFound(_)) => return Ok(None),
            Err(e) => return Err(e),
        };

        match self.factory.create(account.config) {
            Ok(provider) => Ok(Some(Arc::new(Mutex::new(provider)))),
            Err(e) => {
                tracing::warn!(account_id = %id, error = %e, "Could not rebuild provider for disconnect");
                Ok(None)
            }
        }
    }
}
