//! courier - Opens the account store and reports configured accounts

use std::sync::Arc;

use anyhow::Context;
use courier::config::Settings;
use courier::providers::email::DefaultProviderFactory;
use courier::services::{AccountRegistry, ProviderManager};
use courier::storage::{EncryptedFileStore, KeychainAccess};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    tracing::info!("Starting courier");

    let settings_path = match std::env::args_os().nth(1) {
        Some(path) => path.into(),
        None => Settings::default_path()?,
    };
    let settings = Settings::load(&settings_path)
        .with_context(|| format!("loading settings from {}", settings_path.display()))?;

    let store_path = settings.storage.resolved_path()?;
    let keychain = KeychainAccess::with_service(settings.storage.keychain_service.clone());
    let store = EncryptedFileStore::open_with_keychain(&store_path, &keychain)
        .await
        .with_context(|| format!("opening account store {}", store_path.display()))?;

    let registry = Arc::new(AccountRegistry::with_settings(
        Arc::new(store),
        settings.accounts,
    ));
    let factory = Arc::new(DefaultProviderFactory::from_settings(&settings.providers));
    let manager = ProviderManager::new(registry, factory);

    let accounts = manager.list_accounts().await?;
    tracing::info!(count = accounts.len(), "Loaded accounts");
    for account in &accounts {
        tracing::info!(
            account_id = %account.id,
            provider = %account.provider_type,
            primary = account.primary,
            "{} <{}>",
            account.name,
            account.email
        );
    }

    Ok(())
}
