//! Keychain access for secure credential storage.
//!
//! Wraps the keyring crate to provide OS-native credential storage. The
//! settings store keeps its encryption key here so the file on disk is
//! useless without the user's login keychain.

use thiserror::Error;

/// Errors that can occur during keychain operations.
#[derive(Debug, Error)]
pub enum KeychainError {
    #[error("Keychain error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("Malformed credential {0}")]
    Malformed(String),

    #[error("Failed to spawn blocking task: {0}")]
    TaskFailed(String),
}

/// Result type for keychain operations.
pub type Result<T> = std::result::Result<T, KeychainError>;

/// Provides access to the OS keychain for credential storage.
///
/// Credentials are stored using the service name as a namespace.
#[derive(Debug, Clone)]
pub struct KeychainAccess {
    service_name: String,
}

impl KeychainAccess {
    /// Default service name for courier credentials.
    pub const DEFAULT_SERVICE: &'static str = "io.courier.app";

    /// Entry holding the base64 settings store key.
    pub const STORE_KEY_ENTRY: &'static str = "settings.encryption_key";

    /// Creates a new KeychainAccess with the default service name.
    pub fn new() -> Self {
        Self {
            service_name: Self::DEFAULT_SERVICE.to_string(),
        }
    }

    /// Creates a new KeychainAccess with a custom service name.
    ///
    /// Useful for testing to avoid interfering with real credentials.
    pub fn with_service(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
        }
    }

    /// Stores a credential in the keychain.
    ///
    /// If a credential with the same key already exists, it is overwritten.
    pub async fn store(&self, key: &str, value: &str) -> Result<()> {
        let service = self.service_name.clone();
        let key = key.to_string();
        let value = value.to_string();

        tokio::task::spawn_blocking(move || {
            let entry = keyring::Entry::new(&service, &key)?;
            entry.set_password(&value)?;
            Ok(())
        })
        .await
        .map_err(|e| KeychainError::TaskFailed(e.to_string()))?
    }

    /// Retrieves a credential from the keychain.
    ///
    /// Returns `None` if no credential exists for the key.
    pub async fn retrieve(&self, key: &str) -> Result<Option<String>> {
        let service = self.service_name.clone();
        let key = key.to_string();

        tokio::task::spawn_blocking(move || {
            let entry = keyring::Entry::new(&service, &key)?;
            match entry.get_password() {
                Ok(password) => Ok(Some(password)),
                Err(keyring::Error::NoEntry) => Ok(None),
                Err(e) => Err(KeychainError::Keyring(e)),
            }
        })
        .await
        .map_err(|e| KeychainError::TaskFailed(e.to_string()))?
    }

    /// Returns the service name used for this keychain access.
    pub fn service_name(&self) -> &str {
        &self.service_name
    }
}

impl Default for KeychainAccess {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_service_name() {
        let keychain = KeychainAccess::new();
        assert_eq!(keychain.service_name(), "io.courier.app");
    }

    #[test]
    fn custom_service_name() {
        let keychain = KeychainAccess::with_service("test.service");
        assert_eq!(keychain.service_name(), "test.service");
    }

    // Tests that hit the real keychain need OS-level permissions.
    // Run with: cargo test --features keychain-integration-tests -- --ignored
    #[cfg(feature = "keychain-integration-tests")]
    mod integration {
        use super::*;

        #[tokio::test]
        #[ignore = "requires OS keychain access"]
        async fn store_overwrite_retrieve_cycle() {
            let keychain = KeychainAccess::with_service("io.courier.test");
            let key = "test-credential";

            keychain.store(key, "test-secret-value").await.unwrap();
            assert_eq!(
                keychain.retrieve(key).await.unwrap(),
                Some("test-secret-value".to_string())
            );

            keychain.store(key, "replacement").await.unwrap();
            assert_eq!(
                keychain.retrieve(key).await.unwrap(),
                Some("replacement".to_string())
            );
        }
    }
}
