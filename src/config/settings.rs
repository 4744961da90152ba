//! Application settings and configuration types.
//!
//! Settings are persisted to `~/.config/courier/settings.json` (or the
//! platform equivalent) and loaded at application startup.

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while loading or saving settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid settings file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Could not determine the user's config directory")]
    NoConfigDir,
}

/// Result type for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

fn project_dirs() -> Result<ProjectDirs> {
    ProjectDirs::from("io", "courier", "courier").ok_or(ConfigError::NoConfigDir)
}

/// Top-level application settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Where and how account data is stored.
    pub storage: StorageSettings,
    /// Account registry policies.
    pub accounts: AccountSettings,
    /// Provider adapter defaults.
    pub providers: ProviderSettings,
}

impl Settings {
    /// Returns the default settings file path.
    pub fn default_path() -> Result<PathBuf> {
        Ok(project_dirs()?.config_dir().join("settings.json"))
    }

    /// Loads settings from `path`, falling back to defaults when the file
    /// does not exist.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(raw) => Ok(serde_json::from_str(&raw)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No settings file, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Writes settings to `path` as pretty JSON, creating parent directories.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

/// Account storage configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Encrypted accounts file. `None` means the platform data directory.
    pub path: Option<PathBuf>,
    /// Keychain service holding the store key.
    pub keychain_service: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            path: None,
            keychain_service: "io.courier.app".to_string(),
        }
    }
}

impl StorageSettings {
    /// Resolves the accounts file path.
    pub fn resolved_path(&self) -> Result<PathBuf> {
        match &self.path {
            Some(path) => Ok(path.clone()),
            None => Ok(project_dirs()?.data_dir().join("accounts.enc")),
        }
    }
}

/// What to do when an account with the same type and email is added again.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Keep both records.
    #[default]
    Allow,
    /// Refuse the second record.
    Reject,
}

/// What to do when the primary account is removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrimaryPolicy {
    /// Leave the registry without a primary.
    #[default]
    Leave,
    /// Promote the oldest remaining account.
    PromoteOldest,
}

/// Account registry policies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountSettings {
    /// What to do when an added account matches an existing one.
    pub duplicate_policy: DuplicatePolicy,
    /// What to do when the primary account is removed.
    pub primary_policy: PrimaryPolicy,
}

/// Provider adapter defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    /// Messages fetched per page.
    pub fetch_page_size: u32,
    /// Redirect URI used for Gmail clients that do not set one.
    pub gmail_redirect_uri: Option<String>,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            fetch_page_size: 100,
            gmail_redirect_uri: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn default_settings_are_valid() {
        let settings = Settings::default();
        assert_eq!(settings.storage.keychain_service, "io.courier.app");
        assert_eq!(settings.accounts.duplicate_policy, DuplicatePolicy::Allow);
        assert_eq!(settings.accounts.primary_policy, PrimaryPolicy::Leave);
        assert_eq!(settings.providers.fetch_page_size, 100);
    }

    #[test]
    fn policy_serialization() {
        assert_eq!(
            serde_json::to_string(&PrimaryPolicy::PromoteOldest).unwrap(),
            "\"promote_oldest\""
        );
        assert_eq!(
            serde_json::to_string(&DuplicatePolicy::Reject).unwrap(),
            "\"reject\""
        );
    }

    #[test]
    fn partial_file_fills_defaults() {
        let settings: Settings =
            serde_json::from_str(r#"{"accounts": {"duplicate_policy": "reject"}}"#).unwrap();

        assert_eq!(settings.accounts.duplicate_policy, DuplicatePolicy::Reject);
        assert_eq!(settings.accounts.primary_policy, PrimaryPolicy::Leave);
        assert_eq!(settings.providers, ProviderSettings::default());
    }

    #[test]
    fn missing_file_loads_defaults() {
        let dir = TempDir::new().unwrap();
        let settings = Settings::load(dir.path().join("absent.json")).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn save_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config").join("settings.json");

        let mut settings = Settings::default();
        settings.storage.path = Some(dir.path().join("accounts.enc"));
        settings.providers.fetch_page_size = 25;
        settings.save(&path).unwrap();

        assert_eq!(Settings::load(&path).unwrap(), settings);
    }

    #[test]
    fn malformed_file_is_parse_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{not json").unwrap();

        assert!(matches!(Settings::load(&path), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn explicit_storage_path_wins() {
        let storage = StorageSettings {
            path: Some(PathBuf::from("/tmp/courier/accounts.enc")),
            ..StorageSettings::default()
        };
        assert_eq!(
            storage.resolved_path().unwrap(),
            PathBuf::from("/tmp/courier/accounts.enc")
        );
    }
}
