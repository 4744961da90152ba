//! Email provider trait definition.
//!
//! This module defines the [`EmailProvider`] trait which abstracts over the
//! supported backends (Gmail API, Microsoft Graph, SMTP), and the
//! [`ProviderFactory`] that picks an implementation for a configuration.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::{MessageSummary, OutgoingMessage, ProviderConfig, ProviderType};

/// Result type alias for email provider operations.
pub type Result<T> = std::result::Result<T, ProviderError>;

/// Errors that can occur during email provider operations.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// Credentials or tokens were rejected by the backend.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// Network or host failure.
    #[error("connection error: {0}")]
    Connection(String),

    /// The backend rejected a send attempt.
    #[error("send failed: {0}")]
    Send(String),

    /// The backend does not offer this capability.
    #[error("{provider} does not support {operation}")]
    UnsupportedOperation {
        /// Backend that lacks the capability.
        provider: ProviderType,
        /// Name of the unsupported operation.
        operation: &'static str,
    },

    /// Rate limit exceeded.
    #[error("rate limit exceeded, retry after {retry_after_secs:?} seconds")]
    RateLimited {
        /// Seconds to wait before retrying, if known.
        retry_after_secs: Option<u64>,
    },

    /// The provider configuration is unusable.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// What a successful connect learned about the mailbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountProfile {
    /// Mailbox address.
    pub email: String,
    /// Display name reported by the backend, if any.
    pub name: Option<String>,
}

impl AccountProfile {
    /// Creates a profile without a display name.
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            name: None,
        }
    }
}

/// Trait for email provider implementations.
///
/// Each implementation owns its backend session for its lifetime. Callers
/// impose their own timeouts; no method retries.
#[async_trait]
pub trait EmailProvider: Send + Sync {
    /// Returns the type of this provider.
    fn provider_type(&self) -> ProviderType;

    /// Returns the current configuration, including any tokens obtained
    /// while connecting.
    fn config(&self) -> ProviderConfig;

    /// Returns whether the session is established.
    fn is_connected(&self) -> bool;

    /// Establishes or validates the backend session.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Authentication`] if credentials are rejected and
    /// [`ProviderError::Connection`] if the backend cannot be reached.
    async fn connect(&mut self) -> Result<AccountProfile>;

    /// Releases or revokes the session.
    ///
    /// Calling this on a disconnected provider succeeds without contacting
    /// the backend.
    async fn disconnect(&mut self) -> Result<()>;

    /// Fetches one page of message summaries, most recent first.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::UnsupportedOperation`] for send-only backends.
    async fn fetch_messages(&self) -> Result<Vec<MessageSummary>>;

    /// Submits a message to the backend.
    ///
    /// # Errors
    ///
    /// Every failure is reported as [`ProviderError::Send`] carrying the
    /// reason, including an unconnected provider or an expired session.
    async fn send_message(&self, message: &OutgoingMessage) -> Result<()>;
}

/// Builds provider instances from configuration.
pub trait ProviderFactory: Send + Sync {
    /// Creates an unconnected provider for the given configuration.
    fn create(&self, config: ProviderConfig) -> Result<Box<dyn EmailProvider>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_display() {
        let auth_err = ProviderError::Authentication("token expired".to_string());
        assert_eq!(auth_err.to_string(), "authentication failed: token expired");

        let unsupported = ProviderError::UnsupportedOperation {
            provider: ProviderType::Smtp,
            operation: "fetch_messages",
        };
        assert_eq!(unsupported.to_string(), "smtp does not support fetch_messages");

        let rate_err = ProviderError::RateLimited {
            retry_after_secs: Some(60),
        };
        assert!(rate_err.to_string().contains("rate limit"));
    }

    #[test]
    fn account_profile_serialization() {
        let profile = AccountProfile {
            email: "a@x.com".to_string(),
            name: Some("Alice".to_string()),
        };

        let json = serde_json::to_string(&profile).unwrap();
        let deserialized: AccountProfile = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, profile);
    }
}
