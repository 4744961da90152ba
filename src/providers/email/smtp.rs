//! SMTP provider implementation.
//!
//! A send-only backend built on `lettre`'s async transport. `secure` selects
//! implicit TLS (typically port 465); otherwise STARTTLS is required on the
//! configured port. Mailbox reads are not available over SMTP, so
//! [`EmailProvider::fetch_messages`] always fails with
//! [`ProviderError::UnsupportedOperation`].

use async_trait::async_trait;
use lettre::transport::smtp::authentication::Credentials as SmtpCredentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Tokio1Executor};

use super::mime::build_message;
use super::{AccountProfile, EmailProvider, ProviderError, Result};
use crate::domain::{MessageSummary, OutgoingMessage, ProviderConfig, ProviderType, SmtpConfig};

/// SMTP email provider.
///
/// # Example
///
/// ```ignore
/// use courier::domain::SmtpConfig;
/// use courier::providers::email::{EmailProvider, SmtpProvider};
///
/// let mut provider = SmtpProvider::new(SmtpConfig::new("smtp.example.com", "me@example.com", "secret"));
/// let profile = provider.connect().await?;
/// assert_eq!(profile.email, "me@example.com");
/// ```
pub struct SmtpProvider {
    config: SmtpConfig,
    transport: Option<AsyncSmtpTransport<Tokio1Executor>>,
}

impl SmtpProvider {
    /// Creates an unconnected provider.
    pub fn new(config: SmtpConfig) -> Self {
        Self {
            config,
            transport: None,
        }
    }

    fn build_transport(&self) -> Result<AsyncSmtpTransport<Tokio1Executor>> {
        if self.config.host.is_empty() {
            return Err(ProviderError::InvalidConfig("SMTP host is empty".to_string()));
        }

        let credentials =
            SmtpCredentials::new(self.config.username.clone(), self.config.password.clone());

        let builder = if self.config.secure {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&self.config.host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.config.host)
        }
        .map_err(|e| ProviderError::Connection(format!("SMTP relay error: {}", e)))?;

        Ok(builder
            .credentials(credentials)
            .port(self.config.port)
            .build())
    }
}

#[async_trait]
impl EmailProvider for SmtpProvider {
    fn provider_type(&self) -> ProviderType {
        ProviderType::Smtp
    }

    fn config(&self) -> ProviderConfig {
        ProviderConfig::Smtp(self.config.clone())
    }

    fn is_connected(&self) -> bool {
        self.transport.is_some()
    }

    async fn connect(&mut self) -> Result<AccountProfile> {
        let transport = self.build_transport()?;

        match transport.test_connection().await {
            Ok(true) => {}
            Ok(false) => {
                return Err(ProviderError::Connection(format!(
                    "SMTP server {}:{} did not accept the connection",
                    self.config.host, self.config.port
                )))
            }
            Err(e) if e.is_permanent() => {
                return Err(ProviderError::Authentication(format!(
                    "SMTP login rejected: {}",
                    e
                )))
            }
            Err(e) => {
                return Err(ProviderError::Connection(format!(
                    "SMTP verify failed: {}",
                    e
                )))
            }
        }

        self.transport = Some(transport);
        tracing::info!(host = %self.config.host, port = self.config.port, "SMTP provider connected");

        Ok(AccountProfile::new(self.config.username.clone()))
    }

    async fn disconnect(&mut self) -> Result<()> {
        if self.transport.take().is_some() {
            tracing::debug!(host = %self.config.host, "SMTP transport released");
        }
        Ok(())
    }

    async fn fetch_messages(&self) -> Result<Vec<MessageSummary>> {
        Err(ProviderError::UnsupportedOperation {
            provider: ProviderType::Smtp,
            operation: "fetch_messages",
        })
    }

    async fn send_message(&self, message: &OutgoingMessage) -> Result<()> {
        let transport = self
            .transport
            .as_ref()
            .ok_or_else(|| ProviderError::Send("not connected".to_string()))?;

        let email = build_message(&self.config.username, message)?;

        let response = transport
            .send(email)
            .await
            .map_err(|e| ProviderError::Send(format!("SMTP send failed: {}", e)))?;

        tracing::info!(code = %response.code(), "Email sent via SMTP");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn unreachable_config() -> SmtpConfig {
        SmtpConfig::new("localhost", "me@example.com", "secret")
            .port(1)
            .secure(false)
    }

    #[tokio::test]
    async fn fetch_is_unsupported() {
        let provider = SmtpProvider::new(unreachable_config());
        let result = provider.fetch_messages().await;

        assert!(matches!(
            result,
            Err(ProviderError::UnsupportedOperation {
                provider: ProviderType::Smtp,
                operation: "fetch_messages"
            })
        ));
    }

    #[tokio::test]
    async fn unreachable_host_is_connection_error() {
        let mut provider = SmtpProvider::new(unreachable_config());
        let result = provider.connect().await;

        assert!(matches!(result, Err(ProviderError::Connection(_))));
        assert!(!provider.is_connected());
    }

    #[tokio::test]
    async fn empty_host_is_invalid_config() {
        let mut provider = SmtpProvider::new(SmtpConfig::new("", "me@example.com", "secret"));
        let result = provider.connect().await;
        assert!(matches!(result, Err(ProviderError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn send_without_connect_fails() {
        let provider = SmtpProvider::new(unreachable_config());
        let result = provider
            .send_message(&OutgoingMessage::new("you@example.com", "Hi", "Body"))
            .await;
        assert!(matches!(result, Err(ProviderError::Send(_))));
    }

    #[tokio::test]
    async fn disconnect_without_session_is_noop() {
        let mut provider = SmtpProvider::new(unreachable_config());
        provider.disconnect().await.unwrap();
        provider.disconnect().await.unwrap();
        assert!(!provider.is_connected());
    }

    #[test]
    fn config_round_trips() {
        let provider = SmtpProvider::new(unreachable_config());
        assert_eq!(provider.provider_type(), ProviderType::Smtp);
        assert_eq!(provider.config(), ProviderConfig::Smtp(unreachable_config()));
    }
}
