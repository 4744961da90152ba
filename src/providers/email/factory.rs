//! Default [`ProviderFactory`] building the real backends.

use super::gmail::{GmailEndpoints, GmailProvider};
use super::outlook::OutlookProvider;
use super::smtp::SmtpProvider;
use super::{EmailProvider, ProviderError, ProviderFactory, Result};
use crate::config::ProviderSettings;
use crate::domain::ProviderConfig;

/// Builds Gmail, Outlook and SMTP providers from their configuration.
#[derive(Debug, Clone)]
pub struct DefaultProviderFactory {
    page_size: u32,
    gmail_redirect_uri: Option<String>,
    gmail_endpoints: GmailEndpoints,
    graph_base_url: Option<String>,
}

impl Default for DefaultProviderFactory {
    fn default() -> Self {
        Self::from_settings(&ProviderSettings::default())
    }
}

impl DefaultProviderFactory {
    /// Creates a factory using the given provider settings.
    pub fn from_settings(settings: &ProviderSettings) -> Self {
        Self {
            page_size: settings.fetch_page_size,
            gmail_redirect_uri: settings.gmail_redirect_uri.clone(),
            gmail_endpoints: GmailEndpoints::default(),
            graph_base_url: None,
        }
    }

    /// Overrides the Google endpoints (used against local test servers).
    pub fn gmail_endpoints(mut self, endpoints: GmailEndpoints) -> Self {
        self.gmail_endpoints = endpoints;
        self
    }

    /// Overrides the Microsoft Graph base URL.
    pub fn graph_base_url(mut self, url: impl Into<String>) -> Self {
        self.graph_base_url = Some(url.into());
        self
    }
}

impl ProviderFactory for DefaultProviderFactory {
    fn create(&self, config: ProviderConfig) -> Result<Box<dyn EmailProvider>> {
        match config {
            ProviderConfig::Gmail(mut gmail) => {
                if gmail.client_id.is_empty() {
                    return Err(ProviderError::InvalidConfig(
                        "Gmail client_id is required".to_string(),
                    ));
                }
                if gmail.redirect_uri.is_empty() {
                    gmail.redirect_uri = self.gmail_redirect_uri.clone().ok_or_else(|| {
                        ProviderError::InvalidConfig("Gmail redirect_uri is required".to_string())
                    })?;
                }
                Ok(Box::new(
                    GmailProvider::with_endpoints(gmail, self.gmail_endpoints.clone())
                        .page_size(self.page_size),
                ))
            }
            ProviderConfig::Outlook(outlook) => {
                let provider = match &self.graph_base_url {
                    Some(base) => OutlookProvider::with_base_url(outlook, base.as_str()),
                    None => OutlookProvider::new(outlook),
                };
                Ok(Box::new(provider.page_size(self.page_size)))
            }
            ProviderConfig::Smtp(smtp) => Ok(Box::new(SmtpProvider::new(smtp))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{GmailConfig, OutlookConfig, ProviderType, SmtpConfig};

    #[test]
    fn creates_matching_provider() {
        let factory = DefaultProviderFactory::default();

        let configs = [
            ProviderConfig::Gmail(GmailConfig::new("id", "secret", "http://localhost/cb")),
            ProviderConfig::Outlook(OutlookConfig::new("token")),
            ProviderConfig::Smtp(SmtpConfig::new("smtp.example.com", "me@example.com", "pw")),
        ];

        for config in configs {
            let expected = config.provider_type();
            let provider = factory.create(config).unwrap();
            assert_eq!(provider.provider_type(), expected);
            assert!(!provider.is_connected());
        }
    }

    #[test]
    fn gmail_without_client_id_is_invalid() {
        let factory = DefaultProviderFactory::default();
        let result = factory.create(ProviderConfig::Gmail(GmailConfig::new("", "s", "r")));
        assert!(matches!(result, Err(ProviderError::InvalidConfig(_))));
    }

    #[test]
    fn gmail_redirect_falls_back_to_settings() {
        let settings = ProviderSettings {
            gmail_redirect_uri: Some("http://127.0.0.1:8080/oauth".to_string()),
            ..ProviderSettings::default()
        };
        let factory = DefaultProviderFactory::from_settings(&settings);

        let provider = factory
            .create(ProviderConfig::Gmail(GmailConfig::new("id", "secret", "")))
            .unwrap();

        match provider.config() {
            ProviderConfig::Gmail(config) => {
                assert_eq!(config.redirect_uri, "http://127.0.0.1:8080/oauth")
            }
            other => panic!("unexpected config {:?}", other.provider_type()),
        }
        assert_eq!(provider.provider_type(), ProviderType::Gmail);
    }
}
