//! Account domain types.
//!
//! Represents configured mailbox identities and the backend-specific
//! configuration needed to rebuild their provider adapters.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::AccountId;

/// A configured mailbox identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    /// Unique identifier for this account.
    pub id: AccountId,
    /// Backend this account talks to. Fixed at creation.
    #[serde(rename = "type")]
    pub provider_type: ProviderType,
    /// Mailbox address.
    pub email: String,
    /// Display name shown in the UI.
    pub name: String,
    /// Human-readable backend label, e.g. "SMTP".
    pub provider: String,
    /// Whether the adapter verified reachability and credentials.
    pub connected: bool,
    /// Whether this is the default account.
    pub primary: bool,
    /// Backend configuration used to rebuild the adapter on demand.
    pub config: ProviderConfig,
}

impl Account {
    /// Returns the display name to fall back to when a backend supplies none.
    pub fn default_name(email: &str) -> String {
        email.split('@').next().unwrap_or(email).to_string()
    }
}

/// Type of email provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderType {
    /// Gmail REST API with OAuth 2.0.
    Gmail,
    /// Microsoft Graph with a bearer token.
    Outlook,
    /// Raw SMTP transport (send only).
    Smtp,
}

impl ProviderType {
    /// Returns the lowercase tag used on the wire and in configuration.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gmail => "gmail",
            Self::Outlook => "outlook",
            Self::Smtp => "smtp",
        }
    }

    /// Returns the human-readable backend label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Gmail => "Gmail",
            Self::Outlook => "Outlook",
            Self::Smtp => "SMTP",
        }
    }

    /// Returns whether the backend can read mail.
    ///
    /// SMTP is a send-only transport.
    pub fn supports_fetch(&self) -> bool {
        !matches!(self, Self::Smtp)
    }
}

impl fmt::Display for ProviderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown provider tag.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported provider type: {0}")]
pub struct UnknownProviderType(pub String);

impl FromStr for ProviderType {
    type Err = UnknownProviderType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "gmail" => Ok(Self::Gmail),
            "outlook" => Ok(Self::Outlook),
            "smtp" => Ok(Self::Smtp),
            other => Err(UnknownProviderType(other.to_string())),
        }
    }
}

/// Provider-specific configuration.
///
/// Persisted only inside the encrypted settings store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProviderConfig {
    /// Gmail OAuth client configuration.
    Gmail(GmailConfig),
    /// Microsoft Graph configuration.
    Outlook(OutlookConfig),
    /// SMTP server configuration.
    Smtp(SmtpConfig),
}

impl ProviderConfig {
    /// Returns the provider type this configuration belongs to.
    pub fn provider_type(&self) -> ProviderType {
        match self {
            Self::Gmail(_) => ProviderType::Gmail,
            Self::Outlook(_) => ProviderType::Outlook,
            Self::Smtp(_) => ProviderType::Smtp,
        }
    }
}

/// OAuth client configuration for Gmail.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct GmailConfig {
    /// OAuth client ID.
    pub client_id: String,
    /// OAuth client secret.
    pub client_secret: String,
    /// Redirect URI registered for the client.
    pub redirect_uri: String,
    /// Authorization code returned by the consent screen. Consumed by connect.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorization_code: Option<String>,
    /// Long-lived refresh token used to resume the session.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

impl GmailConfig {
    /// Creates a configuration for a client that has not been authorized yet.
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            redirect_uri: redirect_uri.into(),
            authorization_code: None,
            refresh_token: None,
        }
    }

    /// Sets the authorization code obtained from the consent redirect.
    pub fn authorization_code(mut self, code: impl Into<String>) -> Self {
        self.authorization_code = Some(code.into());
        self
    }

    /// Sets a refresh token from a previous session.
    pub fn refresh_token(mut self, token: impl Into<String>) -> Self {
        self.refresh_token = Some(token.into());
        self
    }
}

impl fmt::Debug for GmailConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GmailConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("redirect_uri", &self.redirect_uri)
            .field("authorization_code", &self.authorization_code.as_ref().map(|_| "<redacted>"))
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Microsoft Graph configuration.
///
/// The bearer token is obtained by the application boundary.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct OutlookConfig {
    /// OAuth bearer token for Microsoft Graph.
    pub access_token: String,
}

impl OutlookConfig {
    /// Creates a configuration from a bearer token.
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
        }
    }
}

impl fmt::Debug for OutlookConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutlookConfig")
            .field("access_token", &"<redacted>")
            .finish()
    }
}

/// SMTP server configuration.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct SmtpConfig {
    /// SMTP server hostname.
    pub host: String,
    /// SMTP server port.
    #[serde(default = "SmtpConfig::default_port")]
    pub port: u16,
    /// Username, usually the mailbox address.
    pub username: String,
    /// Password or app-specific password.
    pub password: String,
    /// Implicit TLS (true) or STARTTLS (false).
    #[serde(default = "SmtpConfig::default_secure")]
    pub secure: bool,
}

impl SmtpConfig {
    /// Creates a configuration using the submission port with TLS.
    pub fn new(
        host: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port: Self::default_port(),
            username: username.into(),
            password: password.into(),
            secure: Self::default_secure(),
        }
    }

    /// Sets the server port.
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets whether to use implicit TLS.
    pub fn secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    fn default_port() -> u16 {
        587
    }

    fn default_secure() -> bool {
        true
    }
}

impl fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("secure", &self.secure)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn smtp_account() -> Account {
        Account {
            id: AccountId::from("account-1"),
            provider_type: ProviderType::Smtp,
            email: "b@x.com".to_string(),
            name: "b".to_string(),
            provider: "SMTP".to_string(),
            connected: true,
            primary: false,
            config: ProviderConfig::Smtp(SmtpConfig::new("smtp.x.com", "b@x.com", "secret")),
        }
    }

    #[test]
    fn account_serialization() {
        let account = smtp_account();

        let json = serde_json::to_string(&account).unwrap();
        assert!(json.contains("\"type\":\"smtp\""));

        let deserialized: Account = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, account);
    }

    #[test]
    fn provider_type_parsing() {
        assert_eq!("gmail".parse::<ProviderType>(), Ok(ProviderType::Gmail));
        assert_eq!("outlook".parse::<ProviderType>(), Ok(ProviderType::Outlook));
        assert_eq!("smtp".parse::<ProviderType>(), Ok(ProviderType::Smtp));

        let err = "carrierpigeon".parse::<ProviderType>().unwrap_err();
        assert_eq!(err.0, "carrierpigeon");
    }

    #[test]
    fn provider_type_labels() {
        assert_eq!(ProviderType::Smtp.label(), "SMTP");
        assert_eq!(ProviderType::Gmail.to_string(), "gmail");
        assert!(!ProviderType::Smtp.supports_fetch());
        assert!(ProviderType::Outlook.supports_fetch());
    }

    #[test]
    fn smtp_config_defaults_when_missing() {
        let json = r#"{"type":"smtp","host":"smtp.x.com","username":"u","password":"p"}"#;
        let config: ProviderConfig = serde_json::from_str(json).unwrap();

        if let ProviderConfig::Smtp(smtp) = config {
            assert_eq!(smtp.port, 587);
            assert!(smtp.secure);
        } else {
            panic!("Expected Smtp config");
        }
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let gmail = GmailConfig::new("client", "top-secret", "http://localhost")
            .refresh_token("refresh-secret");
        let debug = format!("{:?}", gmail);
        assert!(!debug.contains("top-secret"));
        assert!(!debug.contains("refresh-secret"));

        let debug = format!("{:?}", smtp_account());
        assert!(!debug.contains("secret"));
    }

    #[test]
    fn default_name_uses_local_part() {
        assert_eq!(Account::default_name("alice@example.com"), "alice");
        assert_eq!(Account::default_name("no-at-sign"), "no-at-sign");
    }
}
