//! Gmail API provider implementation.
//!
//! This module provides an [`EmailProvider`] implementation using the Gmail REST API.
//!
//! # Authentication
//!
//! Gmail uses the OAuth 2.0 authorization-code flow. [`GmailProvider::authorization_url`]
//! starts the flow; the boundary passes the returned code back through
//! [`GmailConfig::authorization_code`]. After the first exchange the refresh token is kept
//! in the provider's configuration so later sessions resume without user interaction.
//!
//! # API Usage
//!
//! This provider uses the Gmail API v1:
//! - `users.getProfile` to verify the session
//! - `users.messages.list` / `users.messages.get` for message summaries
//! - `users.messages.send` for sending emails

use async_trait::async_trait;
use base64::prelude::*;
use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use oauth2::basic::{BasicClient, BasicTokenResponse};
use oauth2::reqwest::async_http_client;
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, RedirectUrl, RefreshToken,
    RequestTokenError, Scope, TokenResponse, TokenUrl,
};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde::{Deserialize, Serialize};

use super::mime::build_message;
use super::{AccountProfile, EmailProvider, ProviderError, Result};
use crate::domain::{
    sort_most_recent_first, GmailConfig, MessageSummary, OutgoingMessage, ProviderConfig,
    ProviderType,
};

/// OAuth scopes requested for Gmail accounts.
pub const GMAIL_SCOPES: [&str; 3] = [
    "https://www.googleapis.com/auth/gmail.readonly",
    "https://www.googleapis.com/auth/gmail.send",
    "https://www.googleapis.com/auth/gmail.modify",
];

/// Default number of messages fetched per page.
const DEFAULT_PAGE_SIZE: u32 = 100;

/// Google endpoints used by the provider.
///
/// Overridable so tests can point the provider at a local server.
#[derive(Debug, Clone)]
pub struct GmailEndpoints {
    /// Base URL of the Gmail API for the authenticated user.
    pub api_base: String,
    /// OAuth consent screen URL.
    pub auth_url: String,
    /// OAuth token exchange URL.
    pub token_url: String,
    /// OAuth token revocation URL.
    pub revoke_url: String,
}

impl Default for GmailEndpoints {
    fn default() -> Self {
        Self {
            api_base: "https://gmail.googleapis.com/gmail/v1/users/me".to_string(),
            auth_url: "https://accounts.google.com/o/oauth2/v2/auth".to_string(),
            token_url: "https://oauth2.googleapis.com/token".to_string(),
            revoke_url: "https://oauth2.googleapis.com/revoke".to_string(),
        }
    }
}

impl GmailEndpoints {
    /// Points every endpoint at one base URL.
    pub fn with_base(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            api_base: format!("{}/gmail/v1/users/me", base),
            auth_url: format!("{}/o/oauth2/v2/auth", base),
            token_url: format!("{}/token", base),
            revoke_url: format!("{}/revoke", base),
        }
    }
}

/// Gmail API profile response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProfileResponse {
    email_address: String,
}

/// Gmail API message list response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessageListResponse {
    messages: Option<Vec<MessageRef>>,
}

/// Gmail API message reference.
#[derive(Debug, Deserialize)]
struct MessageRef {
    id: String,
}

/// Gmail API message in metadata format.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GmailMessage {
    id: String,
    thread_id: Option<String>,
    label_ids: Option<Vec<String>>,
    snippet: Option<String>,
    payload: Option<GmailMessagePayload>,
    internal_date: Option<String>,
}

/// Gmail message payload (headers only in metadata format).
#[derive(Debug, Deserialize)]
struct GmailMessagePayload {
    headers: Option<Vec<GmailHeader>>,
}

/// Gmail message header.
#[derive(Debug, Deserialize)]
struct GmailHeader {
    name: String,
    value: String,
}

#[derive(Serialize)]
struct SendRequest {
    raw: String,
}

#[derive(Deserialize)]
struct SendResponse {
    id: String,
}

/// Gmail API provider.
///
/// Implements [`EmailProvider`] using the Gmail REST API with OAuth 2.0 authentication.
///
/// # Example
///
/// ```ignore
/// use courier::domain::GmailConfig;
/// use courier::providers::email::{EmailProvider, GmailProvider};
///
/// let config = GmailConfig::new(client_id, client_secret, redirect_uri).authorization_code(code);
/// let mut provider = GmailProvider::new(config);
/// let profile = provider.connect().await?;
/// let messages = provider.fetch_messages().await?;
/// ```
pub struct GmailProvider {
    config: GmailConfig,
    endpoints: GmailEndpoints,
    client: reqwest::Client,
    page_size: u32,
    /// Current OAuth access token.
    access_token: Option<String>,
    /// Mailbox address learned from the profile endpoint.
    email: Option<String>,
}

impl GmailProvider {
    /// Creates an unconnected Gmail provider.
    pub fn new(config: GmailConfig) -> Self {
        Self::with_endpoints(config, GmailEndpoints::default())
    }

    /// Creates an unconnected Gmail provider talking to custom endpoints.
    pub fn with_endpoints(config: GmailConfig, endpoints: GmailEndpoints) -> Self {
        Self {
            config,
            endpoints,
            client: reqwest::Client::new(),
            page_size: DEFAULT_PAGE_SIZE,
            access_token: None,
            email: None,
        }
    }

    /// Sets the number of messages fetched per page.
    pub fn page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    /// Builds the consent screen URL that begins the authorization-code flow.
    ///
    /// Returns the URL and the CSRF state the redirect must echo back.
    pub fn authorization_url(&self) -> Result<(url::Url, CsrfToken)> {
        let client = self.oauth_client()?;
        let (url, state) = client
            .authorize_url(CsrfToken::new_random)
            .add_scopes(GMAIL_SCOPES.iter().map(|s| Scope::new(s.to_string())))
            .add_extra_param("access_type", "offline")
            .add_extra_param("prompt", "consent")
            .url();
        Ok((url, state))
    }

    fn oauth_client(&self) -> Result<BasicClient> {
        let auth_url = AuthUrl::new(self.endpoints.auth_url.clone())
            .map_err(|e| ProviderError::InvalidConfig(format!("invalid auth URL: {}", e)))?;
        let token_url = TokenUrl::new(self.endpoints.token_url.clone())
            .map_err(|e| ProviderError::InvalidConfig(format!("invalid token URL: {}", e)))?;
        let redirect_url = RedirectUrl::new(self.config.redirect_uri.clone())
            .map_err(|e| ProviderError::InvalidConfig(format!("invalid redirect URI: {}", e)))?;

        Ok(BasicClient::new(
            ClientId::new(self.config.client_id.clone()),
            Some(ClientSecret::new(self.config.client_secret.clone())),
            auth_url,
            Some(token_url),
        )
        .set_redirect_uri(redirect_url))
    }

    /// Obtains an access token, resuming from the refresh token when possible.
    async fn obtain_token(&mut self) -> Result<BasicTokenResponse> {
        let client = self.oauth_client()?;

        let response = if let Some(refresh_token) = &self.config.refresh_token {
            client
                .exchange_refresh_token(&RefreshToken::new(refresh_token.clone()))
                .request_async(async_http_client)
                .await
        } else if let Some(code) = self.config.authorization_code.take() {
            client
                .exchange_code(AuthorizationCode::new(code))
                .request_async(async_http_client)
                .await
        } else {
            let (url, _) = self.authorization_url()?;
            return Err(ProviderError::Authentication(format!(
                "authorization required, visit {}",
                url
            )));
        };

        response.map_err(|e| match e {
            RequestTokenError::Request(err) => ProviderError::Connection(err.to_string()),
            RequestTokenError::ServerResponse(err) => {
                ProviderError::Authentication(format!("token exchange rejected: {}", err))
            }
            other => ProviderError::Authentication(format!("token exchange failed: {}", other)),
        })
    }

    /// Builds authorization headers for API requests.
    fn auth_headers(&self) -> Result<HeaderMap> {
        let token = self
            .access_token
            .as_ref()
            .ok_or_else(|| ProviderError::Authentication("not connected".to_string()))?;

        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|e| ProviderError::Internal(format!("invalid header: {}", e)))?,
        );
        Ok(headers)
    }

    /// Makes an authenticated GET request to the Gmail API.
    async fn get<T: for<'de> Deserialize<'de>>(&self, endpoint: &str) -> Result<T> {
        let url = format!("{}{}", self.endpoints.api_base, endpoint);
        let headers = self.auth_headers()?;

        let response = self
            .client
            .get(&url)
            .headers(headers)
            .send()
            .await
            .map_err(|e| ProviderError::Connection(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Self::handle_error(response).await);
        }

        response
            .json()
            .await
            .map_err(|e| ProviderError::Internal(format!("parse response: {}", e)))
    }

    /// Handles API error responses.
    async fn handle_error(response: reqwest::Response) -> ProviderError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        match status.as_u16() {
            401 | 403 => ProviderError::Authentication(format!("unauthorized: {}", body)),
            429 => ProviderError::RateLimited {
                retry_after_secs: None,
            },
            _ => ProviderError::Connection(format!("API error ({}): {}", status, body)),
        }
    }

    fn header<'a>(message: &'a GmailMessage, name: &str) -> Option<&'a str> {
        message
            .payload
            .as_ref()?
            .headers
            .as_ref()?
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
    }

    fn to_summary(message: GmailMessage) -> MessageSummary {
        let received_at = message
            .internal_date
            .as_deref()
            .and_then(|ms| ms.parse::<i64>().ok())
            .and_then(DateTime::<Utc>::from_timestamp_millis)
            .or_else(|| {
                Self::header(&message, "Date")
                    .and_then(|d| DateTime::parse_from_rfc2822(d).ok())
                    .map(|d| d.with_timezone(&Utc))
            });

        let is_read = !message
            .label_ids
            .as_ref()
            .is_some_and(|labels| labels.iter().any(|l| l == "UNREAD"));

        MessageSummary {
            from: Self::header(&message, "From").map(str::to_string),
            subject: Self::header(&message, "Subject").map(str::to_string),
            snippet: message.snippet.clone().unwrap_or_default(),
            received_at,
            is_read,
            id: message.id,
            thread_id: message.thread_id,
        }
    }
}

#[async_trait]
impl EmailProvider for GmailProvider {
    fn provider_type(&self) -> ProviderType {
        ProviderType::Gmail
    }

    fn config(&self) -> ProviderConfig {
        ProviderConfig::Gmail(self.config.clone())
    }

    fn is_connected(&self) -> bool {
        self.access_token.is_some()
    }

    async fn connect(&mut self) -> Result<AccountProfile> {
        let token = self.obtain_token().await?;

        if let Some(refresh_token) = token.refresh_token() {
            self.config.refresh_token = Some(refresh_token.secret().clone());
        }
        self.access_token = Some(token.access_token().secret().clone());

        let profile: ProfileResponse = match self.get("/profile").await {
            Ok(profile) => profile,
            Err(e) => {
                self.access_token = None;
                return Err(e);
            }
        };
        self.email = Some(profile.email_address.clone());

        tracing::info!(email = %profile.email_address, "Gmail provider connected");
        Ok(AccountProfile::new(profile.email_address))
    }

    async fn disconnect(&mut self) -> Result<()> {
        let token = self
            .config
            .refresh_token
            .take()
            .or_else(|| self.access_token.clone());
        self.access_token = None;
        self.email = None;

        let Some(token) = token else {
            return Ok(());
        };

        let response = self
            .client
            .post(&self.endpoints.revoke_url)
            .form(&[("token", token.as_str())])
            .send()
            .await
            .map_err(|e| ProviderError::Connection(format!("token revocation failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Self::handle_error(response).await);
        }

        tracing::info!("Gmail token revoked");
        Ok(())
    }

    async fn fetch_messages(&self) -> Result<Vec<MessageSummary>> {
        let list: MessageListResponse = self
            .get(&format!("/messages?maxResults={}", self.page_size))
            .await?;

        let refs = list.messages.unwrap_or_default();
        let messages = try_join_all(refs.iter().map(|r| async move {
            let endpoint = format!(
                "/messages/{}?format=metadata&metadataHeaders=From&metadataHeaders=Subject&metadataHeaders=Date",
                r.id
            );
            self.get::<GmailMessage>(&endpoint).await
        }))
        .await?;

        let mut summaries: Vec<MessageSummary> =
            messages.into_iter().map(Self::to_summary).collect();
        sort_most_recent_first(&mut summaries);

        tracing::debug!(count = summaries.len(), "Fetched Gmail messages");
        Ok(summaries)
    }

    async fn send_message(&self, message: &OutgoingMessage) -> Result<()> {
        let from = self
            .email
            .as_deref()
            .ok_or_else(|| ProviderError::Send("not connected".to_string()))?;
        let headers = self
            .auth_headers()
            .map_err(|e| ProviderError::Send(e.to_string()))?;

        let mime = build_message(from, message)?;
        let raw = BASE64_URL_SAFE_NO_PAD.encode(mime.formatted());

        let response = self
            .client
            .post(format!("{}/messages/send", self.endpoints.api_base))
            .headers(headers)
            .json(&SendRequest { raw })
            .send()
            .await
            .map_err(|e| ProviderError::Send(format!("Gmail unreachable: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Send(format!(
                "Gmail rejected message ({}): {}",
                status, body
            )));
        }

        let sent: SendResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Internal(format!("parse response: {}", e)))?;

        tracing::info!(message_id = %sent.id, "Email sent via Gmail API");
        Ok(())
    }
}
