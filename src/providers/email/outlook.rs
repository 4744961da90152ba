//! Microsoft Graph provider implementation.
//!
//! Talks to Outlook / Microsoft 365 mailboxes through the Graph v1.0 REST API.
//! The bearer token is acquired by the application boundary and passed in
//! through [`OutlookConfig`]; this provider only verifies and uses it.

use async_trait::async_trait;
use base64::prelude::*;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde::{Deserialize, Serialize};

use super::{AccountProfile, EmailProvider, ProviderError, Result};
use crate::domain::{
    sort_most_recent_first, MessageSummary, OutgoingMessage, OutlookConfig, ProviderConfig,
    ProviderType,
};

const GRAPH_API_BASE: &str = "https://graph.microsoft.com/v1.0";

/// Default number of messages fetched per page.
const DEFAULT_PAGE_SIZE: u32 = 100;

const MESSAGE_SELECT_FIELDS: &str = "id,conversationId,subject,from,receivedDateTime,bodyPreview,isRead";

/// Graph `/me` response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphUser {
    display_name: Option<String>,
    mail: Option<String>,
    user_principal_name: Option<String>,
}

/// Graph message collection page.
#[derive(Debug, Deserialize)]
struct GraphMessagesPage {
    value: Vec<GraphMessage>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphMessage {
    id: String,
    conversation_id: Option<String>,
    subject: Option<String>,
    from: Option<GraphRecipient>,
    received_date_time: Option<DateTime<Utc>>,
    body_preview: Option<String>,
    is_read: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphRecipient {
    email_address: GraphEmailAddress,
}

#[derive(Debug, Serialize, Deserialize)]
struct GraphEmailAddress {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    address: Option<String>,
}

/// `POST /me/sendMail` request body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SendMailRequest {
    message: GraphOutgoingMessage,
    save_to_sent_items: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GraphOutgoingMessage {
    subject: String,
    body: GraphBody,
    to_recipients: Vec<GraphRecipient>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    attachments: Vec<GraphFileAttachment>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GraphBody {
    content_type: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GraphFileAttachment {
    #[serde(rename = "@odata.type")]
    odata_type: &'static str,
    name: String,
    content_type: String,
    content_bytes: String,
}

impl GraphRecipient {
    fn display(&self) -> Option<String> {
        let address = self.email_address.address.as_deref()?;
        Some(match self.email_address.name.as_deref() {
            Some(name) if !name.is_empty() => format!("{} <{}>", name, address),
            _ => address.to_string(),
        })
    }
}

/// Microsoft Graph email provider.
pub struct OutlookProvider {
    config: OutlookConfig,
    api_base: String,
    client: reqwest::Client,
    page_size: u32,
    connected: bool,
}

impl OutlookProvider {
    /// Creates an unconnected provider for the given bearer token.
    pub fn new(config: OutlookConfig) -> Self {
        Self::with_base_url(config, GRAPH_API_BASE)
    }

    /// Creates a provider talking to a custom Graph base URL.
    pub fn with_base_url(config: OutlookConfig, api_base: impl Into<String>) -> Self {
        Self {
            config,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
            page_size: DEFAULT_PAGE_SIZE,
            connected: false,
        }
    }

    /// Sets the number of messages fetched per page.
    pub fn page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    fn auth_headers(&self) -> Result<HeaderMap> {
        if self.config.access_token.is_empty() {
            return Err(ProviderError::Authentication("no access token".to_string()));
        }

        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", self.config.access_token))
                .map_err(|e| ProviderError::Internal(format!("invalid header: {}", e)))?,
        );
        Ok(headers)
    }

    async fn get<T: for<'de> Deserialize<'de>>(&self, url: &str) -> Result<T> {
        let response = self
            .client
            .get(url)
            .headers(self.auth_headers()?)
            .send()
            .await
            .map_err(|e| ProviderError::Connection(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(match status.as_u16() {
                401 | 403 => ProviderError::Authentication(format!("unauthorized: {}", body)),
                429 => ProviderError::RateLimited {
                    retry_after_secs: None,
                },
                _ => ProviderError::Connection(format!("Graph error ({}): {}", status, body)),
            });
        }

        response
            .json()
            .await
            .map_err(|e| ProviderError::Internal(format!("parse response: {}", e)))
    }

    fn build_send_request(message: &OutgoingMessage) -> Result<SendMailRequest> {
        let recipients = message.recipients();
        if recipients.is_empty() {
            return Err(ProviderError::Send("no recipients".to_string()));
        }

        let body = match &message.html {
            Some(html) => GraphBody {
                content_type: "html",
                content: html.clone(),
            },
            None => GraphBody {
                content_type: "text",
                content: message.body.clone(),
            },
        };

        Ok(SendMailRequest {
            message: GraphOutgoingMessage {
                subject: message.subject.clone(),
                body,
                to_recipients: recipients
                    .into_iter()
                    .map(|address| GraphRecipient {
                        email_address: GraphEmailAddress {
                            name: None,
                            address: Some(address.to_string()),
                        },
                    })
                    .collect(),
                attachments: message
                    .attachments
                    .iter()
                    .map(|a| GraphFileAttachment {
                        odata_type: "#microsoft.graph.fileAttachment",
                        name: a.filename.clone(),
                        content_type: a.mime_type().to_string(),
                        content_bytes: BASE64_STANDARD.encode(&a.content),
                    })
                    .collect(),
            },
            save_to_sent_items: true,
        })
    }
}

#[async_trait]
impl EmailProvider for OutlookProvider {
    fn provider_type(&self) -> ProviderType {
        ProviderType::Outlook
    }

    fn config(&self) -> ProviderConfig {
        ProviderConfig::Outlook(self.config.clone())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    async fn connect(&mut self) -> Result<AccountProfile> {
        let user: GraphUser = self.get(&format!("{}/me", self.api_base)).await?;

        let email = user
            .mail
            .filter(|m| !m.is_empty())
            .or(user.user_principal_name)
            .ok_or_else(|| {
                ProviderError::Authentication("token has no associated mailbox".to_string())
            })?;

        self.connected = true;
        tracing::info!(email = %email, "Outlook provider connected");

        Ok(AccountProfile {
            email,
            name: user.display_name.filter(|n| !n.is_empty()),
        })
    }

    async fn disconnect(&mut self) -> Result<()> {
        // Delegated Graph tokens cannot be revoked individually; forget it.
        if self.connected || !self.config.access_token.is_empty() {
            self.config.access_token.clear();
            self.connected = false;
            tracing::info!("Outlook session released");
        }
        Ok(())
    }

    async fn fetch_messages(&self) -> Result<Vec<MessageSummary>> {
        let url = format!(
            "{}/me/messages?$top={}&$select={}&$orderby=receivedDateTime%20DESC",
            self.api_base, self.page_size, MESSAGE_SELECT_FIELDS
        );
        let page: GraphMessagesPage = self.get(&url).await?;

        let mut summaries: Vec<MessageSummary> = page
            .value
            .into_iter()
            .map(|m| MessageSummary {
                from: m.from.as_ref().and_then(GraphRecipient::display),
                id: m.id,
                thread_id: m.conversation_id,
                subject: m.subject,
                snippet: m.body_preview.unwrap_or_default(),
                received_at: m.received_date_time,
                is_read: m.is_read.unwrap_or(false),
            })
            .collect();
        sort_most_recent_first(&mut summaries);

        tracing::debug!(count = summaries.len(), "Fetched Outlook messages");
        Ok(summaries)
    }

    async fn send_message(&self, message: &OutgoingMessage) -> Result<()> {
        if !self.connected {
            return Err(ProviderError::Send("not connected".to_string()));
        }

        let request = Self::build_send_request(message)?;
        let headers = self
            .auth_headers()
            .map_err(|e| ProviderError::Send(e.to_string()))?;
        let response = self
            .client
            .post(format!("{}/me/sendMail", self.api_base))
            .headers(headers)
            .json(&request)
            .send()
            .await
            .map_err(|e| ProviderError::Send(format!("Graph unreachable: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Send(format!(
                "Graph rejected message ({}): {}",
                status, body
            )));
        }

        tracing::info!(recipients = request.message.to_recipients.len(), "Email sent via Microsoft Graph");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::OutgoingAttachment;
    use pretty_assertions::assert_eq;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn mock_me(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/me"))
            .and(header("authorization", "Bearer graph-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "displayName": "Carol Example",
                "mail": null,
                "userPrincipalName": "carol@contoso.com"
            })))
            .mount(server)
            .await;
    }

    async fn connected_provider(server: &MockServer) -> OutlookProvider {
        mock_me(server).await;
        let mut provider =
            OutlookProvider::with_base_url(OutlookConfig::new("graph-token"), server.uri());
        provider.connect().await.unwrap();
        provider
    }

    #[tokio::test]
    async fn connect_reads_profile() {
        let server = MockServer::start().await;
        mock_me(&server).await;

        let mut provider =
            OutlookProvider::with_base_url(OutlookConfig::new("graph-token"), server.uri());
        let profile = provider.connect().await.unwrap();

        assert_eq!(profile.email, "carol@contoso.com");
        assert_eq!(profile.name.as_deref(), Some("Carol Example"));
        assert!(provider.is_connected());
    }

    #[tokio::test]
    async fn expired_token_is_authentication_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/me"))
            .respond_with(ResponseTemplate::new(401).set_body_string("InvalidAuthenticationToken"))
            .mount(&server)
            .await;

        let mut provider =
            OutlookProvider::with_base_url(OutlookConfig::new("stale"), server.uri());
        let result = provider.connect().await;

        assert!(matches!(result, Err(ProviderError::Authentication(_))));
        assert!(!provider.is_connected());
    }

    #[tokio::test]
    async fn unreachable_host_is_connection_error() {
        let mut provider =
            OutlookProvider::with_base_url(OutlookConfig::new("graph-token"), "http://127.0.0.1:1");
        let result = provider.connect().await;
        assert!(matches!(result, Err(ProviderError::Connection(_))));
    }

    #[tokio::test]
    async fn fetch_messages_orders_newest_first() {
        let server = MockServer::start().await;
        let provider = connected_provider(&server).await;

        Mock::given(method("GET"))
            .and(path("/me/messages"))
            .and(query_param("$top", "100"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "value": [
                    {
                        "id": "m1",
                        "conversationId": "c1",
                        "subject": "Older",
                        "from": {"emailAddress": {"name": "Dan", "address": "dan@x.com"}},
                        "receivedDateTime": "2024-01-01T10:00:00Z",
                        "bodyPreview": "first",
                        "isRead": true
                    },
                    {
                        "id": "m2",
                        "subject": "Newer",
                        "receivedDateTime": "2024-02-01T10:00:00Z",
                        "bodyPreview": "second",
                        "isRead": false
                    }
                ]
            })))
            .mount(&server)
            .await;

        let messages = provider.fetch_messages().await.unwrap();

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].id, "m2");
        assert_eq!(messages[1].from.as_deref(), Some("Dan <dan@x.com>"));
        assert_eq!(messages[1].thread_id.as_deref(), Some("c1"));
        assert!(messages[1].is_read);
    }

    #[tokio::test]
    async fn send_message_posts_graph_json() {
        let server = MockServer::start().await;
        let provider = connected_provider(&server).await;

        Mock::given(method("POST"))
            .and(path("/me/sendMail"))
            .and(body_partial_json(serde_json::json!({
                "message": {
                    "subject": "Hello",
                    "body": {"contentType": "html", "content": "<b>Hi</b>"},
                    "toRecipients": [
                        {"emailAddress": {"address": "a@x.com"}},
                        {"emailAddress": {"address": "b@x.com"}}
                    ],
                    "attachments": [{
                        "@odata.type": "#microsoft.graph.fileAttachment",
                        "name": "note.txt",
                        "contentBytes": "aGk="
                    }]
                },
                "saveToSentItems": true
            })))
            .respond_with(ResponseTemplate::new(202))
            .expect(1)
            .mount(&server)
            .await;

        let message = OutgoingMessage::new("a@x.com, b@x.com", "Hello", "Hi")
            .html("<b>Hi</b>")
            .attach(OutgoingAttachment::new("note.txt", b"hi".to_vec()));
        provider.send_message(&message).await.unwrap();
    }

    #[tokio::test]
    async fn send_rejection_is_send_error() {
        let server = MockServer::start().await;
        let provider = connected_provider(&server).await;

        Mock::given(method("POST"))
            .and(path("/me/sendMail"))
            .respond_with(ResponseTemplate::new(400).set_body_string("ErrorInvalidRecipients"))
            .mount(&server)
            .await;

        let result = provider
            .send_message(&OutgoingMessage::new("a@x.com", "Hi", "Body"))
            .await;
        assert!(matches!(result, Err(ProviderError::Send(reason)) if reason.contains("ErrorInvalidRecipients")));
    }

    #[tokio::test]
    async fn disconnect_is_idempotent() {
        let server = MockServer::start().await;
        let mut provider = connected_provider(&server).await;

        provider.disconnect().await.unwrap();
        assert!(!provider.is_connected());
        provider.disconnect().await.unwrap();

        let result = provider
            .send_message(&OutgoingMessage::new("a@x.com", "Hi", "Body"))
            .await;
        assert!(matches!(result, Err(ProviderError::Send(_))));
    }

    #[tokio::test]
    async fn expired_token_on_send_is_send_error() {
        let server = MockServer::start().await;
        let provider = connected_provider(&server).await;

        Mock::given(method("POST"))
            .and(path("/me/sendMail"))
            .respond_with(
                ResponseTemplate::new(401).set_body_string("InvalidAuthenticationToken"),
            )
            .mount(&server)
            .await;

        let result = provider
            .send_message(&OutgoingMessage::new("a@x.com", "Hi", "Body"))
            .await;
        assert!(matches!(result, Err(ProviderError::Send(reason)) if reason.contains("InvalidAuthenticationToken")));
    }
}
