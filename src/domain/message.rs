//! Provider-agnostic message types.
//!
//! [`OutgoingMessage`] is what callers hand to any adapter for sending;
//! [`MessageSummary`] is what adapters that can read mail return.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An email to be sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutgoingMessage {
    /// Recipient address, or a comma-separated list of addresses.
    pub to: String,
    /// Email subject.
    pub subject: String,
    /// Plain text body.
    pub body: String,
    /// HTML body (optional).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
    /// Attachment data.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<OutgoingAttachment>,
}

impl OutgoingMessage {
    /// Creates a plain text message.
    pub fn new(
        to: impl Into<String>,
        subject: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            to: to.into(),
            subject: subject.into(),
            body: body.into(),
            html: None,
            attachments: Vec::new(),
        }
    }

    /// Sets the HTML alternative body.
    pub fn html(mut self, html: impl Into<String>) -> Self {
        self.html = Some(html.into());
        self
    }

    /// Adds an attachment.
    pub fn attach(mut self, attachment: OutgoingAttachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    /// Returns the individual recipient addresses.
    pub fn recipients(&self) -> Vec<&str> {
        self.to
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect()
    }
}

/// An attachment to be sent with an outgoing message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutgoingAttachment {
    /// Filename for the attachment.
    pub filename: String,
    /// Raw attachment data.
    #[serde(with = "base64_serde")]
    pub content: Vec<u8>,
    /// MIME content type. Defaults to `application/octet-stream`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
}

impl OutgoingAttachment {
    /// MIME type used when none is given.
    pub const DEFAULT_CONTENT_TYPE: &'static str = "application/octet-stream";

    /// Creates an attachment with the default content type.
    pub fn new(filename: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            filename: filename.into(),
            content: content.into(),
            content_type: None,
        }
    }

    /// Sets the MIME content type.
    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Returns the MIME content type, falling back to the default.
    pub fn mime_type(&self) -> &str {
        self.content_type
            .as_deref()
            .unwrap_or(Self::DEFAULT_CONTENT_TYPE)
    }
}

mod base64_serde {
    use base64::{engine::general_purpose::STANDARD, Engine};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(bytes: &Vec<u8>, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        STANDARD.encode(bytes).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> std::result::Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        STANDARD
            .decode(&s)
            .map_err(|e| serde::de::Error::custom(e.to_string()))
    }
}

/// A normalized message summary for list display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageSummary {
    /// Backend message identifier.
    pub id: String,
    /// Backend conversation identifier, if the backend threads messages.
    pub thread_id: Option<String>,
    /// Sender, as presented by the backend.
    pub from: Option<String>,
    /// Email subject.
    pub subject: Option<String>,
    /// Short preview of the content.
    pub snippet: String,
    /// When the backend received the message.
    pub received_at: Option<DateTime<Utc>>,
    /// Whether the message has been read.
    pub is_read: bool,
}

/// Sorts summaries most-recent-first. Undated messages go last.
pub fn sort_most_recent_first(messages: &mut [MessageSummary]) {
    messages.sort_by(|a, b| b.received_at.cmp(&a.received_at));
}
