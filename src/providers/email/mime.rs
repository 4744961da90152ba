//! RFC 5322 message construction shared by the MIME-based backends.

use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MessageBuilder, MultiPart, SinglePart};
use lettre::Message;

use super::{ProviderError, Result};
use crate::domain::OutgoingMessage;

/// Builds a MIME message from a provider-agnostic [`OutgoingMessage`].
///
/// Invalid sender or recipient addresses are reported as
/// [`ProviderError::Send`], since the backend would reject them anyway.
pub(crate) fn build_message(from: &str, message: &OutgoingMessage) -> Result<Message> {
    let from_mailbox: Mailbox = from
        .parse()
        .map_err(|e| ProviderError::Send(format!("invalid from address {}: {}", from, e)))?;

    let recipients = message.recipients();
    if recipients.is_empty() {
        return Err(ProviderError::Send("no recipients".to_string()));
    }

    let mut builder = MessageBuilder::new()
        .from(from_mailbox)
        .subject(&message.subject);

    for recipient in recipients {
        let mailbox: Mailbox = recipient.parse().map_err(|e| {
            ProviderError::Send(format!("invalid recipient {}: {}", recipient, e))
        })?;
        builder = builder.to(mailbox);
    }

    let built = if message.attachments.is_empty() {
        match &message.html {
            Some(html) => builder.multipart(MultiPart::alternative_plain_html(
                message.body.clone(),
                html.clone(),
            )),
            None => builder.singlepart(SinglePart::plain(message.body.clone())),
        }
    } else {
        let mut mixed = match &message.html {
            Some(html) => MultiPart::mixed().multipart(MultiPart::alternative_plain_html(
                message.body.clone(),
                html.clone(),
            )),
            None => MultiPart::mixed().singlepart(SinglePart::plain(message.body.clone())),
        };

        for attachment in &message.attachments {
            let content_type = ContentType::parse(attachment.mime_type()).map_err(|e| {
                ProviderError::Send(format!(
                    "invalid content type for {}: {}",
                    attachment.filename, e
                ))
            })?;
            mixed = mixed.singlepart(
                Attachment::new(attachment.filename.clone())
                    .body(attachment.content.clone(), content_type),
            );
        }

        builder.multipart(mixed)
    };

    built.map_err(|e| ProviderError::Send(format!("failed to build message: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::OutgoingAttachment;

    fn render(message: &Message) -> String {
        String::from_utf8_lossy(&message.formatted()).to_string()
    }

    #[test]
    fn plain_message_headers() {
        let outgoing = OutgoingMessage::new("b@x.com", "Hello", "Plain body");
        let message = build_message("a@x.com", &outgoing).unwrap();
        let raw = render(&message);

        assert!(raw.contains("From: a@x.com"));
        assert!(raw.contains("To: b@x.com"));
        assert!(raw.contains("Subject: Hello"));
        assert!(raw.contains("Plain body"));
    }

    #[test]
    fn html_message_is_alternative() {
        let outgoing = OutgoingMessage::new("b@x.com", "Hello", "Plain").html("<p>Rich</p>");
        let raw = render(&build_message("a@x.com", &outgoing).unwrap());

        assert!(raw.contains("multipart/alternative"));
        assert!(raw.contains("<p>Rich</p>"));
    }

    #[test]
    fn attachments_make_mixed_message() {
        let outgoing = OutgoingMessage::new("b@x.com", "Report", "See attached")
            .attach(OutgoingAttachment::new("report.csv", b"a,b\n1,2\n".to_vec()).content_type("text/csv"));
        let raw = render(&build_message("a@x.com", &outgoing).unwrap());

        assert!(raw.contains("multipart/mixed"));
        assert!(raw.contains("report.csv"));
    }

    #[test]
    fn multiple_recipients() {
        let outgoing = OutgoingMessage::new("b@x.com, c@x.com", "Hi", "Body");
        let message = build_message("a@x.com", &outgoing).unwrap();
        assert_eq!(message.envelope().to().len(), 2);
    }

    #[test]
    fn invalid_recipient_is_send_error() {
        let outgoing = OutgoingMessage::new("not an address", "Hi", "Body");
        let result = build_message("a@x.com", &outgoing);
        assert!(matches!(result, Err(ProviderError::Send(_))));
    }

    #[test]
    fn empty_recipient_list_is_send_error() {
        let outgoing = OutgoingMessage::new(" , ", "Hi", "Body");
        let result = build_message("a@x.com", &outgoing);
        assert!(matches!(result, Err(ProviderError::Send(_))));
    }
}
