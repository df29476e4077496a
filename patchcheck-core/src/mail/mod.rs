//! Mail messages as delivered by the mail index.
//!
//! Messages are parsed with `mail-parser`. A [`MailMessage`] keeps the raw
//! bytes for replay next to the decoded subject and plain-text body.

pub mod mbox;
pub mod notmuch;

use mail_parser::{Message, MessageParser, MimeHeaders, PartType};

use crate::error::MailError;

/// Capability to run a query against a mail index.
pub trait MailSource {
    /// Returns every message matching `terms`, in index order.
    fn query(&self, terms: &[String]) -> Result<Vec<MailMessage>, MailError>;
}

/// One parsed RFC 822 message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailMessage {
    raw: Vec<u8>,
    envelope: Option<String>,
    subject: String,
    body: String,
    multipart: bool,
}

impl MailMessage {
    /// Parses a raw message. `envelope` is the text following `From ` on the
    /// mbox separator line, when the message came out of an mbox.
    pub fn parse(raw: Vec<u8>, envelope: Option<String>) -> Result<Self, MailError> {
        let message = MessageParser::new()
            .parse(&raw)
            .ok_or_else(|| MailError::Parse("not an RFC 822 message".to_string()))?;

        let subject = message.subject().unwrap_or_default().to_string();
        let body = plain_text_body(&message);
        let multipart = message
            .part(0)
            .is_some_and(|root| matches!(root.body, PartType::Multipart(_)));

        Ok(Self {
            raw,
            envelope,
            subject,
            body,
            multipart,
        })
    }

    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    pub fn envelope(&self) -> Option<&str> {
        self.envelope.as_deref()
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// The selected plain-text body; empty when none exists or it could not
    /// be decoded.
    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn is_multipart(&self) -> bool {
        self.multipart
    }
}

/// Picks the body text used for patch detection and comparison.
///
/// Parts are visited depth-first; the last `text/plain` part wins.
fn plain_text_body(message: &Message<'_>) -> String {
    let mut body = None;
    visit_part(message, 0, &mut body);
    body.unwrap_or_default()
}

fn visit_part(message: &Message<'_>, id: usize, body: &mut Option<String>) {
    let Some(part) = message.part(id) else {
        return;
    };
    match &part.body {
        PartType::Multipart(children) => {
            for child in children {
                visit_part(message, *child, body);
            }
        }
        PartType::Text(text) if is_plain(part) => {
            if part.is_encoding_problem {
                *body = Some(String::new());
            } else {
                *body = Some(text.to_string());
            }
        }
        _ => {}
    }
}

fn is_plain(part: &mail_parser::MessagePart<'_>) -> bool {
    match part.content_type() {
        None => true,
        Some(ctype) => {
            ctype.ctype().eq_ignore_ascii_case("text")
                && ctype
                    .subtype()
                    .is_none_or(|subtype| subtype.eq_ignore_ascii_case("plain"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(text: &str) -> MailMessage {
        MailMessage::parse(text.replace('\n', "\r\n").into_bytes(), None).unwrap()
    }

    #[test]
    fn single_part_body() {
        let msg = message(
            "From: a@example.com\nSubject: [PATCH] foo\nContent-Type: text/plain; charset=utf-8\n\nhello\n",
        );
        assert_eq!(msg.subject(), "[PATCH] foo");
        assert_eq!(msg.body().trim_end(), "hello");
        assert!(!msg.is_multipart());
    }

    #[test]
    fn missing_content_type_is_plain_text() {
        let msg = message("Subject: x\n\nbody text\n");
        assert_eq!(msg.body().trim_end(), "body text");
    }

    #[test]
    fn base64_body_is_decoded() {
        let msg = message(
            "Subject: x\nContent-Type: text/plain\nContent-Transfer-Encoding: base64\n\naGVsbG8gd29ybGQK\n",
        );
        assert_eq!(msg.body().trim_end(), "hello world");
    }

    #[test]
    fn html_only_message_has_empty_body() {
        let msg = message("Subject: x\nContent-Type: text/html\n\n<p>hi</p>\n");
        assert_eq!(msg.body(), "");
    }

    #[test]
    fn last_plain_part_wins_in_nested_multipart() {
        let msg = message(
            "Subject: x
MIME-Version: 1.0
Content-Type: multipart/mixed; boundary=\"outer\"

--outer
Content-Type: text/plain

first
--outer
Content-Type: multipart/alternative; boundary=\"inner\"

--inner
Content-Type: text/plain

second
--inner
Content-Type: text/html

<p>third</p>
--inner--
--outer
Content-Type: application/octet-stream

AAAA
--outer--
",
        );
        assert!(msg.is_multipart());
        assert_eq!(msg.body().trim_end(), "second");
    }
}
