//! Email types for voidmail.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Maximum subject length in bytes (RFC 5322 line limit).
pub const MAX_SUBJECT_BYTES: usize = 998;

/// Subject stored when a message has none.
pub const DEFAULT_SUBJECT: &str = "(no subject)";

/// Maximum number of emails returned by a poll.
pub const POLL_LIMIT: i64 = 50;

/// A received email filed under a mailbox.
#[derive(Debug, Clone, Serialize)]
pub struct Email {
    /// Email ID.
    pub id: i64,
    /// Owning mailbox ID.
    pub mailbox_id: i64,
    /// Envelope sender, or the From header when the envelope had none.
    pub sender: String,
    /// Recipient address as given in RCPT TO.
    pub recipient: String,
    /// Subject, at most 998 bytes.
    pub subject: String,
    /// First text/plain part.
    pub body_text: String,
    /// First text/html part.
    pub body_html: String,
    /// When the email was stored.
    pub received_at: DateTime<Utc>,
    /// Size of the received payload in bytes.
    pub size_bytes: i64,
    /// Hidden from listings by the mailbox owner.
    pub is_deleted: bool,
}

impl Email {
    /// Summary used by polling views.
    pub fn summary(&self) -> EmailSummary {
        EmailSummary {
            id: self.id,
            sender: self.sender.clone(),
            subject: self.subject.clone(),
            received_at: self.received_at,
        }
    }
}

/// Listing entry for an email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailSummary {
    /// Email ID.
    pub id: i64,
    /// Sender address.
    pub sender: String,
    /// Subject.
    pub subject: String,
    /// When the email was stored.
    pub received_at: DateTime<Utc>,
}

/// New email for creation.
#[derive(Debug, Clone)]
pub struct NewEmail {
    /// Target mailbox ID.
    pub mailbox_id: i64,
    /// Sender address.
    pub sender: String,
    /// Recipient address.
    pub recipient: String,
    /// Subject.
    pub subject: String,
    /// Plain-text body.
    pub body_text: String,
    /// HTML body.
    pub body_html: String,
    /// Payload size in bytes.
    pub size_bytes: i64,
}

impl NewEmail {
    /// Create a new email with a text body.
    ///
    /// The subject is normalized with [`normalize_subject`].
    pub fn new(
        mailbox_id: i64,
        sender: impl Into<String>,
        recipient: impl Into<String>,
        subject: &str,
        body_text: impl Into<String>,
    ) -> Self {
        let body_text = body_text.into();
        Self {
            mailbox_id,
            sender: sender.into(),
            recipient: recipient.into(),
            subject: normalize_subject(subject),
            size_bytes: body_text.len() as i64,
            body_text,
            body_html: String::new(),
        }
    }

    /// Set the HTML body.
    pub fn with_html(mut self, body_html: impl Into<String>) -> Self {
        self.body_html = body_html.into();
        self
    }

    /// Set the payload size.
    pub fn with_size(mut self, size_bytes: i64) -> Self {
        self.size_bytes = size_bytes;
        self
    }
}

/// Default an empty subject and cap it at [`MAX_SUBJECT_BYTES`].
///
/// The cut lands on the last character boundary at or before the limit, so
/// multi-byte subjects may end up a few bytes shorter.
pub fn normalize_subject(subject: &str) -> String {
    if subject.trim().is_empty() {
        return DEFAULT_SUBJECT.to_string();
    }
    truncate_bytes(subject, MAX_SUBJECT_BYTES).to_string()
}

fn truncate_bytes(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_subject_default() {
        assert_eq!(normalize_subject(""), DEFAULT_SUBJECT);
        assert_eq!(normalize_subject("   "), DEFAULT_SUBJECT);
        assert_eq!(normalize_subject("Hello"), "Hello");
    }

    #[test]
    fn test_normalize_subject_truncates_to_limit() {
        let long = "s".repeat(1500);
        let subject = normalize_subject(&long);
        assert_eq!(subject.len(), MAX_SUBJECT_BYTES);

        let exact = "e".repeat(MAX_SUBJECT_BYTES);
        assert_eq!(normalize_subject(&exact).len(), MAX_SUBJECT_BYTES);
    }

    #[test]
    fn test_normalize_subject_respects_char_boundary() {
        // 3-byte characters: 998 is not a multiple of 3
        let long = "あ".repeat(400);
        let subject = normalize_subject(&long);
        assert_eq!(subject.len(), 996);
        assert!(subject.chars().all(|c| c == 'あ'));
    }

    #[test]
    fn test_new_email() {
        let email = NewEmail::new(1, "a@example.com", "b@test", "", "body").with_html("<p>x</p>");
        assert_eq!(email.subject, DEFAULT_SUBJECT);
        assert_eq!(email.body_html, "<p>x</p>");
        assert_eq!(email.size_bytes, 4);
        assert_eq!(email.with_size(120).size_bytes, 120);
    }

    #[test]
    fn test_summary() {
        let email = Email {
            id: 7,
            mailbox_id: 1,
            sender: "a@example.com".to_string(),
            recipient: "b@test".to_string(),
            subject: "Hi".to_string(),
            body_text: "x".to_string(),
            body_html: String::new(),
            received_at: Utc::now(),
            size_bytes: 1,
            is_deleted: false,
        };
        let summary = email.summary();
        assert_eq!(summary.id, 7);
        assert_eq!(summary.subject, "Hi");
    }
}
