//! Message body parsing.
//!
//! A received payload is parsed once per transaction; the result is copied
//! to every recipient.

use mailparse::{parse_mail, MailHeaderMap, ParsedMail};
use tracing::warn;

use crate::email::normalize_subject;

/// Sender recorded when neither the envelope nor the headers name one.
pub const UNKNOWN_SENDER: &str = "unknown@unknown";

/// The fields of a message that get stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedMessage {
    /// Envelope sender, else the From header, else [`UNKNOWN_SENDER`].
    pub sender: String,
    /// Normalized subject.
    pub subject: String,
    /// First text/plain part.
    pub body_text: String,
    /// First text/html part.
    pub body_html: String,
    /// Length of the raw payload.
    pub size_bytes: usize,
}

impl ParsedMessage {
    /// Parse a raw payload.
    ///
    /// Never fails: undecodable bytes are replaced, and a payload mailparse
    /// cannot read at all is stored as plain text.
    pub fn parse(raw: &[u8], envelope_sender: Option<&str>) -> Self {
        let envelope_sender = envelope_sender.filter(|s| !s.trim().is_empty());

        match parse_mail(raw) {
            Ok(mail) => {
                let from_header = mail.headers.get_first_value("From");
                let sender = envelope_sender
                    .map(str::to_string)
                    .or(from_header.filter(|s| !s.trim().is_empty()))
                    .unwrap_or_else(|| UNKNOWN_SENDER.to_string());
                let subject = mail.headers.get_first_value("Subject").unwrap_or_default();

                let mut bodies = Bodies::default();
                if mail.subparts.is_empty() {
                    bodies.classify_single(&mail);
                } else {
                    bodies.walk(&mail);
                }

                Self {
                    sender,
                    subject: normalize_subject(&subject),
                    body_text: bodies.text.unwrap_or_default(),
                    body_html: bodies.html.unwrap_or_default(),
                    size_bytes: raw.len(),
                }
            }
            Err(e) => {
                warn!("Could not parse message, storing raw text: {}", e);
                Self {
                    sender: envelope_sender.unwrap_or(UNKNOWN_SENDER).to_string(),
                    subject: normalize_subject(""),
                    body_text: String::from_utf8_lossy(raw).into_owned(),
                    body_html: String::new(),
                    size_bytes: raw.len(),
                }
            }
        }
    }
}

#[derive(Default)]
struct Bodies {
    text: Option<String>,
    html: Option<String>,
}

impl Bodies {
    /// Depth-first over the MIME tree, keeping the first of each kind.
    fn walk(&mut self, part: &ParsedMail<'_>) {
        if self.text.is_some() && self.html.is_some() {
            return;
        }
        if !part.subparts.is_empty() {
            for sub in &part.subparts {
                self.walk(sub);
            }
            return;
        }
        match part.ctype.mimetype.to_ascii_lowercase().as_str() {
            "text/plain" if self.text.is_none() => self.text = Some(decode_body(part)),
            "text/html" if self.html.is_none() => self.html = Some(decode_body(part)),
            _ => {}
        }
    }

    /// A single-part message fills the field matching its content type.
    fn classify_single(&mut self, part: &ParsedMail<'_>) {
        let mimetype = part.ctype.mimetype.to_ascii_lowercase();
        if mimetype == "text/html" {
            self.html = Some(decode_body(part));
        } else if mimetype.starts_with("text/") {
            self.text = Some(decode_body(part));
        }
    }
}

/// Transfer- and charset-decode a part, falling back to lossy UTF-8.
fn decode_body(part: &ParsedMail<'_>) -> String {
    match part.get_body() {
        Ok(body) => body,
        Err(_) => part
            .get_body_raw()
            .map(|raw| String::from_utf8_lossy(&raw).into_owned())
            .unwrap_or_default(),
    }
}
