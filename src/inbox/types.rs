//! Read-interface views for voidmail.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::datetime;
use crate::email::EmailSummary;
use crate::mailbox::Mailbox;

/// What a caller receives when a mailbox is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MailboxHandle {
    /// Full address.
    pub address: String,
    /// Read capability.
    pub token: String,
    /// Expiry time.
    pub expires_at: DateTime<Utc>,
}

impl From<Mailbox> for MailboxHandle {
    fn from(mailbox: Mailbox) -> Self {
        Self {
            address: mailbox.address,
            token: mailbox.token,
            expires_at: mailbox.expires_at,
        }
    }
}

/// A mailbox as seen through its token.
#[derive(Debug, Clone, Serialize)]
pub struct InboxView {
    /// Full address.
    pub address: String,
    /// Part before the `@`.
    pub local_part: String,
    /// Part after the `@`.
    pub domain: String,
    /// Expiry time.
    pub expires_at: DateTime<Utc>,
    /// Seconds left until expiry, zero once expired.
    pub remaining_seconds: i64,
    /// Whether the mailbox has expired.
    pub expired: bool,
    /// Visible emails, newest first. Empty once expired.
    pub emails: Vec<EmailSummary>,
}

impl InboxView {
    pub(crate) fn new(mailbox: &Mailbox, now: DateTime<Utc>, emails: Vec<EmailSummary>) -> Self {
        let expired = mailbox.is_expired_at(now);
        Self {
            address: mailbox.address.clone(),
            local_part: mailbox.local_part().to_string(),
            domain: mailbox.domain_name().to_string(),
            expires_at: mailbox.expires_at,
            remaining_seconds: datetime::remaining_seconds(&mailbox.expires_at, &now),
            expired,
            emails: if expired { Vec::new() } else { emails },
        }
    }
}

/// Result of polling a mailbox for new mail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailPoll {
    /// True when the mailbox is expired or unknown.
    pub expired: bool,
    /// Number of visible emails in the mailbox.
    pub count: i64,
    /// Up to 50 newest matching emails.
    pub emails: Vec<EmailSummary>,
}

impl EmailPoll {
    /// The answer for an unknown or expired mailbox.
    pub fn expired() -> Self {
        Self {
            expired: true,
            count: 0,
            emails: Vec::new(),
        }
    }
}
