//! Mailbox types for voidmail.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::address;

/// A disposable mailbox.
#[derive(Debug, Clone, Serialize)]
pub struct Mailbox {
    /// Mailbox ID.
    pub id: i64,
    /// Full address (`local@domain`), unique ignoring case.
    pub address: String,
    /// Owning domain, if any.
    pub domain_id: Option<i64>,
    /// Read capability. Never serialized with the mailbox itself.
    #[serde(skip_serializing)]
    pub token: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Fixed at creation to `created_at + TTL`.
    pub expires_at: DateTime<Utc>,
}

impl Mailbox {
    /// Whether the mailbox has expired at `now` (`now >= expires_at`).
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Whether the mailbox has expired.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// The part before the `@`.
    pub fn local_part(&self) -> &str {
        address::split(&self.address)
            .map(|(local, _)| local)
            .unwrap_or(&self.address)
    }

    /// The part after the `@`.
    pub fn domain_name(&self) -> &str {
        address::split(&self.address)
            .map(|(_, domain)| domain)
            .unwrap_or("")
    }
}

/// New mailbox for creation.
#[derive(Debug, Clone)]
pub struct NewMailbox {
    /// Full address.
    pub address: String,
    /// Owning domain.
    pub domain_id: Option<i64>,
    /// Access token.
    pub token: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Expiry time.
    pub expires_at: DateTime<Utc>,
}

impl NewMailbox {
    /// Create a new mailbox record with a fresh token.
    pub fn new(
        address: impl Into<String>,
        domain_id: Option<i64>,
        created_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            address: address.into(),
            domain_id,
            token: address::new_token(),
            created_at,
            expires_at,
        }
    }

    /// Create a mailbox created at `now` that lives for `ttl`.
    pub fn with_ttl(
        address: impl Into<String>,
        domain_id: Option<i64>,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Self {
        Self::new(address, domain_id, now, now + ttl)
    }
}

/// Settings handed to the mailbox store.
#[derive(Debug, Clone, Copy)]
pub struct MailboxSettings {
    /// Lifetime of every mailbox.
    pub ttl: Duration,
}

impl MailboxSettings {
    /// Settings with the given TTL.
    pub fn new(ttl: Duration) -> Self {
        Self { ttl }
    }
}

impl Default for MailboxSettings {
    fn default() -> Self {
        Self {
            ttl: Duration::minutes(60),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(expires_at: DateTime<Utc>) -> Mailbox {
        Mailbox {
            id: 1,
            address: "alice@example.com".to_string(),
            domain_id: Some(1),
            token: "secret".to_string(),
            created_at: expires_at - Duration::minutes(60),
            expires_at,
        }
    }

    #[test]
    fn test_expiry_is_inclusive() {
        let now = Utc::now();
        let mailbox = sample(now);
        assert!(mailbox.is_expired_at(now));
        assert!(!mailbox.is_expired_at(now - Duration::microseconds(1)));
        assert!(mailbox.is_expired_at(now + Duration::seconds(1)));
    }

    #[test]
    fn test_address_parts() {
        let mailbox = sample(Utc::now());
        assert_eq!(mailbox.local_part(), "alice");
        assert_eq!(mailbox.domain_name(), "example.com");
    }

    #[test]
    fn test_token_not_serialized() {
        let json = serde_json::to_value(sample(Utc::now())).unwrap();
        assert!(json.get("token").is_none());
        assert_eq!(json["address"], "alice@example.com");
    }

    #[test]
    fn test_new_mailbox_with_ttl() {
        let now = Utc::now();
        let new_mailbox = NewMailbox::with_ttl("a@b.test", None, now, Duration::minutes(5));
        assert_eq!(new_mailbox.expires_at - new_mailbox.created_at, Duration::minutes(5));

        let other = NewMailbox::with_ttl("a@b.test", None, now, Duration::minutes(5));
        assert_ne!(new_mailbox.token, other.token);
    }
}
