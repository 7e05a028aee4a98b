//! Mailbox read interface for voidmail.
//!
//! The surface the web layer calls: create a mailbox, view it by token,
//! poll for new mail, read and hide single emails.

use chrono::{DateTime, Utc};

use super::types::{EmailPoll, InboxView, MailboxHandle};
use crate::db::Database;
use crate::email::{Email, EmailRepository, EmailSummary, POLL_LIMIT};
use crate::mailbox::{MailboxSettings, MailboxStore};
use crate::Result;

/// Service backing the mailbox read interface.
pub struct InboxService<'a> {
    db: &'a Database,
    settings: MailboxSettings,
}

impl<'a> InboxService<'a> {
    /// Create a new InboxService.
    pub fn new(db: &'a Database, settings: MailboxSettings) -> Self {
        Self { db, settings }
    }

    fn store(&self) -> MailboxStore<'_> {
        MailboxStore::new(self.db, self.settings)
    }

    fn emails(&self) -> EmailRepository<'_> {
        EmailRepository::new(self.db.pool())
    }

    /// Create a mailbox and hand out its address and token.
    pub async fn create(&self, domain: Option<&str>, local_part: Option<&str>) -> Result<MailboxHandle> {
        let mailbox = self.store().create(domain, local_part).await?;
        Ok(MailboxHandle::from(mailbox))
    }

    /// View a mailbox by token. None when the token is unknown.
    pub async fn get_by_token(&self, token: &str) -> Result<Option<InboxView>> {
        let Some(mailbox) = self.store().lookup_by_token(token).await? else {
            return Ok(None);
        };

        let now = Utc::now();
        let emails = if mailbox.is_expired_at(now) {
            Vec::new()
        } else {
            self.emails()
                .list_visible(mailbox.id, None, i64::MAX)
                .await?
                .iter()
                .map(Email::summary)
                .collect()
        };
        Ok(Some(InboxView::new(&mailbox, now, emails)))
    }

    /// Poll for emails received after `since` (all when None).
    pub async fn list_emails_since(
        &self,
        token: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<EmailPoll> {
        let mailbox = match self.store().lookup_by_token(token).await? {
            Some(mailbox) if !mailbox.is_expired() => mailbox,
            _ => return Ok(EmailPoll::expired()),
        };

        let emails = self.emails();
        let count = emails.count_visible(mailbox.id).await?;
        let listed: Vec<EmailSummary> = emails
            .list_visible(mailbox.id, since, POLL_LIMIT)
            .await?
            .iter()
            .map(Email::summary)
            .collect();

        Ok(EmailPoll {
            expired: false,
            count,
            emails: listed,
        })
    }

    /// Read a single email unless it has been hidden.
    pub async fn get_email(&self, id: i64) -> Result<Option<Email>> {
        self.emails().get_visible(id).await
    }

    /// Hide an email. Returns false if it does not exist.
    pub async fn soft_delete_email(&self, id: i64) -> Result<bool> {
        self.emails().soft_delete(id).await
    }
}
