//! Per-recipient delivery of a received message.

use chrono::Utc;
use futures::future::join_all;
use tracing::{debug, error, info};

use super::message::ParsedMessage;
use super::session::Envelope;
use crate::db::Database;
use crate::email::{EmailRepository, NewEmail};
use crate::mailbox::{MailboxSettings, MailboxStore};
use crate::Result;

/// What happened to one recipient's copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Stored under a live mailbox.
    Stored,
    /// No live mailbox at that address; dropped.
    Discarded,
    /// The store reported an error.
    Failed,
}

/// Tally of a fan-out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Copies stored.
    pub stored: usize,
    /// Copies dropped for unknown or expired mailboxes.
    pub discarded: usize,
    /// Copies lost to store errors.
    pub failed: usize,
}

impl DeliveryReport {
    fn record(&mut self, outcome: DeliveryOutcome) {
        match outcome {
            DeliveryOutcome::Stored => self.stored += 1,
            DeliveryOutcome::Discarded => self.discarded += 1,
            DeliveryOutcome::Failed => self.failed += 1,
        }
    }
}

/// Files a parsed message under each recipient's mailbox.
pub struct Deliverer<'a> {
    db: &'a Database,
    settings: MailboxSettings,
}

impl<'a> Deliverer<'a> {
    /// Create a new Deliverer.
    pub fn new(db: &'a Database, settings: MailboxSettings) -> Self {
        Self { db, settings }
    }

    /// Deliver to every envelope recipient independently and concurrently.
    ///
    /// Per-recipient failures are logged and counted, never propagated.
    pub async fn deliver(&self, envelope: &Envelope, message: &ParsedMessage) -> DeliveryReport {
        let outcomes = join_all(
            envelope
                .recipients
                .iter()
                .map(|recipient| self.deliver_one(recipient, message)),
        )
        .await;

        let mut report = DeliveryReport::default();
        for outcome in outcomes {
            report.record(outcome);
        }
        report
    }

    async fn deliver_one(&self, recipient: &str, message: &ParsedMessage) -> DeliveryOutcome {
        match self.try_deliver(recipient, message).await {
            Ok(true) => {
                info!(
                    "Stored email from {} to {}: {}",
                    message.sender, recipient, message.subject
                );
                DeliveryOutcome::Stored
            }
            Ok(false) => {
                debug!("Discarded email for unknown/expired address: {}", recipient);
                DeliveryOutcome::Discarded
            }
            Err(e) => {
                error!("Failed to store email for {}: {}", recipient, e);
                DeliveryOutcome::Failed
            }
        }
    }

    async fn try_deliver(&self, recipient: &str, message: &ParsedMessage) -> Result<bool> {
        let store = MailboxStore::new(self.db, self.settings);
        let Some(mailbox) = store.lookup_by_address(recipient, true).await? else {
            return Ok(false);
        };

        let new_email = NewEmail::new(
            mailbox.id,
            message.sender.as_str(),
            recipient,
            &message.subject,
            message.body_text.as_str(),
        )
        .with_html(message.body_html.as_str())
        .with_size(message.size_bytes as i64);

        // The mailbox may expire between lookup and insert.
        let stored = EmailRepository::new(self.db.pool())
            .create_if_live(&new_email, Utc::now())
            .await?;
        Ok(stored.is_some())
    }
}
