//! Expiry and empty-mailbox sweeps.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::db::Database;
use crate::mailbox::{Mailbox, MailboxRepository};
use crate::Result;

/// Outcome of an expiry sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Mailboxes deleted together with their emails.
    pub removed: usize,
    /// Mailboxes whose deletion failed; retried next pass.
    pub failed: usize,
}

/// A mailbox selected by the empty-mailbox sweep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SweepCandidate {
    /// Mailbox ID.
    pub id: i64,
    /// Address.
    pub address: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl From<&Mailbox> for SweepCandidate {
    fn from(mailbox: &Mailbox) -> Self {
        Self {
            id: mailbox.id,
            address: mailbox.address.clone(),
            created_at: mailbox.created_at,
        }
    }
}

/// Outcome of an empty-mailbox sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EmptySweepReport {
    /// Mailboxes that qualified when listed.
    pub candidates: Vec<SweepCandidate>,
    /// Mailboxes actually deleted.
    pub removed: usize,
    /// Deletions that failed.
    pub failed: usize,
    /// Nothing was deleted.
    pub dry_run: bool,
}

/// Service performing the deleting sweeps.
pub struct CleanupService<'a> {
    db: &'a Database,
}

impl<'a> CleanupService<'a> {
    /// Create a new CleanupService.
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    fn repo(&self) -> MailboxRepository<'_> {
        MailboxRepository::new(self.db.pool())
    }

    /// Delete every mailbox expired now, with its emails.
    pub async fn sweep_expired(&self) -> Result<SweepReport> {
        self.sweep_expired_at(Utc::now()).await
    }

    /// Delete every mailbox with `expires_at <= now`, with its emails.
    ///
    /// Only listing the candidates can fail the sweep; a failed deletion is
    /// logged and counted.
    pub async fn sweep_expired_at(&self, now: DateTime<Utc>) -> Result<SweepReport> {
        let repo = self.repo();
        let expired = repo.list_expired(now).await?;
        let mut report = SweepReport::default();

        for mailbox in &expired {
            match repo.delete_if_expired(mailbox.id, now).await {
                Ok(true) => report.removed += 1,
                Ok(false) => debug!("Mailbox {} already gone", mailbox.address),
                Err(e) => {
                    warn!("Failed to delete expired mailbox {}: {}", mailbox.address, e);
                    report.failed += 1;
                }
            }
        }

        if report.removed > 0 || report.failed > 0 {
            info!(
                "Expiry sweep: removed {} mailbox(es), {} failed",
                report.removed, report.failed
            );
        } else {
            debug!("Expiry sweep: nothing to do");
        }
        Ok(report)
    }

    /// Delete mailboxes older than `grace` that hold no visible email.
    pub async fn sweep_empty(&self, grace: Duration, dry_run: bool) -> Result<EmptySweepReport> {
        self.sweep_empty_at(Utc::now(), grace, dry_run).await
    }

    /// Like [`sweep_empty`](Self::sweep_empty) with an explicit clock.
    pub async fn sweep_empty_at(
        &self,
        now: DateTime<Utc>,
        grace: Duration,
        dry_run: bool,
    ) -> Result<EmptySweepReport> {
        let repo = self.repo();
        let cutoff = now - grace;
        let mailboxes = repo.list_empty_before(cutoff).await?;

        let mut report = EmptySweepReport {
            candidates: mailboxes.iter().map(SweepCandidate::from).collect(),
            dry_run,
            ..EmptySweepReport::default()
        };

        if dry_run {
            info!("Empty sweep (dry run): {} candidate(s)", report.candidates.len());
            return Ok(report);
        }

        for mailbox in &mailboxes {
            match repo.delete_if_empty(mailbox.id, cutoff).await {
                Ok(true) => report.removed += 1,
                Ok(false) => debug!("Mailbox {} no longer empty, kept", mailbox.address),
                Err(e) => {
                    warn!("Failed to delete empty mailbox {}: {}", mailbox.address, e);
                    report.failed += 1;
                }
            }
        }

        if report.removed > 0 || report.failed > 0 {
            info!(
                "Empty sweep: removed {} mailbox(es), {} failed",
                report.removed, report.failed
            );
        } else {
            debug!("Empty sweep: nothing to do");
        }
        Ok(report)
    }
}
