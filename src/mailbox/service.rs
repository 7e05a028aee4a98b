//! Mailbox store for voidmail.
//!
//! Creation (random or custom address), expiry computation and lookups.

use chrono::Utc;
use tracing::{debug, info};

use super::repository::MailboxRepository;
use super::types::{Mailbox, MailboxSettings, NewMailbox};
use crate::address;
use crate::db::Database;
use crate::domain::{Domain, DomainAuthority};
use crate::{Result, VoidmailError};

/// How many times an insert is retried after a uniqueness violation.
pub const MAX_CREATE_ATTEMPTS: usize = 5;

/// Service owning the mailbox lifecycle up to deletion.
pub struct MailboxStore<'a> {
    db: &'a Database,
    settings: MailboxSettings,
}

impl<'a> MailboxStore<'a> {
    /// Create a new MailboxStore.
    pub fn new(db: &'a Database, settings: MailboxSettings) -> Self {
        Self { db, settings }
    }

    fn repo(&self) -> MailboxRepository<'_> {
        MailboxRepository::new(self.db.pool())
    }

    /// Settings in effect.
    pub fn settings(&self) -> MailboxSettings {
        self.settings
    }

    /// Create a mailbox.
    ///
    /// `domain` must name an active domain; without it the default domain is
    /// used. Without `local_part` a random one is generated. With one, the
    /// address is claimed: a live mailbox at that address is returned as is,
    /// an expired one is deleted and replaced.
    pub async fn create(&self, domain: Option<&str>, local_part: Option<&str>) -> Result<Mailbox> {
        let domain = DomainAuthority::new(self.db)
            .resolve_for_mailbox(domain)
            .await?;

        match local_part {
            Some(raw) => {
                let local = address::normalize_local_part(raw).ok_or_else(|| {
                    VoidmailError::Validation(format!("invalid local part: {raw:?}"))
                })?;
                self.claim(&domain, &local).await
            }
            None => self.create_random(&domain).await,
        }
    }

    async fn create_random(&self, domain: &Domain) -> Result<Mailbox> {
        let repo = self.repo();
        for attempt in 1..=MAX_CREATE_ATTEMPTS {
            let address = address::compose(&address::new_local_part(), &domain.name);
            let new_mailbox =
                NewMailbox::with_ttl(address, Some(domain.id), Utc::now(), self.settings.ttl);

            match repo.create(&new_mailbox).await {
                Ok(mailbox) => {
                    info!("Created mailbox {}", mailbox.address);
                    return Ok(mailbox);
                }
                Err(e) if e.is_conflict() => {
                    debug!("Generated address collided (attempt {}): {}", attempt, e);
                }
                Err(e) => return Err(e),
            }
        }
        Err(VoidmailError::Conflict(format!(
            "no unique address under {} after {} attempts",
            domain.name, MAX_CREATE_ATTEMPTS
        )))
    }

    async fn claim(&self, domain: &Domain, local: &str) -> Result<Mailbox> {
        let repo = self.repo();
        let address = address::compose(local, &domain.name);

        for attempt in 1..=MAX_CREATE_ATTEMPTS {
            let now = Utc::now();
            match repo.get_by_address(&address).await? {
                Some(existing) if !existing.is_expired_at(now) => return Ok(existing),
                Some(existing) => {
                    if repo.delete_if_expired(existing.id, now).await? {
                        info!("Reclaimed expired address {}", existing.address);
                    }
                }
                None => {}
            }

            let new_mailbox =
                NewMailbox::with_ttl(address.clone(), Some(domain.id), now, self.settings.ttl);
            match repo.create(&new_mailbox).await {
                Ok(mailbox) => {
                    info!("Created mailbox {}", mailbox.address);
                    return Ok(mailbox);
                }
                // A concurrent claim won; the next pass reads its row.
                Err(e) if e.is_conflict() => {
                    debug!("Claim of {} conflicted (attempt {}): {}", address, attempt, e);
                }
                Err(e) => return Err(e),
            }
        }
        Err(VoidmailError::Conflict(format!(
            "could not claim {address} after {MAX_CREATE_ATTEMPTS} attempts"
        )))
    }

    /// Look up a mailbox by token, expired or not.
    pub async fn lookup_by_token(&self, token: &str) -> Result<Option<Mailbox>> {
        if token.is_empty() {
            return Ok(None);
        }
        self.repo().get_by_token(token).await
    }

    /// Look up a mailbox by address (case-insensitive).
    ///
    /// With `must_be_live`, a mailbox whose `expires_at` is not in the
    /// future is treated as absent.
    pub async fn lookup_by_address(&self, address: &str, must_be_live: bool) -> Result<Option<Mailbox>> {
        let address = address.trim();
        if must_be_live {
            self.repo().get_live_by_address(address, Utc::now()).await
        } else {
            self.repo().get_by_address(address).await
        }
    }
}
