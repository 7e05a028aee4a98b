//! Domain authority for voidmail.
//!
//! Decides which recipient domains are accepted and which domain mailboxes
//! fall back to when the caller does not choose one.

use tracing::info;

use super::repository::DomainRepository;
use super::types::{normalize_domain_name, AddDomainOutcome, Domain, NewDomain};
use crate::db::Database;
use crate::{Result, VoidmailError};

/// Service answering domain-level questions and administering domains.
pub struct DomainAuthority<'a> {
    db: &'a Database,
}

impl<'a> DomainAuthority<'a> {
    /// Create a new DomainAuthority.
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    fn repo(&self) -> DomainRepository<'_> {
        DomainRepository::new(self.db.pool())
    }

    /// Whether mail for `domain` is accepted (active, case-insensitive).
    pub async fn is_accepted_recipient_domain(&self, domain: &str) -> Result<bool> {
        let domain = domain.trim().trim_end_matches('.');
        if domain.is_empty() {
            return Ok(false);
        }
        self.repo().is_active(domain).await
    }

    /// The fallback domain for address generation.
    ///
    /// This is the lexicographically first active domain. Fails with a
    /// configuration error when no domain is active.
    pub async fn default_domain(&self) -> Result<Domain> {
        self.repo().first_active().await?.ok_or_else(|| {
            VoidmailError::Config(
                "no active domain configured; add one with `voidmail domain add <name>`"
                    .to_string(),
            )
        })
    }

    /// Resolve the domain a new mailbox should live under.
    ///
    /// An explicitly requested domain must exist and be active.
    pub async fn resolve_for_mailbox(&self, requested: Option<&str>) -> Result<Domain> {
        match requested {
            Some(name) => {
                let name = normalize_domain_name(name)
                    .ok_or_else(|| VoidmailError::Validation(format!("invalid domain: {name}")))?;
                match self.repo().get_by_name(&name).await? {
                    Some(domain) if domain.is_active => Ok(domain),
                    _ => Err(VoidmailError::NotFound(format!("active domain '{name}'"))),
                }
            }
            None => self.default_domain().await,
        }
    }

    /// Add a domain. Adding an existing name leaves it untouched.
    pub async fn add(&self, name: &str, is_active: bool) -> Result<AddDomainOutcome> {
        let name = normalize_domain_name(name)
            .ok_or_else(|| VoidmailError::Validation(format!("invalid domain name: {name:?}")))?;

        let repo = self.repo();
        if let Some(existing) = repo.get_by_name(&name).await? {
            return Ok(AddDomainOutcome::AlreadyExists(existing));
        }

        let mut new_domain = NewDomain::new(&name);
        if !is_active {
            new_domain = new_domain.inactive();
        }

        match repo.create(&new_domain).await {
            Ok(domain) => {
                info!("Added domain {} ({})", domain.name, domain.status());
                Ok(AddDomainOutcome::Created(domain))
            }
            // Lost a race against a concurrent add of the same name.
            Err(e) if e.is_conflict() => repo
                .get_by_name(&name)
                .await?
                .map(AddDomainOutcome::AlreadyExists)
                .ok_or(e),
            Err(e) => Err(e),
        }
    }

    /// Ensure every name in `names` exists and is active.
    ///
    /// Existing inactive domains are left inactive; an operator's explicit
    /// deactivation wins over the seed list.
    pub async fn ensure_seeded(&self, names: &[String]) -> Result<Vec<AddDomainOutcome>> {
        let mut outcomes = Vec::with_capacity(names.len());
        for name in names {
            outcomes.push(self.add(name, true).await?);
        }
        Ok(outcomes)
    }

    /// List all domains ordered by name.
    pub async fn list(&self) -> Result<Vec<Domain>> {
        self.repo().list_all().await
    }

    /// List active domains ordered by name.
    pub async fn list_active(&self) -> Result<Vec<Domain>> {
        self.repo().list_active().await
    }

    /// Activate a domain.
    pub async fn activate(&self, name: &str) -> Result<()> {
        self.set_active(name, true).await
    }

    /// Deactivate a domain. Existing mailboxes stay; new mail is refused.
    pub async fn deactivate(&self, name: &str) -> Result<()> {
        self.set_active(name, false).await
    }

    async fn set_active(&self, name: &str, is_active: bool) -> Result<()> {
        let name = normalize_domain_name(name)
            .ok_or_else(|| VoidmailError::Validation(format!("invalid domain name: {name:?}")))?;
        if !self.repo().set_active(&name, is_active).await? {
            return Err(VoidmailError::NotFound(format!("domain '{name}'")));
        }
        info!(
            "Domain {} {}",
            name,
            if is_active { "activated" } else { "deactivated" }
        );
        Ok(())
    }

    /// Remove a domain, its mailboxes and their emails.
    ///
    /// Returns the number of mailboxes removed.
    pub async fn remove(&self, name: &str) -> Result<u64> {
        let name = normalize_domain_name(name)
            .ok_or_else(|| VoidmailError::Validation(format!("invalid domain name: {name:?}")))?;
        let removed = self
            .repo()
            .delete_cascade(&name)
            .await?
            .ok_or_else(|| VoidmailError::NotFound(format!("domain '{name}'")))?;
        info!("Removed domain {} with {} mailbox(es)", name, removed);
        Ok(removed)
    }
}
