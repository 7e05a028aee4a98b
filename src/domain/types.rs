//! Domain types for voidmail.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// A mail domain the service may accept mail for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Domain {
    /// Domain ID.
    pub id: i64,
    /// Domain name, stored lowercase.
    pub name: String,
    /// Whether mail for this domain is accepted.
    pub is_active: bool,
    /// When the domain was added.
    pub created_at: DateTime<Utc>,
}

impl Domain {
    /// Status label used by listings.
    pub fn status(&self) -> &'static str {
        if self.is_active {
            "active"
        } else {
            "inactive"
        }
    }
}

/// Data for creating a new domain.
#[derive(Debug, Clone)]
pub struct NewDomain {
    /// Domain name.
    pub name: String,
    /// Initial activation state (defaults to active).
    pub is_active: bool,
}

impl NewDomain {
    /// Create a new active domain.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_active: true,
        }
    }

    /// Create the domain as inactive.
    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }
}

/// Outcome of adding a domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddDomainOutcome {
    /// The domain was created.
    Created(Domain),
    /// A domain with this name already existed and was left untouched.
    AlreadyExists(Domain),
}

impl AddDomainOutcome {
    /// The domain, whether new or pre-existing.
    pub fn domain(&self) -> &Domain {
        match self {
            AddDomainOutcome::Created(d) | AddDomainOutcome::AlreadyExists(d) => d,
        }
    }

    /// Whether a new row was created.
    pub fn is_created(&self) -> bool {
        matches!(self, AddDomainOutcome::Created(_))
    }
}

/// Normalize and validate a domain name.
///
/// Names are trimmed and lowercased; empty names and names containing `@`,
/// `/` or whitespace are rejected.
pub fn normalize_domain_name(raw: &str) -> Option<String> {
    let name = raw.trim().trim_end_matches('.').to_lowercase();
    if name.is_empty() || name.len() > 253 {
        return None;
    }
    if name.contains('@') || name.contains('/') || name.chars().any(char::is_whitespace) {
        return None;
    }
    Some(name)
}
