//! Domain module for voidmail.
//!
//! This module holds the set of mail domains the service accepts mail for:
//! - Case-insensitive recipient-domain checks
//! - Default domain selection for generated addresses
//! - Administration (add, list, activate, deactivate, remove)

mod repository;
mod service;
mod types;

pub use repository::DomainRepository;
pub use service::DomainAuthority;
pub use types::{normalize_domain_name, AddDomainOutcome, Domain, NewDomain};
