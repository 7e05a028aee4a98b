//! Mailbox module for voidmail.
//!
//! A mailbox is an address plus an unguessable read token, valid until
//! `expires_at`. Expiry is computed, never stored; only the reconciler
//! deletes mailboxes (and the claim path, for an expired address).

mod repository;
mod service;
mod types;

pub use repository::MailboxRepository;
pub use service::{MailboxStore, MAX_CREATE_ATTEMPTS};
pub use types::{Mailbox, MailboxSettings, NewMailbox};
