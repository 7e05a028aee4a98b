//! voidmail - disposable email service
//!
//! Hands out short-lived, token-protected mailboxes, accepts mail for them
//! over SMTP and purges them once they expire.

pub mod address;
pub mod config;
pub mod datetime;
pub mod db;
pub mod domain;
pub mod email;
pub mod error;
pub mod inbox;
pub mod logging;
pub mod mailbox;
pub mod reconciler;
pub mod smtp;

pub use config::Config;
pub use db::Database;
pub use domain::{AddDomainOutcome, Domain, DomainAuthority};
pub use email::{Email, EmailSummary};
pub use error::{Result, VoidmailError};
pub use inbox::{EmailPoll, InboxService, InboxView, MailboxHandle};
pub use mailbox::{Mailbox, MailboxSettings, MailboxStore};
pub use reconciler::{CleanupService, EmptySweepReport, PassReport, Reconciler, SweepReport};
pub use smtp::SmtpServer;
