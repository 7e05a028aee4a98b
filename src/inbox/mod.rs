//! Inbox module for voidmail.
//!
//! Serializable views over mailboxes and their emails, addressed by token.

mod service;
mod types;

pub use service::InboxService;
pub use types::{EmailPoll, InboxView, MailboxHandle};
