//! SMTP ingestion for voidmail.
//!
//! This module provides:
//! - Command parsing and the per-session state machine
//! - Recipient checks against the active domains at RCPT time
//! - Message parsing (sender, subject, text and HTML bodies)
//! - Concurrent per-recipient delivery into live mailboxes
//! - The TCP listener with connection limits and idle timeouts

mod command;
mod delivery;
mod error;
mod message;
mod response;
mod server;
mod session;

pub use command::Command;
pub use delivery::{Deliverer, DeliveryOutcome, DeliveryReport};
pub use error::{SmtpError, MAX_COMMAND_LINE};
pub use message::{ParsedMessage, UNKNOWN_SENDER};
pub use response::{Reply, EXTENSIONS};
pub use server::SmtpServer;
pub use session::{Envelope, Session, SessionState, Step};
