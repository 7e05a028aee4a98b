//! SMTP protocol errors.
//!
//! These never leave a session: each one is turned into a negative reply
//! and the session carries on.

use thiserror::Error;

use super::response::Reply;

/// Maximum length of a command line including CRLF (RFC 5321 4.5.3.1.4).
pub const MAX_COMMAND_LINE: usize = 512;

/// A command the session refuses.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SmtpError {
    /// Command verb not recognized.
    #[error("command unrecognized: {0}")]
    UnknownCommand(String),

    /// Command line longer than [`MAX_COMMAND_LINE`].
    #[error("line too long")]
    LineTooLong,

    /// Arguments could not be parsed.
    #[error("syntax error: {0}")]
    Syntax(String),

    /// Command not valid in the current state.
    #[error("bad sequence of commands: {0}")]
    BadSequence(String),

    /// DATA without any accepted recipient.
    #[error("no valid recipients")]
    NoValidRecipients,
}

impl SmtpError {
    /// The reply code for this error.
    pub fn code(&self) -> u16 {
        match self {
            SmtpError::UnknownCommand(_) | SmtpError::LineTooLong => 500,
            SmtpError::Syntax(_) => 501,
            SmtpError::BadSequence(_) => 503,
            SmtpError::NoValidRecipients => 554,
        }
    }

    /// The reply sent to the client.
    pub fn to_reply(&self) -> Reply {
        let text = match self {
            SmtpError::UnknownCommand(_) => "Error: command not recognized".to_string(),
            SmtpError::LineTooLong => "Line too long".to_string(),
            SmtpError::Syntax(msg) => format!("Syntax: {msg}"),
            SmtpError::BadSequence(msg) => format!("Error: {msg}"),
            SmtpError::NoValidRecipients => "No valid recipients".to_string(),
        };
        Reply::new(self.code(), text)
    }
}
