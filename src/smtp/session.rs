//! SMTP session state machine.
//!
//! The session does no I/O. It turns command lines into [`Step`]s; the
//! connection driver performs the steps (recipient checks, body reading,
//! delivery) and reports back.

use super::command::Command;
use super::error::{SmtpError, MAX_COMMAND_LINE};
use super::response::Reply;
use crate::address;

/// Where a session stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Connected, waiting for HELO/EHLO.
    Connected,
    /// Greeted, no transaction open.
    Ready,
    /// MAIL accepted, collecting recipients.
    Recipients,
    /// Reading the message body.
    Data,
    /// QUIT received.
    Closed,
}

/// Sender and accepted recipients of one transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Envelope {
    /// Reverse path; None for `<>`.
    pub sender: Option<String>,
    /// Recipients whose domain was accepted, in RCPT order.
    pub recipients: Vec<String>,
}

/// What the driver has to do next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Send the reply and read the next command.
    Reply(Reply),
    /// Ask whether `domain` is served, then call
    /// [`Session::recipient_verdict`] and send its reply.
    CheckRecipient {
        /// Recipient as given.
        address: String,
        /// Lowercased domain part.
        domain: String,
    },
    /// Send the reply and read the message body, then call
    /// [`Session::take_envelope`].
    ReadData(Reply),
    /// Send the reply and close the connection.
    Close(Reply),
}

/// Per-connection SMTP state.
#[derive(Debug)]
pub struct Session {
    hostname: String,
    state: SessionState,
    client_name: Option<String>,
    envelope: Envelope,
}

impl Session {
    /// Create a session for a freshly accepted connection.
    pub fn new(hostname: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            state: SessionState::Connected,
            client_name: None,
            envelope: Envelope::default(),
        }
    }

    /// The 220 banner.
    pub fn greeting(&self) -> Reply {
        Reply::greeting(&self.hostname)
    }

    /// The 421 reply for an idle client.
    pub fn timeout_reply(&self) -> Reply {
        Reply::timeout(&self.hostname)
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Name given in HELO/EHLO.
    pub fn client_name(&self) -> Option<&str> {
        self.client_name.as_deref()
    }

    /// The transaction being built.
    pub fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    /// Handle one command line (without CRLF).
    pub fn handle_line(&mut self, line: &str) -> Step {
        if line.len() + 2 > MAX_COMMAND_LINE {
            return Step::Reply(SmtpError::LineTooLong.to_reply());
        }
        match Command::parse(line).and_then(|command| self.handle_command(command)) {
            Ok(step) => step,
            Err(e) => Step::Reply(e.to_reply()),
        }
    }

    fn handle_command(&mut self, command: Command) -> Result<Step, SmtpError> {
        if self.state == SessionState::Data || self.state == SessionState::Closed {
            return Err(SmtpError::BadSequence("session not accepting commands".to_string()));
        }

        match command {
            Command::Helo(name) => {
                self.greet(name);
                Ok(Step::Reply(Reply::helo(&self.hostname)))
            }
            Command::Ehlo(name) => {
                self.greet(name);
                Ok(Step::Reply(Reply::ehlo(&self.hostname)))
            }
            Command::Mail(sender) => match self.state {
                SessionState::Connected => Err(SmtpError::BadSequence("send HELO first".to_string())),
                SessionState::Recipients => Err(SmtpError::BadSequence("nested MAIL command".to_string())),
                _ => {
                    self.envelope = Envelope {
                        sender,
                        recipients: Vec::new(),
                    };
                    self.state = SessionState::Recipients;
                    Ok(Step::Reply(Reply::ok()))
                }
            },
            Command::Rcpt(address) => {
                if self.state != SessionState::Recipients {
                    return Err(SmtpError::BadSequence("need MAIL command".to_string()));
                }
                // Without an `@` the whole argument stands in for the domain.
                let domain = address::domain_of(&address).unwrap_or_else(|| address.to_lowercase());
                Ok(Step::CheckRecipient { address, domain })
            }
            Command::Data => {
                if self.state != SessionState::Recipients {
                    return Err(SmtpError::BadSequence("need RCPT command".to_string()));
                }
                if self.envelope.recipients.is_empty() {
                    return Err(SmtpError::NoValidRecipients);
                }
                self.state = SessionState::Data;
                Ok(Step::ReadData(Reply::data_start()))
            }
            Command::Rset => {
                self.reset_transaction();
                Ok(Step::Reply(Reply::ok()))
            }
            Command::Noop => Ok(Step::Reply(Reply::ok())),
            Command::Vrfy(_) => Ok(Step::Reply(Reply::cannot_verify())),
            Command::Quit => {
                self.state = SessionState::Closed;
                Ok(Step::Close(Reply::bye()))
            }
        }
    }

    fn greet(&mut self, name: String) {
        self.client_name = Some(name);
        self.envelope = Envelope::default();
        self.state = SessionState::Ready;
    }

    fn reset_transaction(&mut self) {
        self.envelope = Envelope::default();
        if self.state != SessionState::Connected {
            self.state = SessionState::Ready;
        }
    }

    /// Record the outcome of a [`Step::CheckRecipient`] and produce the reply.
    pub fn recipient_verdict(&mut self, address: String, domain: &str, accepted: bool) -> Reply {
        if self.state != SessionState::Recipients {
            return SmtpError::BadSequence("need MAIL command".to_string()).to_reply();
        }
        if !accepted {
            return Reply::not_relaying(domain);
        }
        self.envelope.recipients.push(address);
        Reply::ok()
    }

    /// Hand over the envelope once the body has been read.
    ///
    /// The session returns to the greeted state, ready for another
    /// transaction. Returns None outside of DATA.
    pub fn take_envelope(&mut self) -> Option<Envelope> {
        if self.state != SessionState::Data {
            return None;
        }
        self.state = SessionState::Ready;
        Some(std::mem::take(&mut self.envelope))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reply_code(step: &Step) -> u16 {
        match step {
            Step::Reply(r) | Step::ReadData(r) | Step::Close(r) => r.code,
            Step::CheckRecipient { .. } => 0,
        }
    }

    fn greeted() -> Session {
        let mut session = Session::new("mx.test");
        session.handle_line("EHLO client.test");
        session
    }

    fn add_recipient(session: &mut Session, line: &str, accepted: bool) -> Reply {
        match session.handle_line(line) {
            Step::CheckRecipient { address, domain } => {
                session.recipient_verdict(address, &domain, accepted)
            }
            other => panic!("expected recipient check, got {other:?}"),
        }
    }

    #[test]
    fn test_greeting() {
        let session = Session::new("mx.test");
        assert_eq!(session.greeting().to_wire(), "220 mx.test ESMTP\r\n");
        assert_eq!(session.state(), SessionState::Connected);
    }

    #[test]
    fn test_mail_requires_helo() {
        let mut session = Session::new("mx.test");
        assert_eq!(reply_code(&session.handle_line("MAIL FROM:<a@example.com>")), 503);

        assert_eq!(reply_code(&session.handle_line("HELO client.test")), 250);
        assert_eq!(session.client_name(), Some("client.test"));
        assert_eq!(reply_code(&session.handle_line("MAIL FROM:<a@example.com>")), 250);
        assert_eq!(session.state(), SessionState::Recipients);
    }

    #[test]
    fn test_sequence_errors() {
        let mut session = greeted();
        assert_eq!(reply_code(&session.handle_line("RCPT TO:<b@void.test>")), 503);
        assert_eq!(reply_code(&session.handle_line("DATA")), 503);

        session.handle_line("MAIL FROM:<a@example.com>");
        assert_eq!(reply_code(&session.handle_line("MAIL FROM:<a@example.com>")), 503);
    }

    #[test]
    fn test_recipient_check_extracts_domain() {
        let mut session = greeted();
        session.handle_line("MAIL FROM:<a@example.com>");
        let step = session.handle_line("RCPT TO:<Bob@VOID.Test>");
        assert_eq!(
            step,
            Step::CheckRecipient {
                address: "Bob@VOID.Test".to_string(),
                domain: "void.test".to_string(),
            }
        );
    }

    #[test]
    fn test_rejected_recipient_is_excluded() {
        let mut session = greeted();
        session.handle_line("MAIL FROM:<a@example.com>");

        let rejected = add_recipient(&mut session, "RCPT TO:<x@elsewhere.test>", false);
        assert_eq!(rejected.to_wire(), "550 not relaying to elsewhere.test\r\n");
        let accepted = add_recipient(&mut session, "RCPT TO:<y@void.test>", true);
        assert_eq!(accepted.code, 250);

        assert_eq!(session.envelope().recipients, vec!["y@void.test".to_string()]);
    }

    #[test]
    fn test_data_without_recipients() {
        let mut session = greeted();
        session.handle_line("MAIL FROM:<a@example.com>");
        add_recipient(&mut session, "RCPT TO:<x@elsewhere.test>", false);

        let step = session.handle_line("DATA");
        assert_eq!(step, Step::Reply(Reply::new(554, "No valid recipients")));
    }

    #[test]
    fn test_full_transaction_then_another() {
        let mut session = greeted();
        session.handle_line("MAIL FROM:<>");
        add_recipient(&mut session, "RCPT TO:<y@void.test>", true);

        assert_eq!(session.handle_line("DATA"), Step::ReadData(Reply::data_start()));
        assert_eq!(session.state(), SessionState::Data);
        assert_eq!(reply_code(&session.handle_line("NOOP")), 503);

        let envelope = session.take_envelope().unwrap();
        assert_eq!(envelope.sender, None);
        assert_eq!(envelope.recipients, vec!["y@void.test".to_string()]);
        assert_eq!(session.state(), SessionState::Ready);
        assert!(session.take_envelope().is_none());

        assert_eq!(reply_code(&session.handle_line("MAIL FROM:<b@example.com>")), 250);
    }

    #[test]
    fn test_rset_clears_transaction() {
        let mut session = greeted();
        session.handle_line("MAIL FROM:<a@example.com>");
        add_recipient(&mut session, "RCPT TO:<y@void.test>", true);

        assert_eq!(reply_code(&session.handle_line("RSET")), 250);
        assert_eq!(session.state(), SessionState::Ready);
        assert!(session.envelope().recipients.is_empty());
        assert_eq!(reply_code(&session.handle_line("DATA")), 503);
    }

    #[test]
    fn test_helo_resets_transaction() {
        let mut session = greeted();
        session.handle_line("MAIL FROM:<a@example.com>");
        session.handle_line("HELO again.test");
        assert_eq!(session.state(), SessionState::Ready);
        assert_eq!(session.envelope(), &Envelope::default());
    }

    #[test]
    fn test_misc_commands() {
        let mut session = Session::new("mx.test");
        assert_eq!(reply_code(&session.handle_line("NOOP")), 250);
        assert_eq!(reply_code(&session.handle_line("VRFY someone")), 252);
        assert_eq!(reply_code(&session.handle_line("XYZZY")), 500);
        assert_eq!(reply_code(&session.handle_line("MAIL TO:<x>")), 501);
        assert_eq!(session.handle_line("QUIT"), Step::Close(Reply::bye()));
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[test]
    fn test_line_too_long() {
        let mut session = greeted();
        let long = format!("NOOP {}", "x".repeat(MAX_COMMAND_LINE));
        assert_eq!(
            session.handle_line(&long),
            Step::Reply(Reply::new(500, "Line too long"))
        );
        // 510 octets plus CRLF is still fine
        let fits = format!("NOOP {}", "x".repeat(MAX_COMMAND_LINE - 2 - 5));
        assert_eq!(reply_code(&session.handle_line(&fits)), 250);
    }
}
