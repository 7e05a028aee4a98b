//! SMTP replies.

/// Extensions advertised in the EHLO reply.
pub const EXTENSIONS: &[&str] = &["PIPELINING", "8BITMIME"];

/// A reply sent to the SMTP client, possibly spanning several lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Three-digit reply code.
    pub code: u16,
    /// Text lines; every line but the last is sent as `code-text`.
    pub lines: Vec<String>,
}

impl Reply {
    /// Create a single-line reply.
    pub fn new(code: u16, text: impl Into<String>) -> Self {
        Self {
            code,
            lines: vec![text.into()],
        }
    }

    /// Create a multi-line reply.
    pub fn multiline(code: u16, lines: Vec<String>) -> Self {
        Self { code, lines }
    }

    /// 220 service ready.
    pub fn greeting(hostname: &str) -> Self {
        Self::new(220, format!("{hostname} ESMTP"))
    }

    /// 250 reply to HELO.
    pub fn helo(hostname: &str) -> Self {
        Self::new(250, hostname)
    }

    /// 250 reply to EHLO listing the supported extensions.
    pub fn ehlo(hostname: &str) -> Self {
        let mut lines = vec![hostname.to_string()];
        lines.extend(EXTENSIONS.iter().map(|ext| ext.to_string()));
        Self::multiline(250, lines)
    }

    /// 250 OK.
    pub fn ok() -> Self {
        Self::new(250, "OK")
    }

    /// 250 after a message has been taken.
    pub fn message_accepted() -> Self {
        Self::new(250, "Message accepted")
    }

    /// 252 for VRFY; mailbox existence is never confirmed.
    pub fn cannot_verify() -> Self {
        Self::new(252, "Cannot VRFY user, but will accept message and attempt delivery")
    }

    /// 354 start of message input.
    pub fn data_start() -> Self {
        Self::new(354, "End data with <CR><LF>.<CR><LF>")
    }

    /// 221 closing.
    pub fn bye() -> Self {
        Self::new(221, "Bye")
    }

    /// 421 idle timeout.
    pub fn timeout(hostname: &str) -> Self {
        Self::new(421, format!("{hostname} Timeout, closing connection"))
    }

    /// 451 when the server could not process the message.
    pub fn local_error() -> Self {
        Self::new(451, "Requested action aborted: local error in processing")
    }

    /// 550 for a recipient whose domain is not served.
    pub fn not_relaying(domain: &str) -> Self {
        Self::new(550, format!("not relaying to {domain}"))
    }

    /// Wire form, CRLF-terminated.
    pub fn to_wire(&self) -> String {
        let mut out = String::new();
        let last = self.lines.len().saturating_sub(1);
        for (i, line) in self.lines.iter().enumerate() {
            let sep = if i == last { ' ' } else { '-' };
            out.push_str(&format!("{}{}{}\r\n", self.code, sep, line));
        }
        if self.lines.is_empty() {
            out.push_str(&format!("{}\r\n", self.code));
        }
        out
    }
}
