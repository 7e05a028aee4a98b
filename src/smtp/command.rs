//! SMTP command parsing.

use super::error::SmtpError;

/// A parsed SMTP command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// HELO with the client's name.
    Helo(String),
    /// EHLO with the client's name.
    Ehlo(String),
    /// MAIL FROM; None for the null reverse path `<>`.
    Mail(Option<String>),
    /// RCPT TO with the forward path.
    Rcpt(String),
    /// DATA.
    Data,
    /// RSET.
    Rset,
    /// NOOP.
    Noop,
    /// QUIT.
    Quit,
    /// VRFY with its argument.
    Vrfy(String),
}

impl Command {
    /// Parse a command line without its line terminator.
    pub fn parse(line: &str) -> Result<Self, SmtpError> {
        let line = line.trim();
        let (verb, arg) = match line.split_once(char::is_whitespace) {
            Some((verb, arg)) => (verb, arg.trim()),
            None => (line, ""),
        };

        match verb.to_ascii_uppercase().as_str() {
            "HELO" => Ok(Command::Helo(require_arg(arg, "HELO hostname")?)),
            "EHLO" => Ok(Command::Ehlo(require_arg(arg, "EHLO hostname")?)),
            "MAIL" => {
                let path = parse_path(arg, "FROM:").ok_or_else(|| {
                    SmtpError::Syntax("MAIL FROM:<address>".to_string())
                })?;
                Ok(Command::Mail((!path.is_empty()).then_some(path)))
            }
            "RCPT" => match parse_path(arg, "TO:") {
                Some(path) if !path.is_empty() => Ok(Command::Rcpt(path)),
                _ => Err(SmtpError::Syntax("RCPT TO:<address>".to_string())),
            },
            "DATA" => no_arg(arg, Command::Data, "DATA"),
            "RSET" => no_arg(arg, Command::Rset, "RSET"),
            // NOOP may carry a string that is ignored (RFC 5321 4.1.1.9).
            "NOOP" => Ok(Command::Noop),
            "QUIT" => no_arg(arg, Command::Quit, "QUIT"),
            "VRFY" => Ok(Command::Vrfy(require_arg(arg, "VRFY <address>")?)),
            "" => Err(SmtpError::UnknownCommand(String::new())),
            other => Err(SmtpError::UnknownCommand(other.to_string())),
        }
    }
}

fn require_arg(arg: &str, usage: &str) -> Result<String, SmtpError> {
    if arg.is_empty() {
        return Err(SmtpError::Syntax(usage.to_string()));
    }
    Ok(arg.to_string())
}

fn no_arg(arg: &str, command: Command, usage: &str) -> Result<Command, SmtpError> {
    if arg.is_empty() {
        Ok(command)
    } else {
        Err(SmtpError::Syntax(usage.to_string()))
    }
}

/// Extract the path from `FROM:<path> [params]` or `TO:<path> [params]`.
///
/// The keyword is matched case-insensitively, whitespace after the colon and
/// a missing pair of angle brackets are tolerated, ESMTP parameters and
/// source routes are dropped.
fn parse_path(arg: &str, keyword: &str) -> Option<String> {
    let head = arg.get(..keyword.len())?;
    if !head.eq_ignore_ascii_case(keyword) {
        return None;
    }
    let rest = arg[keyword.len()..].trim_start();

    let path = if let Some(inner) = rest.strip_prefix('<') {
        let end = inner.find('>')?;
        &inner[..end]
    } else {
        rest.split_whitespace().next()?
    };

    // "@relay1,@relay2:user@example.com"
    let path = match path.strip_prefix('@') {
        Some(_) => path.rsplit_once(':').map(|(_, p)| p)?,
        None => path,
    };

    let path = path.trim();
    if path.chars().any(char::is_whitespace) {
        return None;
    }
    Some(path.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_greetings() {
        assert_eq!(Command::parse("HELO client.test"), Ok(Command::Helo("client.test".into())));
        assert_eq!(Command::parse("ehlo client.test"), Ok(Command::Ehlo("client.test".into())));
        assert!(matches!(Command::parse("HELO"), Err(SmtpError::Syntax(_))));
    }

    #[test]
    fn test_parse_mail_from() {
        assert_eq!(
            Command::parse("MAIL FROM:<alice@example.com>"),
            Ok(Command::Mail(Some("alice@example.com".into())))
        );
        assert_eq!(
            Command::parse("mail from: <alice@example.com> BODY=8BITMIME SIZE=1200"),
            Ok(Command::Mail(Some("alice@example.com".into())))
        );
        assert_eq!(Command::parse("MAIL FROM:<>"), Ok(Command::Mail(None)));
        assert_eq!(
            Command::parse("MAIL FROM:bare@example.com"),
            Ok(Command::Mail(Some("bare@example.com".into())))
        );
        assert!(matches!(Command::parse("MAIL alice@example.com"), Err(SmtpError::Syntax(_))));
        assert!(matches!(Command::parse("MAIL FROM:<unclosed"), Err(SmtpError::Syntax(_))));
    }

    #[test]
    fn test_parse_rcpt_to() {
        assert_eq!(
            Command::parse("RCPT TO:<Bob@Void.Test>"),
            Ok(Command::Rcpt("Bob@Void.Test".into()))
        );
        assert_eq!(
            Command::parse("RCPT TO:<@relay.test:bob@void.test>"),
            Ok(Command::Rcpt("bob@void.test".into()))
        );
        assert!(matches!(Command::parse("RCPT TO:<>"), Err(SmtpError::Syntax(_))));
        assert!(matches!(Command::parse("RCPT"), Err(SmtpError::Syntax(_))));
    }

    #[test]
    fn test_parse_simple_commands() {
        assert_eq!(Command::parse("DATA"), Ok(Command::Data));
        assert_eq!(Command::parse("rset"), Ok(Command::Rset));
        assert_eq!(Command::parse("NOOP anything"), Ok(Command::Noop));
        assert_eq!(Command::parse("QUIT"), Ok(Command::Quit));
        assert_eq!(Command::parse("VRFY bob"), Ok(Command::Vrfy("bob".into())));
        assert!(matches!(Command::parse("DATA now"), Err(SmtpError::Syntax(_))));
    }

    #[test]
    fn test_parse_unknown() {
        assert_eq!(
            Command::parse("XYZZY plugh"),
            Err(SmtpError::UnknownCommand("XYZZY".into()))
        );
        assert!(matches!(Command::parse(""), Err(SmtpError::UnknownCommand(_))));
    }
}
