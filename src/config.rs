//! Configuration module for voidmail.
//!
//! Configuration is read once at startup from a TOML file, overridden from
//! the environment, validated, and then handed to components by value. Nothing
//! reads configuration from global state afterwards.

use serde::Deserialize;
use std::path::Path;

use crate::{Result, VoidmailError};

/// SMTP listener configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    /// Host address to bind.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port number to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Hostname announced in the greeting and HELO/EHLO replies.
    #[serde(default = "default_hostname")]
    pub hostname: String,
    /// Maximum number of concurrent SMTP sessions.
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    /// Seconds a session may stay silent before it is dropped.
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    2525
}

fn default_hostname() -> String {
    "voidmail.local".to_string()
}

fn default_max_connections() -> usize {
    100
}

fn default_idle_timeout() -> u64 {
    300
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            hostname: default_hostname(),
            max_connections: default_max_connections(),
            idle_timeout_secs: default_idle_timeout(),
        }
    }
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: String,
}

fn default_db_path() -> String {
    "data/voidmail.db".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Mailbox lifecycle configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MailboxConfig {
    /// Lifetime of a mailbox in minutes, counted from creation.
    #[serde(default = "default_ttl_minutes")]
    pub ttl_minutes: u64,
}

fn default_ttl_minutes() -> u64 {
    60
}

impl Default for MailboxConfig {
    fn default() -> Self {
        Self {
            ttl_minutes: default_ttl_minutes(),
        }
    }
}

impl MailboxConfig {
    /// The mailbox time-to-live as a chrono duration.
    pub fn ttl(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.ttl_minutes as i64)
    }
}

/// Domains ensured to exist (active) at startup.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DomainsConfig {
    /// Domain names to create if missing.
    #[serde(default)]
    pub seed: Vec<String>,
}

/// Reconciler configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CleanupConfig {
    /// Seconds between expiry sweeps.
    #[serde(default = "default_cleanup_interval")]
    pub interval_secs: u64,
    /// Seconds between empty-mailbox sweeps.
    #[serde(default = "default_empty_interval")]
    pub empty_interval_secs: u64,
    /// Minimum age in minutes before an empty mailbox may be purged.
    #[serde(default = "default_empty_grace")]
    pub empty_grace_minutes: u64,
}

fn default_cleanup_interval() -> u64 {
    60
}

fn default_empty_interval() -> u64 {
    3600 // hourly
}

fn default_empty_grace() -> u64 {
    60
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_cleanup_interval(),
            empty_interval_secs: default_empty_interval(),
            empty_grace_minutes: default_empty_grace(),
        }
    }
}

impl CleanupConfig {
    /// Grace period for the empty-mailbox sweep.
    pub fn empty_grace(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.empty_grace_minutes as i64)
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Path to the log file. Empty disables file logging.
    #[serde(default = "default_log_file")]
    pub file: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> String {
    "logs/voidmail.log".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
        }
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// SMTP listener configuration.
    #[serde(default)]
    pub smtp: SmtpConfig,
    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Mailbox lifecycle configuration.
    #[serde(default)]
    pub mailbox: MailboxConfig,
    /// Seeded domains.
    #[serde(default)]
    pub domains: DomainsConfig,
    /// Reconciler configuration.
    #[serde(default)]
    pub cleanup: CleanupConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(VoidmailError::Io)?;
        Self::parse(&content)
    }

    /// Load configuration from a TOML file and apply environment variable overrides.
    ///
    /// A missing file is not an error: defaults are used instead.
    pub fn load_with_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = if path.as_ref().exists() {
            Self::load(path)?
        } else {
            Self::default()
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| VoidmailError::Config(format!("config parse error: {e}")))
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Supported environment variables:
    /// - `VOIDMAIL_SMTP_HOST`
    /// - `VOIDMAIL_SMTP_PORT`
    /// - `VOIDMAIL_DATABASE_PATH`
    /// - `VOIDMAIL_MAILBOX_TTL_MINUTES`
    /// - `VOIDMAIL_MAIL_DOMAIN`: appended to the seeded domains
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(host) = get("VOIDMAIL_SMTP_HOST") {
            self.smtp.host = host;
        }
        if let Some(port) = get("VOIDMAIL_SMTP_PORT").and_then(|v| v.trim().parse().ok()) {
            self.smtp.port = port;
        }
        if let Some(path) = get("VOIDMAIL_DATABASE_PATH") {
            self.database.path = path;
        }
        if let Some(ttl) = get("VOIDMAIL_MAILBOX_TTL_MINUTES").and_then(|v| v.trim().parse().ok())
        {
            self.mailbox.ttl_minutes = ttl;
        }
        if let Some(domain) = get("VOIDMAIL_MAIL_DOMAIN") {
            let domain = domain.trim().to_lowercase();
            if !self.domains.seed.iter().any(|d| d.eq_ignore_ascii_case(&domain)) {
                self.domains.seed.push(domain);
            }
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.mailbox.ttl_minutes == 0 {
            return Err(VoidmailError::Config(
                "mailbox.ttl_minutes must be greater than zero".to_string(),
            ));
        }
        if self.cleanup.interval_secs == 0 || self.cleanup.empty_interval_secs == 0 {
            return Err(VoidmailError::Config(
                "cleanup intervals must be greater than zero".to_string(),
            ));
        }
        if self.smtp.max_connections == 0 {
            return Err(VoidmailError::Config(
                "smtp.max_connections must be greater than zero".to_string(),
            ));
        }
        if self.smtp.hostname.trim().is_empty() {
            return Err(VoidmailError::Config(
                "smtp.hostname must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
