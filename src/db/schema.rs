//! Database schema and migrations for voidmail.
//!
//! Foreign keys are declared without `ON DELETE CASCADE`. Every cascade
//! (domain to mailboxes to emails) is performed explicitly by the
//! repositories inside a single transaction.

/// Database migrations.
///
/// Each migration is a SQL script executed in order; the schema_version
/// table records which ones have been applied.
pub const MIGRATIONS: &[&str] = &[
    // v1: Mail domains
    r#"
CREATE TABLE domains (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    name        TEXT NOT NULL COLLATE NOCASE UNIQUE,
    is_active   INTEGER NOT NULL DEFAULT 1,
    created_at  TEXT NOT NULL
);

CREATE INDEX idx_domains_is_active ON domains(is_active);
"#,
    // v2: Mailboxes
    r#"
CREATE TABLE mailboxes (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    address     TEXT NOT NULL COLLATE NOCASE UNIQUE,   -- local@domain
    domain_id   INTEGER REFERENCES domains(id),
    token       TEXT NOT NULL UNIQUE,                  -- read capability
    created_at  TEXT NOT NULL,
    expires_at  TEXT NOT NULL
);

CREATE INDEX idx_mailboxes_expires_at ON mailboxes(expires_at);
CREATE INDEX idx_mailboxes_created_at ON mailboxes(created_at);
CREATE INDEX idx_mailboxes_domain_id ON mailboxes(domain_id);
"#,
    // v3: Received emails
    r#"
CREATE TABLE emails (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    mailbox_id  INTEGER NOT NULL REFERENCES mailboxes(id),
    sender      TEXT NOT NULL,
    recipient   TEXT NOT NULL,
    subject     TEXT NOT NULL DEFAULT '(no subject)',
    body_text   TEXT NOT NULL DEFAULT '',
    body_html   TEXT NOT NULL DEFAULT '',
    received_at TEXT NOT NULL,
    size_bytes  INTEGER NOT NULL DEFAULT 0,
    is_deleted  INTEGER NOT NULL DEFAULT 0             -- soft delete
);

CREATE INDEX idx_emails_mailbox_received ON emails(mailbox_id, received_at);
CREATE INDEX idx_emails_mailbox_deleted ON emails(mailbox_id, is_deleted);
"#,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_not_empty() {
        assert!(!MIGRATIONS.is_empty());
    }

    #[test]
    fn test_all_migrations_are_valid_sql() {
        for migration in MIGRATIONS {
            assert!(!migration.trim().is_empty());
            assert!(migration.contains("CREATE TABLE") || migration.contains("CREATE INDEX"));
        }
    }

    #[test]
    fn test_domains_migration() {
        let m = MIGRATIONS[0];
        assert!(m.contains("CREATE TABLE domains"));
        assert!(m.contains("COLLATE NOCASE UNIQUE"));
        assert!(m.contains("is_active"));
    }

    #[test]
    fn test_mailboxes_migration() {
        let m = MIGRATIONS[1];
        assert!(m.contains("CREATE TABLE mailboxes"));
        assert!(m.contains("token       TEXT NOT NULL UNIQUE"));
        assert!(m.contains("expires_at"));
        assert!(!m.contains("ON DELETE CASCADE"));
    }

    #[test]
    fn test_emails_migration() {
        let m = MIGRATIONS[2];
        assert!(m.contains("CREATE TABLE emails"));
        assert!(m.contains("REFERENCES mailboxes(id)"));
        assert!(m.contains("is_deleted"));
        assert!(!m.contains("ON DELETE CASCADE"));
    }
}
