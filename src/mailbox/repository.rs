//! Mailbox repository for voidmail.

use chrono::{DateTime, Utc};

use super::types::{Mailbox, NewMailbox};
use crate::datetime;
use crate::db::DbPool;
use crate::{Result, VoidmailError};

const MAILBOX_COLUMNS: &str = "id, address, domain_id, token, created_at, expires_at";

/// Repository for mailbox operations.
pub struct MailboxRepository<'a> {
    pool: &'a DbPool,
}

impl<'a> MailboxRepository<'a> {
    /// Create a new MailboxRepository with the given pool reference.
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    /// Insert a new mailbox.
    ///
    /// Fails with `Conflict` if the address (ignoring case) or the token is
    /// already taken.
    pub async fn create(&self, new_mailbox: &NewMailbox) -> Result<Mailbox> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO mailboxes (address, domain_id, token, created_at, expires_at)
             VALUES (?, ?, ?, ?, ?) RETURNING id",
        )
        .bind(&new_mailbox.address)
        .bind(new_mailbox.domain_id)
        .bind(&new_mailbox.token)
        .bind(datetime::to_db(&new_mailbox.created_at))
        .bind(datetime::to_db(&new_mailbox.expires_at))
        .fetch_one(self.pool)
        .await?;

        self.get_by_id(id)
            .await?
            .ok_or_else(|| VoidmailError::NotFound("mailbox".to_string()))
    }

    /// Get a mailbox by ID.
    pub async fn get_by_id(&self, id: i64) -> Result<Option<Mailbox>> {
        let sql = format!("SELECT {MAILBOX_COLUMNS} FROM mailboxes WHERE id = ?");
        let row: Option<MailboxRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(row.map(MailboxRow::into_mailbox))
    }

    /// Get a mailbox by its access token.
    pub async fn get_by_token(&self, token: &str) -> Result<Option<Mailbox>> {
        let sql = format!("SELECT {MAILBOX_COLUMNS} FROM mailboxes WHERE token = ?");
        let row: Option<MailboxRow> = sqlx::query_as(&sql)
            .bind(token)
            .fetch_optional(self.pool)
            .await?;
        Ok(row.map(MailboxRow::into_mailbox))
    }

    /// Get a mailbox by address (case-insensitive), expired or not.
    pub async fn get_by_address(&self, address: &str) -> Result<Option<Mailbox>> {
        let sql = format!("SELECT {MAILBOX_COLUMNS} FROM mailboxes WHERE address = ? COLLATE NOCASE");
        let row: Option<MailboxRow> = sqlx::query_as(&sql)
            .bind(address)
            .fetch_optional(self.pool)
            .await?;
        Ok(row.map(MailboxRow::into_mailbox))
    }

    /// Get a mailbox by address whose `expires_at` is strictly after `now`.
    pub async fn get_live_by_address(
        &self,
        address: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Mailbox>> {
        let sql = format!(
            "SELECT {MAILBOX_COLUMNS} FROM mailboxes
             WHERE address = ? COLLATE NOCASE AND expires_at > ?"
        );
        let row: Option<MailboxRow> = sqlx::query_as(&sql)
            .bind(address)
            .bind(datetime::to_db(&now))
            .fetch_optional(self.pool)
            .await?;
        Ok(row.map(MailboxRow::into_mailbox))
    }

    /// List mailboxes with `expires_at <= now`, oldest expiry first.
    pub async fn list_expired(&self, now: DateTime<Utc>) -> Result<Vec<Mailbox>> {
        let sql = format!(
            "SELECT {MAILBOX_COLUMNS} FROM mailboxes WHERE expires_at <= ? ORDER BY expires_at, id"
        );
        let rows: Vec<MailboxRow> = sqlx::query_as(&sql)
            .bind(datetime::to_db(&now))
            .fetch_all(self.pool)
            .await?;
        Ok(rows.into_iter().map(MailboxRow::into_mailbox).collect())
    }

    /// List mailboxes created before `cutoff` that hold no visible email.
    pub async fn list_empty_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<Mailbox>> {
        let sql = format!(
            "SELECT {MAILBOX_COLUMNS} FROM mailboxes m
             WHERE m.created_at < ?
               AND NOT EXISTS (SELECT 1 FROM emails e WHERE e.mailbox_id = m.id AND e.is_deleted = 0)
             ORDER BY m.created_at, m.id"
        );
        let rows: Vec<MailboxRow> = sqlx::query_as(&sql)
            .bind(datetime::to_db(&cutoff))
            .fetch_all(self.pool)
            .await?;
        Ok(rows.into_iter().map(MailboxRow::into_mailbox).collect())
    }

    /// Delete a mailbox and all of its emails if it has expired at `now`.
    ///
    /// Both deletes run in one transaction and both re-check expiry, so a
    /// mailbox is never removed on stale information. Returns false when the
    /// mailbox is gone or still live.
    pub async fn delete_if_expired(&self, id: i64, now: DateTime<Utc>) -> Result<bool> {
        let now = datetime::to_db(&now);
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "DELETE FROM emails WHERE mailbox_id = ?
               AND EXISTS (SELECT 1 FROM mailboxes WHERE id = ? AND expires_at <= ?)",
        )
        .bind(id)
        .bind(id)
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        let deleted = sqlx::query("DELETE FROM mailboxes WHERE id = ? AND expires_at <= ?")
            .bind(id)
            .bind(&now)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;
        Ok(deleted > 0)
    }

    /// Delete a mailbox created before `cutoff` if it holds no visible email.
    ///
    /// Soft-deleted emails go with it. The emptiness check is repeated
    /// inside the deleting transaction, so a mailbox that received mail after
    /// it was listed is kept. Returns true if the mailbox was removed.
    pub async fn delete_if_empty(&self, id: i64, cutoff: DateTime<Utc>) -> Result<bool> {
        let cutoff = datetime::to_db(&cutoff);
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "DELETE FROM emails WHERE mailbox_id = ?
               AND NOT EXISTS (SELECT 1 FROM emails WHERE mailbox_id = ? AND is_deleted = 0)
               AND EXISTS (SELECT 1 FROM mailboxes WHERE id = ? AND created_at < ?)",
        )
        .bind(id)
        .bind(id)
        .bind(id)
        .bind(&cutoff)
        .execute(&mut *tx)
        .await?;

        let deleted = sqlx::query(
            "DELETE FROM mailboxes WHERE id = ? AND created_at < ?
               AND NOT EXISTS (SELECT 1 FROM emails WHERE mailbox_id = ?)",
        )
        .bind(id)
        .bind(&cutoff)
        .bind(id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        tx.commit().await?;
        Ok(deleted > 0)
    }

    /// Count all mailboxes.
    pub async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM mailboxes")
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }
}

/// Internal struct for mapping database rows to Mailbox.
#[derive(sqlx::FromRow)]
struct MailboxRow {
    id: i64,
    address: String,
    domain_id: Option<i64>,
    token: String,
    created_at: String,
    expires_at: String,
}

impl MailboxRow {
    fn into_mailbox(self) -> Mailbox {
        Mailbox {
            id: self.id,
            address: self.address,
            domain_id: self.domain_id,
            token: self.token,
            created_at: datetime::from_db_or_epoch(&self.created_at),
            expires_at: datetime::from_db_or_epoch(&self.expires_at),
        }
    }
}
