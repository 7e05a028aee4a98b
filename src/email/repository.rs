//! Email repository for voidmail.

use chrono::{DateTime, Utc};

use super::types::{Email, NewEmail};
use crate::datetime;
use crate::db::DbPool;
use crate::Result;

const EMAIL_COLUMNS: &str = "id, mailbox_id, sender, recipient, subject, body_text, body_html,
                             received_at, size_bytes, is_deleted";

/// Repository for email operations.
pub struct EmailRepository<'a> {
    pool: &'a DbPool,
}

impl<'a> EmailRepository<'a> {
    /// Create a new EmailRepository with the given pool reference.
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    /// Store an email if its mailbox is still live at `now`.
    ///
    /// The liveness check and the insert are one statement, so an email can
    /// never be attached to a mailbox that has expired or been deleted.
    /// Returns None when the mailbox is gone or expired.
    pub async fn create_if_live(&self, email: &NewEmail, now: DateTime<Utc>) -> Result<Option<Email>> {
        let now = datetime::to_db(&now);
        let id: Option<i64> = sqlx::query_scalar(
            "INSERT INTO emails (mailbox_id, sender, recipient, subject, body_text, body_html,
                                 received_at, size_bytes)
             SELECT id, ?, ?, ?, ?, ?, ?, ? FROM mailboxes WHERE id = ? AND expires_at > ?
             RETURNING id",
        )
        .bind(&email.sender)
        .bind(&email.recipient)
        .bind(&email.subject)
        .bind(&email.body_text)
        .bind(&email.body_html)
        .bind(&now)
        .bind(email.size_bytes)
        .bind(email.mailbox_id)
        .bind(&now)
        .fetch_optional(self.pool)
        .await?;

        match id {
            Some(id) => self.get_by_id(id).await,
            None => Ok(None),
        }
    }

    /// Get an email by ID, including soft-deleted ones.
    pub async fn get_by_id(&self, id: i64) -> Result<Option<Email>> {
        let sql = format!("SELECT {EMAIL_COLUMNS} FROM emails WHERE id = ?");
        let row: Option<EmailRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(row.map(EmailRow::into_email))
    }

    /// Get an email by ID unless it has been soft-deleted.
    pub async fn get_visible(&self, id: i64) -> Result<Option<Email>> {
        let sql = format!("SELECT {EMAIL_COLUMNS} FROM emails WHERE id = ? AND is_deleted = 0");
        let row: Option<EmailRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(row.map(EmailRow::into_email))
    }

    /// List visible emails of a mailbox, newest first.
    ///
    /// With `since`, only emails received strictly after it are returned.
    pub async fn list_visible(
        &self,
        mailbox_id: i64,
        since: Option<DateTime<Utc>>,
        limit: i64,
    ) -> Result<Vec<Email>> {
        let rows: Vec<EmailRow> = match since {
            Some(since) => {
                let sql = format!(
                    "SELECT {EMAIL_COLUMNS} FROM emails
                     WHERE mailbox_id = ? AND is_deleted = 0 AND received_at > ?
                     ORDER BY received_at DESC, id DESC LIMIT ?"
                );
                sqlx::query_as(&sql)
                    .bind(mailbox_id)
                    .bind(datetime::to_db(&since))
                    .bind(limit)
                    .fetch_all(self.pool)
                    .await?
            }
            None => {
                let sql = format!(
                    "SELECT {EMAIL_COLUMNS} FROM emails
                     WHERE mailbox_id = ? AND is_deleted = 0
                     ORDER BY received_at DESC, id DESC LIMIT ?"
                );
                sqlx::query_as(&sql)
                    .bind(mailbox_id)
                    .bind(limit)
                    .fetch_all(self.pool)
                    .await?
            }
        };
        Ok(rows.into_iter().map(EmailRow::into_email).collect())
    }

    /// Count visible emails of a mailbox.
    pub async fn count_visible(&self, mailbox_id: i64) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM emails WHERE mailbox_id = ? AND is_deleted = 0",
        )
        .bind(mailbox_id)
        .fetch_one(self.pool)
        .await?;
        Ok(count)
    }

    /// Count all stored emails.
    pub async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM emails")
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }

    /// Soft-delete an email. Returns false if it does not exist.
    pub async fn soft_delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("UPDATE emails SET is_deleted = 1 WHERE id = ?")
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

/// Internal struct for mapping database rows to Email.
#[derive(sqlx::FromRow)]
struct EmailRow {
    id: i64,
    mailbox_id: i64,
    sender: String,
    recipient: String,
    subject: String,
    body_text: String,
    body_html: String,
    received_at: String,
    size_bytes: i64,
    is_deleted: bool,
}

impl EmailRow {
    fn into_email(self) -> Email {
        Email {
            id: self.id,
            mailbox_id: self.mailbox_id,
            sender: self.sender,
            recipient: self.recipient,
            subject: self.subject,
            body_text: self.body_text,
            body_html: self.body_html,
            received_at: datetime::from_db_or_epoch(&self.received_at),
            size_bytes: self.size_bytes,
            is_deleted: self.is_deleted,
        }
    }
}
