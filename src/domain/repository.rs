//! Domain repository for voidmail.

use chrono::Utc;

use super::types::{Domain, NewDomain};
use crate::datetime;
use crate::db::DbPool;
use crate::{Result, VoidmailError};

/// Repository for domain CRUD operations.
pub struct DomainRepository<'a> {
    pool: &'a DbPool,
}

impl<'a> DomainRepository<'a> {
    /// Create a new DomainRepository with the given pool reference.
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    /// Create a new domain.
    ///
    /// Fails with `Conflict` if a domain with the same name (ignoring case)
    /// already exists.
    pub async fn create(&self, new_domain: &NewDomain) -> Result<Domain> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO domains (name, is_active, created_at) VALUES (?, ?, ?) RETURNING id",
        )
        .bind(&new_domain.name)
        .bind(new_domain.is_active)
        .bind(datetime::to_db(&Utc::now()))
        .fetch_one(self.pool)
        .await?;

        self.get_by_id(id)
            .await?
            .ok_or_else(|| VoidmailError::NotFound("domain".to_string()))
    }

    /// Get a domain by ID.
    pub async fn get_by_id(&self, id: i64) -> Result<Option<Domain>> {
        let row: Option<DomainRow> = sqlx::query_as(
            "SELECT id, name, is_active, created_at FROM domains WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(DomainRow::into_domain))
    }

    /// Get a domain by name (case-insensitive).
    pub async fn get_by_name(&self, name: &str) -> Result<Option<Domain>> {
        let row: Option<DomainRow> = sqlx::query_as(
            "SELECT id, name, is_active, created_at FROM domains WHERE name = ? COLLATE NOCASE",
        )
        .bind(name)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(DomainRow::into_domain))
    }

    /// Whether an active domain with this name exists (case-insensitive).
    pub async fn is_active(&self, name: &str) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM domains WHERE name = ? COLLATE NOCASE AND is_active = 1)",
        )
        .bind(name)
        .fetch_one(self.pool)
        .await?;
        Ok(exists)
    }

    /// The lexicographically first active domain.
    pub async fn first_active(&self) -> Result<Option<Domain>> {
        let row: Option<DomainRow> = sqlx::query_as(
            "SELECT id, name, is_active, created_at FROM domains
             WHERE is_active = 1 ORDER BY name LIMIT 1",
        )
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(DomainRow::into_domain))
    }

    /// List all domains ordered by name.
    pub async fn list_all(&self) -> Result<Vec<Domain>> {
        let rows: Vec<DomainRow> = sqlx::query_as(
            "SELECT id, name, is_active, created_at FROM domains ORDER BY name",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(DomainRow::into_domain).collect())
    }

    /// List active domains ordered by name.
    pub async fn list_active(&self) -> Result<Vec<Domain>> {
        let rows: Vec<DomainRow> = sqlx::query_as(
            "SELECT id, name, is_active, created_at FROM domains WHERE is_active = 1 ORDER BY name",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(DomainRow::into_domain).collect())
    }

    /// Set the activation flag. Returns false if the domain does not exist.
    pub async fn set_active(&self, name: &str, is_active: bool) -> Result<bool> {
        let result = sqlx::query("UPDATE domains SET is_active = ? WHERE name = ? COLLATE NOCASE")
            .bind(is_active)
            .bind(name)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete a domain together with its mailboxes and their emails.
    ///
    /// The cascade runs in one transaction. Returns the number of mailboxes
    /// removed, or None if the domain does not exist.
    pub async fn delete_cascade(&self, name: &str) -> Result<Option<u64>> {
        let mut tx = self.pool.begin().await?;

        let id: Option<i64> = sqlx::query_scalar("SELECT id FROM domains WHERE name = ? COLLATE NOCASE")
            .bind(name)
            .fetch_optional(&mut *tx)
            .await?;
        let Some(id) = id else {
            return Ok(None);
        };

        sqlx::query(
            "DELETE FROM emails WHERE mailbox_id IN (SELECT id FROM mailboxes WHERE domain_id = ?)",
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;

        let mailboxes = sqlx::query("DELETE FROM mailboxes WHERE domain_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        sqlx::query("DELETE FROM domains WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(Some(mailboxes))
    }
}

/// Internal struct for mapping database rows to Domain.
#[derive(sqlx::FromRow)]
struct DomainRow {
    id: i64,
    name: String,
    is_active: bool,
    created_at: String,
}

impl DomainRow {
    fn into_domain(self) -> Domain {
        Domain {
            id: self.id,
            name: self.name,
            is_active: self.is_active,
            created_at: datetime::from_db_or_epoch(&self.created_at),
        }
    }
}
