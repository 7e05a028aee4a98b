//! Email module for voidmail.
//!
//! Persisted messages filed under a mailbox. Visibility (`is_deleted`) and
//! existence (row present) are independent: soft deletion only hides a row,
//! the row itself goes away when its mailbox is destroyed.

mod repository;
mod types;

pub use repository::EmailRepository;
pub use types::{
    normalize_subject, Email, EmailSummary, NewEmail, DEFAULT_SUBJECT, MAX_SUBJECT_BYTES,
    POLL_LIMIT,
};
