//! Reconciler module for voidmail.
//!
//! The only component that deletes mailboxes in the background:
//! - Expiry sweep: mailboxes past `expires_at`, with all their emails
//! - Empty sweep: mailboxes older than a grace period without visible mail

mod cleanup;
mod runner;

pub use cleanup::{CleanupService, EmptySweepReport, SweepCandidate, SweepReport};
pub use runner::{PassReport, Reconciler};
