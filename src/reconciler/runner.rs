//! Background reconciler for voidmail.
//!
//! Runs the expiry sweep and the empty-mailbox sweep on their own timers
//! against the shared store. The sweeps are independent: one failing never
//! keeps the other from running.

use std::future::Future;

use serde::Serialize;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{error, info};

use super::cleanup::{CleanupService, EmptySweepReport, SweepReport};
use crate::config::CleanupConfig;
use crate::db::Database;

/// Outcome of one reconciler pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PassReport {
    /// Expiry sweep result; None when the sweep failed.
    pub expired: Option<SweepReport>,
    /// Empty sweep result; None when disabled or failed.
    pub empty: Option<EmptySweepReport>,
    /// Sweeps that failed as a whole and will be retried next pass.
    pub failed_sweeps: usize,
}

/// Periodic expiry and empty-mailbox reconciler.
pub struct Reconciler {
    db: Database,
    expiry_interval: Duration,
    empty_interval: Option<Duration>,
    empty_grace: chrono::Duration,
    empty_dry_run: bool,
}

impl Reconciler {
    /// Create a reconciler running both sweeps per `config`.
    pub fn new(db: Database, config: &CleanupConfig) -> Self {
        Self {
            db,
            expiry_interval: Duration::from_secs(config.interval_secs),
            empty_interval: Some(Duration::from_secs(config.empty_interval_secs)),
            empty_grace: config.empty_grace(),
            empty_dry_run: false,
        }
    }

    /// Run both enabled sweeps every `secs` seconds.
    pub fn with_interval(mut self, secs: u64) -> Self {
        self.expiry_interval = Duration::from_secs(secs);
        if self.empty_interval.is_some() {
            self.empty_interval = Some(Duration::from_secs(secs));
        }
        self
    }

    /// Override the minimum age of an empty mailbox before it is purged.
    pub fn with_empty_grace(mut self, grace: chrono::Duration) -> Self {
        self.empty_grace = grace;
        self
    }

    /// Only report empty-sweep candidates instead of deleting them.
    pub fn with_empty_dry_run(mut self, dry_run: bool) -> Self {
        self.empty_dry_run = dry_run;
        self
    }

    /// Run the expiry sweep only.
    pub fn without_empty_sweep(mut self) -> Self {
        self.empty_interval = None;
        self
    }

    /// Expiry sweep interval.
    pub fn expiry_interval(&self) -> Duration {
        self.expiry_interval
    }

    /// Empty sweep interval, if that sweep is enabled.
    pub fn empty_interval(&self) -> Option<Duration> {
        self.empty_interval
    }

    /// Run each enabled sweep once.
    ///
    /// A failing sweep is logged and counted in
    /// [`PassReport::failed_sweeps`]; the other sweep still runs.
    pub async fn run_once(&self) -> PassReport {
        let cleanup = CleanupService::new(&self.db);
        let mut report = PassReport {
            expired: self.sweep_expired(&cleanup).await,
            ..PassReport::default()
        };
        if report.expired.is_none() {
            report.failed_sweeps += 1;
        }
        if self.empty_interval.is_some() {
            report.empty = self.sweep_empty(&cleanup).await;
            if report.empty.is_none() {
                report.failed_sweeps += 1;
            }
        }
        report
    }

    /// Run until `shutdown` completes.
    ///
    /// Both timers fire immediately, then at their intervals. A failing
    /// sweep is logged and retried on its next tick.
    pub async fn run<F>(&self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        info!(
            "Reconciler started (expiry every {}s, empty sweep {})",
            self.expiry_interval.as_secs(),
            match self.empty_interval {
                Some(every) if self.empty_dry_run => format!("every {}s, dry run", every.as_secs()),
                Some(every) => format!("every {}s", every.as_secs()),
                None => "disabled".to_string(),
            }
        );

        let mut expiry_timer = interval(self.expiry_interval);
        expiry_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut empty_timer = interval(self.empty_interval.unwrap_or(self.expiry_interval));
        empty_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let empty_enabled = self.empty_interval.is_some();

        tokio::pin!(shutdown);
        let cleanup = CleanupService::new(&self.db);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Reconciler stopped");
                    return;
                }
                _ = expiry_timer.tick() => {
                    self.sweep_expired(&cleanup).await;
                }
                _ = empty_timer.tick(), if empty_enabled => {
                    self.sweep_empty(&cleanup).await;
                }
            }
        }
    }

    async fn sweep_expired(&self, cleanup: &CleanupService<'_>) -> Option<SweepReport> {
        match cleanup.sweep_expired().await {
            Ok(report) => Some(report),
            Err(e) => {
                error!("Expiry sweep failed: {}", e);
                None
            }
        }
    }

    async fn sweep_empty(&self, cleanup: &CleanupService<'_>) -> Option<EmptySweepReport> {
        match cleanup.sweep_empty(self.empty_grace, self.empty_dry_run).await {
            Ok(report) => Some(report),
            Err(e) => {
                error!("Empty sweep failed: {}", e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mailbox::{MailboxRepository, NewMailbox};
    use chrono::Utc;

    fn config() -> CleanupConfig {
        CleanupConfig {
            interval_secs: 1,
            empty_interval_secs: 1,
            empty_grace_minutes: 60,
        }
    }

    async fn seed(db: &Database) {
        let repo = MailboxRepository::new(db.pool());
        let now = Utc::now();
        repo.create(&NewMailbox::with_ttl(
            "expired@test",
            None,
            now - chrono::Duration::hours(2),
            chrono::Duration::hours(1),
        ))
        .await
        .unwrap();
        repo.create(&NewMailbox::with_ttl(
            "empty@test",
            None,
            now - chrono::Duration::hours(2),
            chrono::Duration::hours(24),
        ))
        .await
        .unwrap();
        repo.create(&NewMailbox::with_ttl("fresh@test", None, now, chrono::Duration::hours(1)))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_builder() {
        let db = Database::open_in_memory().await.unwrap();
        let reconciler = Reconciler::new(db, &config()).with_interval(30);
        assert_eq!(reconciler.expiry_interval(), Duration::from_secs(30));
        assert_eq!(reconciler.empty_interval(), Some(Duration::from_secs(30)));
        assert_eq!(reconciler.without_empty_sweep().empty_interval(), None);
    }

    #[tokio::test]
    async fn test_run_once_runs_both_sweeps() {
        let db = Database::open_in_memory().await.unwrap();
        seed(&db).await;

        let reconciler = Reconciler::new(db.clone(), &config());
        let report = reconciler.run_once().await;
        assert_eq!(report.failed_sweeps, 0);
        assert_eq!(report.expired.unwrap().removed, 1);
        assert_eq!(report.empty.unwrap().removed, 1);
        assert_eq!(MailboxRepository::new(db.pool()).count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_run_once_empty_dry_run() {
        let db = Database::open_in_memory().await.unwrap();
        seed(&db).await;

        let reconciler = Reconciler::new(db.clone(), &config()).with_empty_dry_run(true);
        let report = reconciler.run_once().await;
        assert_eq!(report.expired.unwrap().removed, 1);

        let empty = report.empty.unwrap();
        assert!(empty.dry_run);
        assert_eq!(empty.candidates.len(), 1);
        assert_eq!(empty.candidates[0].address, "empty@test");
        assert_eq!(empty.removed, 0);
        assert_eq!(MailboxRepository::new(db.pool()).count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_run_once_empty_grace_override() {
        let db = Database::open_in_memory().await.unwrap();
        seed(&db).await;

        // Two-hour-old empty mailbox is within a three-hour grace period.
        let reconciler = Reconciler::new(db.clone(), &config())
            .with_empty_grace(chrono::Duration::hours(3));
        let report = reconciler.run_once().await;
        assert_eq!(report.empty.unwrap().removed, 0);
        assert_eq!(MailboxRepository::new(db.pool()).count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_run_once_expiry_only() {
        let db = Database::open_in_memory().await.unwrap();
        seed(&db).await;

        let reconciler = Reconciler::new(db.clone(), &config()).without_empty_sweep();
        let report = reconciler.run_once().await;
        assert_eq!(report.expired.unwrap().removed, 1);
        assert!(report.empty.is_none());
        assert_eq!(report.failed_sweeps, 0);
        assert_eq!(MailboxRepository::new(db.pool()).count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_run_once_attempts_empty_sweep_after_expiry_failure() {
        let db = Database::open_in_memory().await.unwrap();
        let reconciler = Reconciler::new(db.clone(), &config());
        db.close().await;

        let report = reconciler.run_once().await;
        assert!(report.expired.is_none());
        assert!(report.empty.is_none());
        assert_eq!(report.failed_sweeps, 2);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let db = Database::open_in_memory().await.unwrap();
        seed(&db).await;

        let reconciler = Reconciler::new(db.clone(), &config());
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            reconciler
                .run(async {
                    let _ = rx.await;
                })
                .await;
        });

        // Both timers fire immediately.
        let repo = MailboxRepository::new(db.pool());
        for _ in 0..50 {
            if repo.count().await.unwrap() == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(repo.count().await.unwrap(), 1);

        tx.send(()).unwrap();
        handle.await.unwrap();
    }
}
