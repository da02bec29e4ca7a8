use anyhow::{Context, Result};
use clap::Args;

use crate::application::{
    ConfiguredNotifier, CyclePolicy, LedgerService, LogNotifier, OutboxNotifier,
};
use crate::domain::DailyTrigger;
use crate::storage::SqliteStore;

/// Default cap on stored bytes, the same budget a browser gives local storage
pub const DEFAULT_STORAGE_QUOTA: u64 = 5_000_000;

/// Runtime settings. Every option can also come from the environment.
#[derive(Args, Debug, Clone)]
pub struct Config {
    /// Database file path
    #[arg(short, long, global = true, env = "FERRECONTROL_DB", default_value = "ferrecontrol.db")]
    pub database: String,

    /// Local time of the daily close (HH:MM)
    #[arg(long, global = true, env = "FERRECONTROL_CLOSE_AT", default_value = "19:00")]
    pub close_at: String,

    /// Number of backups to keep
    #[arg(long, global = true, env = "FERRECONTROL_BACKUP_RETENTION", default_value_t = 10)]
    pub backup_retention: usize,

    /// Number of daily snapshots to keep (0 = keep all)
    #[arg(long, global = true, env = "FERRECONTROL_SNAPSHOT_RETENTION", default_value_t = 90)]
    pub snapshot_retention: usize,

    /// Maximum bytes the store may hold (0 = unlimited)
    #[arg(long, global = true, env = "FERRECONTROL_STORAGE_QUOTA", default_value_t = DEFAULT_STORAGE_QUOTA)]
    pub storage_quota: u64,

    /// Abort the daily close when the summary can't be delivered
    #[arg(long, global = true, env = "FERRECONTROL_NOTIFICATION_REQUIRED")]
    pub notification_required: bool,

    /// Minutes to wait before retrying a failed close
    #[arg(long, global = true, env = "FERRECONTROL_RETRY_MINUTES", default_value_t = 10)]
    pub retry_minutes: u32,

    /// Append daily summaries to this file instead of the log
    #[arg(long, global = true, env = "FERRECONTROL_OUTBOX")]
    pub outbox: Option<String>,
}

pub type AppService = LedgerService<SqliteStore, ConfiguredNotifier>;

impl Config {
    pub fn trigger(&self) -> Result<DailyTrigger> {
        DailyTrigger::parse(&self.close_at).with_context(|| {
            format!("Invalid close time '{}'. Use HH:MM", self.close_at)
        })
    }

    pub fn cycle_policy(&self) -> CyclePolicy {
        CyclePolicy {
            notification_required: self.notification_required,
            backup_retention: self.backup_retention,
            snapshot_retention: self.snapshot_retention,
        }
    }

    pub fn retry_interval(&self) -> chrono::Duration {
        chrono::Duration::minutes(i64::from(self.retry_minutes.max(1)))
    }

    pub fn storage_quota(&self) -> Option<u64> {
        (self.storage_quota > 0).then_some(self.storage_quota)
    }

    pub fn notifier(&self) -> ConfiguredNotifier {
        match &self.outbox {
            Some(path) => ConfiguredNotifier::Outbox(OutboxNotifier::new(path)),
            None => ConfiguredNotifier::Log(LogNotifier),
        }
    }

    /// Create the database if needed and apply migrations.
    pub async fn init_service(&self) -> Result<AppService> {
        let url = format!("sqlite:{}?mode=rwc", self.database);
        let store = SqliteStore::init(&url).await?;
        Ok(self.service(store))
    }

    /// Open an existing database.
    pub async fn open_service(&self) -> Result<AppService> {
        let url = format!("sqlite:{}", self.database);
        let store = SqliteStore::connect(&url)
            .await
            .with_context(|| format!("Cannot open '{}'. Run `ferrecontrol init` first", self.database))?;
        Ok(self.service(store))
    }

    fn service(&self, store: SqliteStore) -> AppService {
        LedgerService::new(
            store.with_quota(self.storage_quota()),
            self.notifier(),
            self.cycle_policy(),
        )
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        config: Config,
    }

    fn parse(args: &[&str]) -> Config {
        Harness::parse_from(std::iter::once("ferrecontrol").chain(args.iter().copied())).config
    }

    #[test]
    fn test_defaults() {
        let config = parse(&[]);

        assert_eq!(config.trigger().unwrap(), DailyTrigger::default());
        assert_eq!(config.cycle_policy(), CyclePolicy::default());
        assert_eq!(config.storage_quota(), Some(DEFAULT_STORAGE_QUOTA));
        assert_eq!(config.retry_interval(), chrono::Duration::minutes(10));
        assert!(matches!(config.notifier(), ConfiguredNotifier::Log(_)));
    }

    #[test]
    fn test_zero_quota_is_unlimited() {
        let config = parse(&["--storage-quota", "0", "--close-at", "20:30"]);

        assert_eq!(config.storage_quota(), None);
        assert_eq!(config.trigger().unwrap().to_string(), "20:30");
    }

    #[test]
    fn test_retention_flags() {
        let config = parse(&["--backup-retention", "4", "--snapshot-retention", "0"]);
        let policy = config.cycle_policy();

        assert_eq!(policy.backup_retention, 4);
        assert_eq!(policy.snapshot_retention, 0);
    }

    #[test]
    fn test_bad_close_time() {
        let config = parse(&["--close-at", "7pm"]);
        assert!(config.trigger().is_err());
    }
}
