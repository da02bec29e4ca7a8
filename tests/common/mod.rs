// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use chrono::{DateTime, FixedOffset, Utc};
use ferrecontrol::application::{CyclePolicy, LedgerService, Notifier, NotifyError};
use ferrecontrol::domain::{
    CardReceipt, CashPayment, CounterSale, PaymentMethod, Settlement, SupplierPayment,
};
use ferrecontrol::storage::{KeyValueStore, SqliteStore, StoreError, WriteBatch, WriteOp};
use tempfile::TempDir;

pub type TestService = LedgerService<SqliteStore, RecordingNotifier>;

/// Helper to create a test service with a temporary database
pub async fn test_service() -> Result<(TestService, RecordingNotifier, TempDir)> {
    test_service_with(CyclePolicy::default(), None).await
}

pub async fn test_service_with(
    policy: CyclePolicy,
    quota_bytes: Option<u64>,
) -> Result<(TestService, RecordingNotifier, TempDir)> {
    let temp_dir = TempDir::new()?;
    let store = open_store(&temp_dir, quota_bytes).await?;
    let notifier = RecordingNotifier::default();
    let service = LedgerService::new(store, notifier.clone(), policy);
    Ok((service, notifier, temp_dir))
}

/// Open (or create) the database inside `dir`.
pub async fn open_store(dir: &TempDir, quota_bytes: Option<u64>) -> Result<SqliteStore> {
    let db_path = dir.path().join("test.db");
    let url = format!("sqlite:{}?mode=rwc", db_path.display());
    Ok(SqliteStore::init(&url).await?.with_quota(quota_bytes))
}

/// Parse an RFC 3339 instant with its offset, e.g. "2024-06-03T19:00:00-03:00".
pub fn at(s: &str) -> DateTime<FixedOffset> {
    DateTime::parse_from_rfc3339(s).unwrap()
}

pub fn utc(s: &str) -> DateTime<Utc> {
    at(s).with_timezone(&Utc)
}

/// Record the reference day: a 100.00 card receipt with a 5.00 fee, a 50.00
/// cash sale, a 30.00 cash supplier payment and a 10.00 cash payment.
pub async fn record_reference_day<S: KeyValueStore, N: Notifier>(
    service: &LedgerService<S, N>,
    when: DateTime<Utc>,
) -> Result<()> {
    service
        .record(CardReceipt::new("Taladro percutor", 10000, 500, when).into())
        .await?;
    service
        .record(CounterSale::new("Tornillos", 5000, Settlement::Cash, when).into())
        .await?;
    service
        .record(
            SupplierPayment::new("Bulonera Norte", "Factura 0012", 3000, PaymentMethod::Cash, when)
                .into(),
        )
        .await?;
    service
        .record(CashPayment::new("Cadete", "Envío", 1000, when).into())
        .await?;
    Ok(())
}

/// Notifier that keeps every message and can be switched to fail.
#[derive(Clone, Default)]
pub struct RecordingNotifier {
    messages: Arc<Mutex<Vec<String>>>,
    failing: Arc<AtomicBool>,
}

impl RecordingNotifier {
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

impl Notifier for RecordingNotifier {
    async fn send(&self, message: &str) -> Result<(), NotifyError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(NotifyError("gateway unreachable".into()));
        }
        self.messages.lock().unwrap().push(message.to_string());
        Ok(())
    }
}

/// Store wrapper whose batch commits can be made to fail.
pub struct FlakyStore<S> {
    inner: S,
    fail_commits: AtomicBool,
    fail_prunes: AtomicBool,
}

impl<S> FlakyStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            fail_commits: AtomicBool::new(false),
            fail_prunes: AtomicBool::new(false),
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.fail_commits.store(failing, Ordering::SeqCst);
    }

    /// Fail only batches made entirely of removals, such as backup pruning.
    pub fn set_failing_prunes(&self, failing: bool) {
        self.fail_prunes.store(failing, Ordering::SeqCst);
    }
}

impl<S: KeyValueStore> KeyValueStore for FlakyStore<S> {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<(), StoreError> {
        self.inner.set(key, value).await
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.inner.remove(key).await
    }

    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        self.inner.keys_with_prefix(prefix).await
    }

    async fn commit(&self, batch: WriteBatch) -> Result<(), StoreError> {
        if self.fail_commits.load(Ordering::SeqCst) {
            return Err(StoreError::Backend(anyhow::anyhow!("disk I/O error")));
        }
        let only_removals = !batch.is_empty()
            && batch
                .ops()
                .iter()
                .all(|op| matches!(op, WriteOp::Remove { .. }));
        if only_removals && self.fail_prunes.load(Ordering::SeqCst) {
            return Err(StoreError::Backend(anyhow::anyhow!("database is locked")));
        }
        self.inner.commit(batch).await
    }
}
