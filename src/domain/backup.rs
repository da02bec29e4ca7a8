use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{AmountOverflow, Cents, Transaction, WorkingState, compute_summary};

/// Backups are keyed by their creation time in milliseconds since the epoch.
pub type BackupId = i64;

/// Why a backup was taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackupReason {
    Manual,
    PreRestore,
    PreCycle,
    PreImport,
}

impl BackupReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackupReason::Manual => "manual",
            BackupReason::PreRestore => "pre_restore",
            BackupReason::PreCycle => "pre_cycle",
            BackupReason::PreImport => "pre_import",
        }
    }
}

impl std::fmt::Display for BackupReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Counts and totals shown next to a backup in listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupStats {
    pub card_receipts: usize,
    pub counter_sales: usize,
    pub supplier_payments: usize,
    pub cash_payments: usize,
    pub total_records: usize,
    pub total_income: Cents,
    pub total_expense: Cents,
    pub net_balance: Cents,
}

impl BackupStats {
    pub fn of(state: &WorkingState) -> Result<Self, AmountOverflow> {
        let summary = compute_summary(state)?;
        Ok(Self {
            card_receipts: state.card_receipts.len(),
            counter_sales: state.counter_sales.len(),
            supplier_payments: state.supplier_payments.len(),
            cash_payments: state.cash_payments.len(),
            total_records: state.record_count(),
            total_income: summary.total_income(),
            total_expense: summary.total_expense(),
            net_balance: summary.net_balance(),
        })
    }
}

/// A full copy of the working state at one point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupRecord {
    pub id: BackupId,
    pub created_at: DateTime<Utc>,
    pub reason: BackupReason,
    pub data: WorkingState,
    pub stats: BackupStats,
}

impl BackupRecord {
    pub fn new(
        id: BackupId,
        created_at: DateTime<Utc>,
        reason: BackupReason,
        data: WorkingState,
    ) -> Result<Self, AmountOverflow> {
        let stats = BackupStats::of(&data)?;
        Ok(Self {
            id,
            created_at,
            reason,
            data,
            stats,
        })
    }

    pub fn meta(&self, size_bytes: usize) -> BackupMeta {
        BackupMeta {
            id: self.id,
            created_at: self.created_at,
            reason: self.reason,
            stats: self.stats,
            size_bytes,
        }
    }
}

/// Listing entry for a stored backup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupMeta {
    pub id: BackupId,
    pub created_at: DateTime<Utc>,
    pub reason: BackupReason,
    pub stats: BackupStats,
    pub size_bytes: usize,
}

/// Pick an id for a backup created at `at`: its millisecond timestamp, bumped
/// past `newest` so ids stay unique and strictly increasing.
pub fn next_backup_id(at: DateTime<Utc>, newest: Option<BackupId>) -> BackupId {
    let millis = at.timestamp_millis();
    match newest {
        Some(newest) if newest >= millis => newest + 1,
        _ => millis,
    }
}

/// Human-readable size: "512 B", "3 KB", "2 MB".
pub fn format_size(bytes: usize) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{} KB", (bytes as f64 / 1024.0).round() as usize)
    } else {
        format!("{} MB", (bytes as f64 / (1024.0 * 1024.0)).round() as usize)
    }
}

/// Drop records that fail validation from an imported state.
/// Returns the kept state and how many records were dropped.
pub fn sanitize_imported(state: WorkingState) -> (WorkingState, usize) {
    let before = state.record_count();
    let mut kept = WorkingState {
        recurring_suppliers: Vec::new(),
        ..WorkingState::default()
    };

    for transaction in state
        .card_receipts
        .into_iter()
        .map(Transaction::from)
        .chain(state.counter_sales.into_iter().map(Transaction::from))
        .chain(state.supplier_payments.into_iter().map(Transaction::from))
        .chain(state.cash_payments.into_iter().map(Transaction::from))
    {
        if transaction.validate().is_ok() {
            kept.push(transaction);
        }
    }

    for supplier in &state.recurring_suppliers {
        kept.remember_supplier(supplier);
    }

    let dropped = before - kept.record_count();
    (kept, dropped)
}
