use chrono::NaiveDate;
use thiserror::Error;

use crate::domain::{AmountOverflow, BackupId, ValidationError};
use crate::storage::{CorruptRecord, StoreError};

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Storage full: {0}")]
    StorageFull(String),

    #[error("Corrupt record at '{key}': {reason}")]
    StorageCorrupt { key: String, reason: String },

    #[error("Backup not found: {0}")]
    BackupNotFound(BackupId),

    #[error("Transaction not found: {0}")]
    TransactionNotFound(String),

    #[error("No snapshot for {0}")]
    SnapshotNotFound(NaiveDate),

    #[error("Notification failed: {0}")]
    NotificationFailed(String),

    #[error("Invalid transaction: {0}")]
    InvalidTransaction(#[from] ValidationError),

    #[error("Amount out of range: {0}")]
    AmountOutOfRange(#[from] AmountOverflow),

    #[error("Invalid backup file: {0}")]
    InvalidBackupFile(String),

    #[error("Storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

impl From<StoreError> for LedgerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Full { .. } | StoreError::DiskFull => {
                LedgerError::StorageFull(err.to_string())
            }
            StoreError::Backend(source) => LedgerError::Storage(source),
        }
    }
}

impl From<CorruptRecord> for LedgerError {
    fn from(err: CorruptRecord) -> Self {
        LedgerError::StorageCorrupt {
            reason: err.source.to_string(),
            key: err.key,
        }
    }
}
