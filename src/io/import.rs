use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::io::Read;

use crate::application::{ImportMode, ImportResult, LedgerError, LedgerService, Notifier};
use crate::domain::{BackupRecord, BackupStats, WorkingState, sanitize_imported};
use crate::io::export::BackupFile;
use crate::storage::KeyValueStore;

/// Accepted shapes of an import file: an exported backup file, a raw
/// backup record, or a bare working state.
#[derive(Deserialize)]
#[serde(untagged)]
enum ImportFile {
    Exported(BackupFile),
    Record(BackupRecord),
    State(WorkingState),
}

impl ImportFile {
    fn into_state(self) -> WorkingState {
        match self {
            ImportFile::Exported(file) => file.data,
            ImportFile::Record(record) => record.data,
            ImportFile::State(state) => state,
        }
    }
}

/// Parse a JSON backup file into a working state, without validating records.
pub fn read_backup_file<R: Read>(reader: R) -> Result<WorkingState, LedgerError> {
    let file: ImportFile = serde_json::from_reader(reader)
        .map_err(|e| LedgerError::InvalidBackupFile(e.to_string()))?;
    Ok(file.into_state())
}

/// What an import would bring in, computed without touching the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportPreview {
    pub stats: BackupStats,
    pub dropped: usize,
}

/// Loads JSON backup files into the working state.
pub struct Importer<'a, S, N> {
    service: &'a LedgerService<S, N>,
}

impl<'a, S: KeyValueStore, N: Notifier> Importer<'a, S, N> {
    pub fn new(service: &'a LedgerService<S, N>) -> Self {
        Self { service }
    }

    pub fn preview<R: Read>(&self, reader: R) -> Result<ImportPreview, LedgerError> {
        let (state, dropped) = sanitize_imported(read_backup_file(reader)?);
        Ok(ImportPreview {
            stats: BackupStats::of(&state)?,
            dropped,
        })
    }

    pub async fn import_backup_json<R: Read>(
        &self,
        reader: R,
        mode: ImportMode,
        at: DateTime<Utc>,
    ) -> Result<ImportResult, LedgerError> {
        let state = read_backup_file(reader)?;
        self.service.backups().import(state, mode, at).await
    }
}
