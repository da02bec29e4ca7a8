use std::collections::HashSet;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::domain::{
    BackupId, BackupMeta, BackupReason, BackupRecord, TransactionId, WorkingState,
    next_backup_id, sanitize_imported,
};
use crate::storage::{KeyValueStore, WriteBatch, decode, keys};

use super::LedgerError;
use super::records::{load, load_working_state, stage, stage_working_state};

/// How imported records combine with the current working state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportMode {
    /// The imported lists become the working lists
    Replace,
    /// Imported records are added to the current lists
    Append,
}

impl ImportMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImportMode::Replace => "replace",
            ImportMode::Append => "append",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "replace" | "reemplazar" => Some(ImportMode::Replace),
            "append" | "agregar" => Some(ImportMode::Append),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportResult {
    pub mode: ImportMode,
    /// Safety copy of the state the import replaced or extended
    pub backup_id: BackupId,
    pub imported: usize,
    /// Records that failed validation
    pub dropped: usize,
    /// Records whose id was already present, in the ledger or earlier in the file
    pub duplicates: usize,
}

/// Keyed copies of the working state with bounded retention.
pub struct BackupManager<'a, S> {
    store: &'a S,
    retention: usize,
}

impl<'a, S: KeyValueStore> BackupManager<'a, S> {
    pub fn new(store: &'a S, retention: usize) -> Self {
        Self {
            store,
            retention: retention.max(1),
        }
    }

    pub fn retention(&self) -> usize {
        self.retention
    }

    /// Copy the current working state into a new backup.
    pub async fn create(
        &self,
        at: DateTime<Utc>,
        reason: BackupReason,
    ) -> Result<BackupRecord, LedgerError> {
        let state = load_working_state(self.store).await?;

        let mut batch = WriteBatch::new();
        let record = self.stage_backup(&mut batch, at, reason, state).await?;
        self.store.commit(batch).await?;

        info!(id = record.id, %reason, records = record.stats.total_records, "created backup");
        self.prune_after_commit().await;
        Ok(record)
    }

    /// Build a backup of `state` and add it to `batch` without committing.
    pub(crate) async fn stage_backup(
        &self,
        batch: &mut WriteBatch,
        at: DateTime<Utc>,
        reason: BackupReason,
        state: WorkingState,
    ) -> Result<BackupRecord, LedgerError> {
        let id = next_backup_id(at, self.newest_id().await?);
        let record = BackupRecord::new(id, at, reason, state)?;
        stage(batch, &keys::backup(id), &record)?;
        Ok(record)
    }

    /// Stage removal of the oldest backups so that, with one new backup in
    /// the same batch, at most `retention` remain.
    pub(crate) async fn stage_retention(
        &self,
        batch: &mut WriteBatch,
    ) -> Result<Vec<BackupId>, LedgerError> {
        let ids = self.ids().await?;
        let excess = (ids.len() + 1).saturating_sub(self.retention);
        let removed = ids[..excess].to_vec();
        for id in &removed {
            batch.remove(keys::backup(*id));
        }
        Ok(removed)
    }

    pub async fn newest_id(&self) -> Result<Option<BackupId>, LedgerError> {
        Ok(self.ids().await?.last().copied())
    }

    pub async fn get(&self, id: BackupId) -> Result<BackupRecord, LedgerError> {
        load(self.store, &keys::backup(id))
            .await?
            .ok_or(LedgerError::BackupNotFound(id))
    }

    /// All stored backups, newest first.
    pub async fn list(&self) -> Result<Vec<BackupMeta>, LedgerError> {
        let mut metas = Vec::new();
        for id in self.ids().await?.into_iter().rev() {
            let key = keys::backup(id);
            // Pruned between listing and reading
            let Some(bytes) = self.store.get(&key).await? else {
                continue;
            };
            let record: BackupRecord = decode(&key, &bytes)?;
            metas.push(record.meta(bytes.len()));
        }
        Ok(metas)
    }

    /// Overwrite the working state with a stored backup. The state being
    /// replaced is saved as a `pre_restore` backup in the same commit.
    pub async fn restore(
        &self,
        id: BackupId,
        at: DateTime<Utc>,
    ) -> Result<WorkingState, LedgerError> {
        let record = self.get(id).await?;
        let current = load_working_state(self.store).await?;

        let mut batch = WriteBatch::new();
        let safety = self
            .stage_backup(&mut batch, at, BackupReason::PreRestore, current)
            .await?;
        stage_working_state(&mut batch, &record.data)?;
        self.store.commit(batch).await?;

        info!(id, safety_backup = safety.id, "restored backup");
        self.prune_after_commit().await;
        Ok(record.data)
    }

    /// Delete all but the `keep` newest backups, oldest first.
    /// Returns the removed ids.
    pub async fn prune(&self, keep: usize) -> Result<Vec<BackupId>, LedgerError> {
        let ids = self.ids().await?;
        if ids.len() <= keep {
            return Ok(Vec::new());
        }

        let removed: Vec<BackupId> = ids[..ids.len() - keep].to_vec();
        let mut batch = WriteBatch::new();
        for id in &removed {
            batch.remove(keys::backup(*id));
        }
        self.store.commit(batch).await?;

        debug!(count = removed.len(), keep, "pruned backups");
        Ok(removed)
    }

    pub async fn enforce_retention(&self) -> Result<Vec<BackupId>, LedgerError> {
        self.prune(self.retention).await
    }

    /// Retention pass after an operation whose own commit already landed.
    /// A failure here leaves extra backups behind and is only logged.
    async fn prune_after_commit(&self) {
        if let Err(e) = self.enforce_retention().await {
            warn!(error = %e, "could not prune old backups");
        }
    }

    pub async fn delete(&self, id: BackupId) -> Result<(), LedgerError> {
        let key = keys::backup(id);
        if self.store.get(&key).await?.is_none() {
            return Err(LedgerError::BackupNotFound(id));
        }
        self.store.remove(&key).await?;
        info!(id, "deleted backup");
        Ok(())
    }

    /// Bring records from an exported file into the working state.
    ///
    /// Invalid records are dropped. Recurring suppliers are merged in both
    /// modes. A `pre_import` backup of the current state is committed
    /// together with the new lists.
    pub async fn import(
        &self,
        data: WorkingState,
        mode: ImportMode,
        at: DateTime<Utc>,
    ) -> Result<ImportResult, LedgerError> {
        let (incoming, dropped) = sanitize_imported(data);
        let current = load_working_state(self.store).await?;

        let mut next = match mode {
            ImportMode::Replace => WorkingState {
                recurring_suppliers: current.recurring_suppliers.clone(),
                ..WorkingState::default()
            },
            ImportMode::Append => current.clone(),
        };

        let mut seen: HashSet<TransactionId> =
            next.transactions().iter().map(|t| t.id()).collect();
        let mut imported = 0;
        let mut duplicates = 0;
        for transaction in incoming.transactions() {
            if !seen.insert(transaction.id()) {
                duplicates += 1;
                continue;
            }
            next.push(transaction);
            imported += 1;
        }
        for supplier in &incoming.recurring_suppliers {
            next.remember_supplier(supplier);
        }

        let mut batch = WriteBatch::new();
        let safety = self
            .stage_backup(&mut batch, at, BackupReason::PreImport, current)
            .await?;
        stage_working_state(&mut batch, &next)?;
        self.store.commit(batch).await?;

        info!(
            mode = mode.as_str(),
            imported,
            dropped,
            duplicates,
            safety_backup = safety.id,
            "imported records"
        );
        self.prune_after_commit().await;

        Ok(ImportResult {
            mode,
            backup_id: safety.id,
            imported,
            dropped,
            duplicates,
        })
    }

    async fn ids(&self) -> Result<Vec<BackupId>, LedgerError> {
        let found = self.store.keys_with_prefix(keys::BACKUP_PREFIX).await?;
        Ok(found.iter().filter_map(|k| keys::parse_backup_id(k)).collect())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::domain::{CounterSale, Settlement};
    use crate::storage::MemoryStore;

    async fn seed(store: &MemoryStore, description: &str) {
        let mut state = load_working_state(store).await.unwrap();
        state.push(CounterSale::new(description, 1000, Settlement::Cash, Utc::now()).into());
        let mut batch = WriteBatch::new();
        stage_working_state(&mut batch, &state).unwrap();
        store.commit(batch).await.unwrap();
    }

    #[tokio::test]
    async fn test_ids_are_unique_within_the_same_millisecond() {
        let store = MemoryStore::new();
        let backups = BackupManager::new(&store, 10);
        let now = Utc::now();

        let first = backups.create(now, BackupReason::Manual).await.unwrap();
        let second = backups.create(now, BackupReason::Manual).await.unwrap();

        assert_eq!(second.id, first.id + 1);
        assert_eq!(backups.list().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_list_is_newest_first_with_sizes() {
        let store = MemoryStore::new();
        let backups = BackupManager::new(&store, 10);
        let now = Utc::now();

        seed(&store, "Tornillos").await;
        let older = backups.create(now, BackupReason::Manual).await.unwrap();
        let newer = backups
            .create(now + Duration::seconds(5), BackupReason::PreCycle)
            .await
            .unwrap();

        let list = backups.list().await.unwrap();
        assert_eq!(list[0].id, newer.id);
        assert_eq!(list[1].id, older.id);
        assert_eq!(list[1].stats.counter_sales, 1);
        assert!(list[0].size_bytes > 0);
    }

    #[tokio::test]
    async fn test_retention_is_applied_after_create() {
        let store = MemoryStore::new();
        let backups = BackupManager::new(&store, 3);
        let start = Utc::now();

        let mut ids = Vec::new();
        for i in 0..5 {
            let record = backups
                .create(start + Duration::seconds(i), BackupReason::Manual)
                .await
                .unwrap();
            ids.push(record.id);
        }

        let kept: Vec<_> = backups.list().await.unwrap().iter().map(|m| m.id).collect();
        assert_eq!(kept, vec![ids[4], ids[3], ids[2]]);
    }

    #[tokio::test]
    async fn test_zero_retention_keeps_one() {
        let store = MemoryStore::new();
        let backups = BackupManager::new(&store, 0);
        assert_eq!(backups.retention(), 1);
    }

    #[tokio::test]
    async fn test_delete_missing_backup() {
        let store = MemoryStore::new();
        let backups = BackupManager::new(&store, 10);

        assert!(matches!(
            backups.delete(42).await,
            Err(LedgerError::BackupNotFound(42))
        ));
    }

    #[tokio::test]
    async fn test_import_append_skips_known_ids() {
        let store = MemoryStore::new();
        let backups = BackupManager::new(&store, 10);
        seed(&store, "Pintura").await;
        let current = load_working_state(&store).await.unwrap();

        let mut incoming = current.clone();
        incoming.push(CounterSale::new("Rodillo", 2500, Settlement::Transfer, Utc::now()).into());
        incoming.push(CounterSale::new("", 100, Settlement::Cash, Utc::now()).into());

        let result = backups
            .import(incoming, ImportMode::Append, Utc::now())
            .await
            .unwrap();

        assert_eq!(result.imported, 1);
        assert_eq!(result.duplicates, 1);
        assert_eq!(result.dropped, 1);
        let state = load_working_state(&store).await.unwrap();
        assert_eq!(state.counter_sales.len(), 2);

        let safety = backups.get(result.backup_id).await.unwrap();
        assert_eq!(safety.reason, BackupReason::PreImport);
        assert_eq!(safety.data, current);
    }

    #[tokio::test]
    async fn test_import_skips_ids_repeated_within_the_file() {
        let store = MemoryStore::new();
        let backups = BackupManager::new(&store, 10);

        let sale = CounterSale::new("Rodillo", 2500, Settlement::Transfer, Utc::now());
        let mut incoming = WorkingState::default();
        incoming.push(sale.clone().into());
        incoming.push(sale.clone().into());

        for mode in [ImportMode::Append, ImportMode::Replace] {
            let result = backups.import(incoming.clone(), mode, Utc::now()).await.unwrap();
            let state = load_working_state(&store).await.unwrap();
            assert_eq!(state.counter_sales.len(), 1, "{}", mode.as_str());
            assert!(result.duplicates >= 1);
        }

        let mut state = load_working_state(&store).await.unwrap();
        assert!(state.remove(sale.id).is_some());
        assert!(state.is_empty());
    }

    #[test]
    fn test_import_mode_parsing() {
        assert_eq!(ImportMode::from_str("Replace"), Some(ImportMode::Replace));
        assert_eq!(ImportMode::from_str("agregar"), Some(ImportMode::Append));
        assert_eq!(ImportMode::from_str("merge"), None);
    }
}
