use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use tracing::{debug, error, info, warn};

use crate::domain::{
    BackupId, BackupReason, DailySnapshot, RunningBalance, Summary, Transaction, TransactionId,
    WorkingState, compute_summary, render_daily_report,
};
use crate::storage::{KeyValueStore, WriteBatch, keys};

use super::records::{
    load, load_last_cycle, load_running_balance, load_working_state, stage, stage_working_state,
};
use super::{BackupManager, LedgerError, Notifier};

/// Knobs that shape the daily close and backup retention.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CyclePolicy {
    /// Abort the close when the summary notification can't be delivered
    pub notification_required: bool,
    /// Number of backups kept after each new one
    pub backup_retention: usize,
    /// Number of daily snapshots kept; 0 keeps every day
    pub snapshot_retention: usize,
}

impl Default for CyclePolicy {
    fn default() -> Self {
        Self {
            notification_required: false,
            backup_retention: 10,
            snapshot_retention: 90,
        }
    }
}

/// Result of asking for a daily close.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The business date was already closed; nothing changed.
    AlreadyRanToday { date: NaiveDate },
    Completed(Box<CycleReport>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub snapshot: DailySnapshot,
    /// Backup of the lists as they were just before they were cleared
    pub backup_id: BackupId,
    pub notification: NotificationStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationStatus {
    Sent,
    Failed(String),
}

/// Application service for the daily ledger. Owns the store and the
/// notification channel; every mutation goes through here.
pub struct LedgerService<S, N> {
    store: S,
    notifier: N,
    policy: CyclePolicy,
}

impl<S: KeyValueStore, N: Notifier> LedgerService<S, N> {
    pub fn new(store: S, notifier: N, policy: CyclePolicy) -> Self {
        Self {
            store,
            notifier,
            policy,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn policy(&self) -> CyclePolicy {
        self.policy
    }

    pub fn backups(&self) -> BackupManager<'_, S> {
        BackupManager::new(&self.store, self.policy.backup_retention)
    }

    // ========================
    // Working state
    // ========================

    /// Validate and append a transaction to today's working lists.
    pub async fn record(&self, transaction: Transaction) -> Result<Transaction, LedgerError> {
        transaction.validate()?;

        let mut state = load_working_state(&self.store).await?;
        state.push(transaction.clone());

        let mut batch = WriteBatch::new();
        stage_working_state(&mut batch, &state)?;
        self.store.commit(batch).await?;

        info!(
            kind = %transaction.kind(),
            id = %transaction.id(),
            amount_cents = transaction.amount_cents(),
            "recorded transaction"
        );
        Ok(transaction)
    }

    /// Remove a transaction from the working lists.
    pub async fn delete_transaction(&self, id: TransactionId) -> Result<Transaction, LedgerError> {
        let mut state = load_working_state(&self.store).await?;
        let removed = state
            .remove(id)
            .ok_or_else(|| LedgerError::TransactionNotFound(id.to_string()))?;

        let mut batch = WriteBatch::new();
        stage_working_state(&mut batch, &state)?;
        self.store.commit(batch).await?;

        info!(kind = %removed.kind(), %id, "deleted transaction");
        Ok(removed)
    }

    pub async fn working_state(&self) -> Result<WorkingState, LedgerError> {
        load_working_state(&self.store).await
    }

    /// Totals for the transactions recorded since the last close.
    pub async fn summary(&self) -> Result<Summary, LedgerError> {
        let state = load_working_state(&self.store).await?;
        Ok(compute_summary(&state)?)
    }

    pub async fn running_balance(&self) -> Result<RunningBalance, LedgerError> {
        load_running_balance(&self.store).await
    }

    /// Business date of the last completed close.
    pub async fn last_cycle_date(&self) -> Result<Option<NaiveDate>, LedgerError> {
        load_last_cycle(&self.store).await
    }

    // ========================
    // Daily close
    // ========================

    /// Close the business day `now` falls on.
    ///
    /// At most one close per calendar day. The snapshot, the cleared lists, the
    /// carried-forward balance, a pre-close backup and the day marker are
    /// committed as one batch, so a failed attempt leaves everything as it
    /// was and the next attempt starts from scratch. The same batch drops the
    /// snapshots and backups that fall outside retention.
    pub async fn run_daily_cycle(
        &self,
        now: DateTime<FixedOffset>,
    ) -> Result<CycleOutcome, LedgerError> {
        let today = now.date_naive();
        let taken_at = now.with_timezone(&Utc);

        if let Some(last) = self.last_cycle_date().await? {
            if last >= today {
                debug!(%today, "day already closed");
                return Ok(CycleOutcome::AlreadyRanToday { date: today });
            }
        }

        let state = load_working_state(&self.store).await?;
        let opening = load_running_balance(&self.store).await?;
        let snapshot = DailySnapshot::close(today, taken_at, &state, opening)?;

        let notification = match self.notifier.send(&render_daily_report(&snapshot)).await {
            Ok(()) => NotificationStatus::Sent,
            Err(e) if self.policy.notification_required => {
                error!(%today, error = %e, "summary notification failed, close aborted");
                return Err(LedgerError::NotificationFailed(e.0));
            }
            Err(e) => {
                warn!(%today, error = %e, "summary notification failed, closing anyway");
                NotificationStatus::Failed(e.0)
            }
        };

        let backups = self.backups();
        let mut batch = WriteBatch::new();
        let backup = backups
            .stage_backup(&mut batch, taken_at, BackupReason::PreCycle, state.clone())
            .await?;
        let pruned_backups = backups.stage_retention(&mut batch).await?;
        let pruned_snapshots = self.stage_snapshot_retention(&mut batch).await?;
        stage(&mut batch, &keys::snapshot(today), &snapshot)?;
        stage_working_state(&mut batch, &state.cleared())?;
        stage(&mut batch, keys::RUNNING_BALANCE, &snapshot.closing_balance)?;
        // Marker goes last: the day only counts as closed if all of the above landed.
        stage(&mut batch, keys::LAST_CYCLE, &today)?;

        if let Err(e) = self.store.commit(batch).await {
            error!(%today, error = %e, "daily close failed, nothing was applied");
            return Err(e.into());
        }

        info!(
            %today,
            records = snapshot.summary.record_count,
            balance_cash = snapshot.summary.balance_cash,
            balance_transfer = snapshot.summary.balance_transfer,
            carried_cash = snapshot.closing_balance.cash_cents,
            carried_transfer = snapshot.closing_balance.transfer_cents,
            pruned_backups = pruned_backups.len(),
            pruned_snapshots,
            "closed business day"
        );

        Ok(CycleOutcome::Completed(Box::new(CycleReport {
            snapshot,
            backup_id: backup.id,
            notification,
        })))
    }

    // ========================
    // Snapshot history
    // ========================

    /// Dates with a stored snapshot, newest first.
    pub async fn list_snapshot_dates(&self) -> Result<Vec<NaiveDate>, LedgerError> {
        let found = self.store.keys_with_prefix(keys::SNAPSHOT_PREFIX).await?;
        let mut dates: Vec<NaiveDate> = found
            .iter()
            .filter_map(|k| keys::parse_snapshot_date(k))
            .collect();
        dates.reverse();
        Ok(dates)
    }

    pub async fn get_snapshot(&self, date: NaiveDate) -> Result<DailySnapshot, LedgerError> {
        load(&self.store, &keys::snapshot(date))
            .await?
            .ok_or(LedgerError::SnapshotNotFound(date))
    }

    /// Stage removal of the oldest snapshots so that, with the one about to
    /// be written, at most `snapshot_retention` remain.
    async fn stage_snapshot_retention(
        &self,
        batch: &mut WriteBatch,
    ) -> Result<usize, LedgerError> {
        let keep = self.policy.snapshot_retention;
        if keep == 0 {
            return Ok(0);
        }

        let found = self.store.keys_with_prefix(keys::SNAPSHOT_PREFIX).await?;
        let excess = (found.len() + 1).saturating_sub(keep);
        for key in &found[..excess] {
            batch.remove(key.as_str());
        }
        Ok(excess)
    }
}
