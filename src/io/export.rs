use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;

use crate::application::{LedgerService, Notifier};
use crate::domain::{
    AmountOverflow, BackupId, BackupReason, BackupStats, Cents, PaymentMethod, Transaction,
    WorkingState,
};
use crate::storage::KeyValueStore;

pub const BACKUP_FILE_VERSION: &str = "1";

/// Portable copy of a working state, as written by `backup export`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupFile {
    pub version: String,
    pub exported_at: DateTime<Utc>,
    /// Backup the data came from; absent when the live state was exported
    #[serde(default)]
    pub backup_id: Option<BackupId>,
    #[serde(default)]
    pub reason: Option<BackupReason>,
    pub stats: BackupStats,
    pub data: WorkingState,
}

impl BackupFile {
    pub fn new(data: WorkingState, exported_at: DateTime<Utc>) -> Result<Self, AmountOverflow> {
        Ok(Self {
            version: BACKUP_FILE_VERSION.to_string(),
            exported_at,
            backup_id: None,
            reason: None,
            stats: BackupStats::of(&data)?,
            data,
        })
    }
}

/// Writes ledger data out as JSON backup files or CSV listings.
pub struct Exporter<'a, S, N> {
    service: &'a LedgerService<S, N>,
}

impl<'a, S: KeyValueStore, N: Notifier> Exporter<'a, S, N> {
    pub fn new(service: &'a LedgerService<S, N>) -> Self {
        Self { service }
    }

    /// Export a stored backup, or the live working state when `id` is None,
    /// as pretty-printed JSON.
    pub async fn export_backup_json<W: Write>(
        &self,
        id: Option<BackupId>,
        writer: W,
    ) -> Result<BackupFile> {
        let file = match id {
            Some(id) => {
                let record = self.service.backups().get(id).await?;
                BackupFile {
                    backup_id: Some(record.id),
                    reason: Some(record.reason),
                    ..BackupFile::new(record.data, Utc::now())?
                }
            }
            None => BackupFile::new(self.service.working_state().await?, Utc::now())?,
        };

        serde_json::to_writer_pretty(writer, &file)?;
        Ok(file)
    }

    /// Export transactions as CSV: the open day when `date` is None,
    /// otherwise the ledger of that day's snapshot.
    pub async fn export_transactions_csv<W: Write>(
        &self,
        date: Option<NaiveDate>,
        writer: W,
    ) -> Result<usize> {
        let state = match date {
            Some(date) => self.service.get_snapshot(date).await?.ledger,
            None => self.service.working_state().await?,
        };
        write_transactions_csv(&state.transactions(), writer)
    }
}

pub fn write_transactions_csv<W: Write>(transactions: &[Transaction], writer: W) -> Result<usize> {
    let mut csv_writer = csv::Writer::from_writer(writer);

    csv_writer.write_record([
        "id",
        "kind",
        "timestamp",
        "description",
        "counterparty",
        "amount_cents",
        "fee_cents",
        "method",
        "cash_cents",
        "transfer_cents",
        "status",
        "due_date",
        "category",
    ])?;

    for transaction in transactions {
        let row = TransactionRow::from(transaction);
        csv_writer.write_record([
            transaction.id().to_string(),
            transaction.kind().to_string(),
            transaction.timestamp().to_rfc3339(),
            transaction.label().to_string(),
            row.counterparty,
            transaction.amount_cents().to_string(),
            row.fee_cents.to_string(),
            row.method.to_string(),
            row.cash_cents.to_string(),
            row.transfer_cents.to_string(),
            row.status.to_string(),
            row.due_date.map(|d| d.to_string()).unwrap_or_default(),
            row.category,
        ])?;
    }

    csv_writer.flush()?;
    Ok(transactions.len())
}

/// Kind-specific columns of a CSV row.
struct TransactionRow {
    counterparty: String,
    fee_cents: Cents,
    method: &'static str,
    cash_cents: Cents,
    transfer_cents: Cents,
    status: &'static str,
    due_date: Option<NaiveDate>,
    category: String,
}

impl From<&Transaction> for TransactionRow {
    fn from(transaction: &Transaction) -> Self {
        match transaction {
            Transaction::CardReceipt(r) => Self {
                counterparty: r.customer.clone().unwrap_or_default(),
                fee_cents: r.fee_cents,
                method: "card",
                cash_cents: 0,
                transfer_cents: r.net_cents(),
                status: "",
                due_date: None,
                category: r.category.clone().unwrap_or_default(),
            },
            Transaction::CounterSale(s) => {
                let (cash, transfer) = s.settlement.split(s.amount_cents);
                Self {
                    counterparty: s.customer.clone().unwrap_or_default(),
                    fee_cents: 0,
                    method: s.settlement.label(),
                    cash_cents: cash,
                    transfer_cents: transfer,
                    status: "",
                    due_date: None,
                    category: s.category.clone().unwrap_or_default(),
                }
            }
            Transaction::SupplierPayment(p) => {
                let (cash, transfer) = match p.method {
                    PaymentMethod::Cash => (p.amount_cents, 0),
                    PaymentMethod::Transfer => (0, p.amount_cents),
                };
                Self {
                    counterparty: p.supplier.clone(),
                    fee_cents: 0,
                    method: p.method.as_str(),
                    cash_cents: cash,
                    transfer_cents: transfer,
                    status: p.status.as_str(),
                    due_date: p.due_date,
                    category: p.category.clone().unwrap_or_default(),
                }
            }
            Transaction::CashPayment(p) => Self {
                counterparty: p.payee.clone(),
                fee_cents: 0,
                method: "cash",
                cash_cents: p.amount_cents,
                transfer_cents: 0,
                status: "",
                due_date: None,
                category: p.category.clone().unwrap_or_default(),
            },
        }
    }
}
