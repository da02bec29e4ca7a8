use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Local, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use uuid::Uuid;

use crate::application::{
    Clock, CycleOutcome, DailyScheduler, ImportMode, NotificationStatus, SystemClock,
};
use crate::config::{AppService, Config};
use crate::domain::{
    BackupReason, CardReceipt, Cents, CashPayment, CounterSale, PaymentMethod, PaymentStatus,
    Settlement, Summary, SupplierPayment, Transaction, format_currency, format_size, parse_cents,
    render_daily_report,
};
use crate::io::{Exporter, Importer};

/// Ferretería Control - daily cash ledger with automatic close and backups
#[derive(Parser)]
#[command(name = "ferrecontrol")]
#[command(about = "Daily ledger for a hardware store: record movements, close the day, keep backups")]
#[command(version)]
pub struct Cli {
    #[command(flatten)]
    pub config: Config,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new database
    Init,

    /// Record a movement in today's ledger
    #[command(subcommand)]
    Record(RecordCommands),

    /// Delete a movement from today's ledger
    Delete {
        /// Movement ID
        id: String,
    },

    /// List today's movements
    List,

    /// Show today's totals
    Summary,

    /// Show the balance carried across daily closes
    Balance,

    /// Close the day now
    Close,

    /// Run in the foreground and close the day at the configured time
    Daemon,

    /// Backup management commands
    #[command(subcommand)]
    Backup(BackupCommands),

    /// Closed-day history
    #[command(subcommand)]
    Snapshots(SnapshotCommands),

    /// List recurring suppliers
    Suppliers,

    /// Export movements to CSV
    Export {
        /// Export a closed day instead of today (YYYY-MM-DD)
        #[arg(long)]
        date: Option<String>,

        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum RecordCommands {
    /// Card or digital-wallet payment received
    Receipt {
        /// What was sold
        description: String,

        /// Gross amount (e.g., "1500.50")
        amount: String,

        /// Processor fee withheld
        #[arg(long, default_value = "0")]
        fee: String,

        #[arg(short, long)]
        category: Option<String>,

        #[arg(long)]
        customer: Option<String>,

        /// Payment id assigned by the processor
        #[arg(long)]
        external_ref: Option<String>,
    },

    /// Sale at the counter
    Sale {
        description: String,

        amount: String,

        /// cash, transfer or mixed
        #[arg(short, long, default_value = "cash")]
        method: String,

        /// Cash part of a mixed sale
        #[arg(long)]
        cash: Option<String>,

        #[arg(short, long)]
        category: Option<String>,

        #[arg(long)]
        customer: Option<String>,
    },

    /// Payment to a supplier
    Supplier {
        supplier: String,

        concept: String,

        amount: String,

        /// cash or transfer
        #[arg(short, long, default_value = "cash")]
        method: String,

        /// paid, pending or overdue
        #[arg(short, long, default_value = "paid")]
        status: String,

        /// Due date for pending or overdue invoices (YYYY-MM-DD)
        #[arg(long)]
        due: Option<String>,

        #[arg(short, long)]
        category: Option<String>,
    },

    /// Cash paid out of the till
    Cash {
        payee: String,

        concept: String,

        amount: String,

        #[arg(short, long)]
        category: Option<String>,

        /// Who received the cash
        #[arg(long)]
        received_by: Option<String>,

        #[arg(long)]
        receipt: Option<String>,

        #[arg(long)]
        notes: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum BackupCommands {
    /// Back up the current ledger
    Create,

    /// List stored backups
    List,

    /// Show a backup's contents
    Show {
        id: i64,
    },

    /// Replace the current ledger with a backup
    Restore {
        id: i64,
    },

    /// Delete a backup
    Delete {
        id: i64,
    },

    /// Keep only the newest backups
    Prune {
        #[arg(short, long, default_value = "5")]
        keep: usize,
    },

    /// Write a backup (or the current ledger) to a JSON file
    Export {
        /// Backup ID (current ledger if omitted)
        #[arg(long)]
        id: Option<i64>,

        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,
    },

    /// Load movements from a JSON backup file
    Import {
        /// Input file (stdin if omitted)
        #[arg(short, long)]
        input: Option<String>,

        /// replace or append
        #[arg(short, long, default_value = "replace")]
        mode: String,

        /// Preview without importing
        #[arg(long)]
        dry_run: bool,
    },
}

#[derive(Subcommand)]
pub enum SnapshotCommands {
    /// List closed days
    List,

    /// Show the close of one day
    Show {
        /// Business date (YYYY-MM-DD)
        date: String,
    },
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        let config = self.config;

        match self.command {
            Commands::Init => {
                config.init_service().await?;
                println!("Database initialized: {}", config.database);
            }

            Commands::Record(cmd) => {
                let service = config.open_service().await?;
                let transaction = build_transaction(cmd, Utc::now())?;
                let recorded = service.record(transaction).await?;
                println!(
                    "Recorded {}: {} {} ({})",
                    recorded.kind(),
                    recorded.label(),
                    format_currency(recorded.amount_cents()),
                    recorded.id()
                );
            }

            Commands::Delete { id } => {
                let service = config.open_service().await?;
                let id = Uuid::parse_str(&id).context("Invalid movement ID format (expected UUID)")?;
                let removed = service.delete_transaction(id).await?;
                println!(
                    "Deleted {}: {} {}",
                    removed.kind(),
                    removed.label(),
                    format_currency(removed.amount_cents())
                );
            }

            Commands::List => {
                let service = config.open_service().await?;
                run_list_command(&service).await?;
            }

            Commands::Summary => {
                let service = config.open_service().await?;
                let summary = service.summary().await?;
                print_summary(&summary);
            }

            Commands::Balance => {
                let service = config.open_service().await?;
                let balance = service.running_balance().await?;
                println!("Cash:      {:>14}", format_currency(balance.cash_cents));
                println!("Transfer:  {:>14}", format_currency(balance.transfer_cents));
                println!("Total:     {:>14}", format_currency(balance.total_cents()));
                match service.last_cycle_date().await? {
                    Some(date) => println!("Last close: {}", date),
                    None => println!("Last close: never"),
                }
            }

            Commands::Close => {
                let service = config.open_service().await?;
                let outcome = service.run_daily_cycle(SystemClock.now()).await?;
                print_outcome(&outcome);
            }

            Commands::Daemon => {
                let trigger = config.trigger()?;
                let service = Arc::new(config.open_service().await?);
                let handle = DailyScheduler::new(service, Arc::new(SystemClock), trigger)
                    .with_retry_interval(config.retry_interval())
                    .spawn();

                println!("Daily close scheduled at {} (Ctrl-C to stop)", trigger);
                tokio::signal::ctrl_c()
                    .await
                    .context("Failed to listen for Ctrl-C")?;
                handle.cancel().await;
            }

            Commands::Backup(cmd) => {
                let service = config.open_service().await?;
                run_backup_command(&service, cmd).await?;
            }

            Commands::Snapshots(cmd) => {
                let service = config.open_service().await?;
                run_snapshot_command(&service, cmd).await?;
            }

            Commands::Suppliers => {
                let service = config.open_service().await?;
                let state = service.working_state().await?;
                if state.recurring_suppliers.is_empty() {
                    println!("No suppliers yet.");
                }
                for supplier in &state.recurring_suppliers {
                    println!("{}", supplier);
                }
            }

            Commands::Export { date, output } => {
                let service = config.open_service().await?;
                let date = date.as_deref().map(parse_date).transpose()?;
                let exporter = Exporter::new(&service);
                let count = match output.as_deref() {
                    Some(path) => {
                        let file = std::fs::File::create(path)
                            .with_context(|| format!("Failed to create output file: {}", path))?;
                        exporter.export_transactions_csv(date, file).await?
                    }
                    None => exporter.export_transactions_csv(date, std::io::stdout()).await?,
                };
                if output.is_some() {
                    eprintln!("Exported {} movements", count);
                }
            }
        }

        Ok(())
    }
}

fn build_transaction(cmd: RecordCommands, now: DateTime<Utc>) -> Result<Transaction> {
    let transaction = match cmd {
        RecordCommands::Receipt {
            description,
            amount,
            fee,
            category,
            customer,
            external_ref,
        } => {
            let mut receipt =
                CardReceipt::new(description, parse_amount(&amount)?, parse_amount(&fee)?, now);
            if let Some(category) = category {
                receipt = receipt.with_category(category);
            }
            if let Some(customer) = customer {
                receipt = receipt.with_customer(customer);
            }
            if let Some(external_ref) = external_ref {
                receipt = receipt.with_external_ref(external_ref);
            }
            receipt.into()
        }

        RecordCommands::Sale {
            description,
            amount,
            method,
            cash,
            category,
            customer,
        } => {
            let settlement = match method.to_lowercase().as_str() {
                "mixed" | "mixto" => {
                    let cash = cash.context("A mixed sale needs --cash")?;
                    Settlement::Mixed {
                        cash_cents: parse_amount(&cash)?,
                    }
                }
                other => match PaymentMethod::from_str(other) {
                    Some(PaymentMethod::Cash) => Settlement::Cash,
                    Some(PaymentMethod::Transfer) => Settlement::Transfer,
                    None => anyhow::bail!(
                        "Invalid method '{}'. Valid methods: cash, transfer, mixed",
                        method
                    ),
                },
            };
            let mut sale = CounterSale::new(description, parse_amount(&amount)?, settlement, now);
            if let Some(category) = category {
                sale = sale.with_category(category);
            }
            if let Some(customer) = customer {
                sale = sale.with_customer(customer);
            }
            sale.into()
        }

        RecordCommands::Supplier {
            supplier,
            concept,
            amount,
            method,
            status,
            due,
            category,
        } => {
            let method = PaymentMethod::from_str(&method).with_context(|| {
                format!("Invalid method '{}'. Valid methods: cash, transfer", method)
            })?;
            let status = PaymentStatus::from_str(&status).with_context(|| {
                format!("Invalid status '{}'. Valid: paid, pending, overdue", status)
            })?;
            let due = due.as_deref().map(parse_date).transpose()?;

            let mut payment =
                SupplierPayment::new(supplier, concept, parse_amount(&amount)?, method, now)
                    .with_status(status, due);
            if let Some(category) = category {
                payment = payment.with_category(category);
            }
            payment.into()
        }

        RecordCommands::Cash {
            payee,
            concept,
            amount,
            category,
            received_by,
            receipt,
            notes,
        } => {
            let mut payment = CashPayment::new(payee, concept, parse_amount(&amount)?, now);
            if let Some(category) = category {
                payment = payment.with_category(category);
            }
            if let Some(received_by) = received_by {
                payment = payment.with_received_by(received_by);
            }
            if let Some(receipt) = receipt {
                payment = payment.with_receipt_number(receipt);
            }
            if let Some(notes) = notes {
                payment = payment.with_notes(notes);
            }
            payment.into()
        }
    };

    Ok(transaction)
}

async fn run_list_command(service: &AppService) -> Result<()> {
    let transactions = service.working_state().await?.transactions();
    if transactions.is_empty() {
        println!("No movements today.");
        return Ok(());
    }

    println!(
        "{:<36}  {:<5}  {:<16}  {:<30}  {:>14}",
        "ID", "TIME", "KIND", "DESCRIPTION", "AMOUNT"
    );
    println!("{}", "-".repeat(109));
    for transaction in &transactions {
        let time = transaction.timestamp().with_timezone(&Local).format("%H:%M");
        println!(
            "{:<36}  {:<5}  {:<16}  {:<30}  {:>14}",
            transaction.id(),
            time,
            transaction.kind(),
            truncate(transaction.label(), 30),
            format_currency(transaction.amount_cents())
        );
    }
    Ok(())
}

async fn run_backup_command(service: &AppService, cmd: BackupCommands) -> Result<()> {
    let backups = service.backups();

    match cmd {
        BackupCommands::Create => {
            let record = backups.create(Utc::now(), BackupReason::Manual).await?;
            println!(
                "Created backup {} ({} movements)",
                record.id, record.stats.total_records
            );
        }

        BackupCommands::List => {
            let list = backups.list().await?;
            if list.is_empty() {
                println!("No backups found.");
                return Ok(());
            }
            println!(
                "{:<14}  {:<19}  {:<11}  {:>6}  {:>14}  {:>7}",
                "ID", "CREATED", "REASON", "ITEMS", "NET", "SIZE"
            );
            println!("{}", "-".repeat(80));
            for meta in list {
                println!(
                    "{:<14}  {:<19}  {:<11}  {:>6}  {:>14}  {:>7}",
                    meta.id,
                    meta.created_at
                        .with_timezone(&Local)
                        .format("%Y-%m-%d %H:%M:%S"),
                    meta.reason,
                    meta.stats.total_records,
                    format_currency(meta.stats.net_balance),
                    format_size(meta.size_bytes)
                );
            }
        }

        BackupCommands::Show { id } => {
            let record = backups.get(id).await?;
            println!("Backup: {}", record.id);
            println!(
                "  Created:          {}",
                record.created_at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S")
            );
            println!("  Reason:            {}", record.reason);
            println!("  Card receipts:     {}", record.stats.card_receipts);
            println!("  Counter sales:     {}", record.stats.counter_sales);
            println!("  Supplier payments: {}", record.stats.supplier_payments);
            println!("  Cash payments:     {}", record.stats.cash_payments);
            println!("  Income:            {}", format_currency(record.stats.total_income));
            println!("  Expense:           {}", format_currency(record.stats.total_expense));
            println!("  Net:               {}", format_currency(record.stats.net_balance));
        }

        BackupCommands::Restore { id } => {
            let state = backups.restore(id, Utc::now()).await?;
            println!(
                "Restored backup {} ({} movements). Previous ledger saved as a backup.",
                id,
                state.record_count()
            );
        }

        BackupCommands::Delete { id } => {
            backups.delete(id).await?;
            println!("Deleted backup {}", id);
        }

        BackupCommands::Prune { keep } => {
            let removed = backups.prune(keep).await?;
            println!("Removed {} backup(s)", removed.len());
        }

        BackupCommands::Export { id, output } => {
            let exporter = Exporter::new(service);
            let file = match output.as_deref() {
                Some(path) => {
                    let file = std::fs::File::create(path)
                        .with_context(|| format!("Failed to create output file: {}", path))?;
                    exporter.export_backup_json(id, file).await?
                }
                None => exporter.export_backup_json(id, std::io::stdout()).await?,
            };
            if output.is_some() {
                eprintln!("Exported {} movements", file.stats.total_records);
            }
        }

        BackupCommands::Import {
            input,
            mode,
            dry_run,
        } => {
            let mode = ImportMode::from_str(&mode).with_context(|| {
                format!("Invalid import mode '{}'. Valid modes: replace, append", mode)
            })?;
            let reader: Box<dyn std::io::Read> = match input.as_deref() {
                Some(path) => Box::new(
                    std::fs::File::open(path)
                        .with_context(|| format!("Failed to open input file: {}", path))?,
                ),
                None => Box::new(std::io::stdin()),
            };
            let importer = Importer::new(service);

            if dry_run {
                let preview = importer.preview(reader)?;
                println!("Validation successful");
                println!("  Valid:    {}", preview.stats.total_records);
                println!("  Dropped:  {}", preview.dropped);
                println!("  Income:   {}", format_currency(preview.stats.total_income));
                println!("  Expense:  {}", format_currency(preview.stats.total_expense));
            } else {
                let result = importer
                    .import_backup_json(reader, mode, Utc::now())
                    .await?;
                println!("Import complete ({})", result.mode.as_str());
                println!("  Imported:   {}", result.imported);
                println!("  Dropped:    {}", result.dropped);
                println!("  Duplicates: {}", result.duplicates);
                println!("  Previous ledger saved as backup {}", result.backup_id);
            }
        }
    }

    Ok(())
}

async fn run_snapshot_command(service: &AppService, cmd: SnapshotCommands) -> Result<()> {
    match cmd {
        SnapshotCommands::List => {
            let dates = service.list_snapshot_dates().await?;
            if dates.is_empty() {
                println!("No closed days yet.");
            }
            for date in dates {
                let snapshot = service.get_snapshot(date).await?;
                println!(
                    "{}  {:>4} movements  {:>14}",
                    date,
                    snapshot.summary.record_count,
                    format_currency(snapshot.summary.net_balance())
                );
            }
        }

        SnapshotCommands::Show { date } => {
            let snapshot = service.get_snapshot(parse_date(&date)?).await?;
            println!("{}", render_daily_report(&snapshot));
        }
    }
    Ok(())
}

fn print_summary(summary: &Summary) {
    println!("INCOME");
    println!("  Card (net):        {:>14}", format_currency(summary.card_net));
    println!("    fees withheld:   {:>14}", format_currency(summary.card_fees));
    println!("  Counter cash:      {:>14}", format_currency(summary.counter_cash));
    println!("  Counter transfer:  {:>14}", format_currency(summary.counter_transfer));
    println!("EXPENSES");
    println!("  Suppliers cash:    {:>14}", format_currency(summary.supplier_cash));
    println!("  Suppliers transfer:{:>14}", format_currency(summary.supplier_transfer));
    println!("  Cash payments:     {:>14}", format_currency(summary.cash_payments));
    if summary.pending_supplier > 0 {
        println!("  Pending suppliers: {:>14}", format_currency(summary.pending_supplier));
    }
    println!("BALANCE");
    println!("  Cash:              {:>14}", format_currency(summary.balance_cash));
    println!("  Transfer:          {:>14}", format_currency(summary.balance_transfer));
    println!("  Net:               {:>14}", format_currency(summary.net_balance()));
    println!("Movements: {}", summary.record_count);
}

fn print_outcome(outcome: &CycleOutcome) {
    match outcome {
        CycleOutcome::AlreadyRanToday { date } => {
            println!("Day {} is already closed.", date);
        }
        CycleOutcome::Completed(report) => {
            println!("{}", render_daily_report(&report.snapshot));
            println!();
            println!("Pre-close backup: {}", report.backup_id);
            if let NotificationStatus::Failed(reason) = &report.notification {
                println!("Summary could not be delivered: {}", reason);
            }
        }
    }
}

fn parse_amount(input: &str) -> Result<Cents> {
    parse_cents(input).with_context(|| format!("Invalid amount '{}'. Use '1500.50' or '1500'", input))
}

fn parse_date(date_str: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
        .with_context(|| format!("Invalid date format '{}'. Use YYYY-MM-DD", date_str))
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
