pub mod export;
pub mod import;

pub use export::{BackupFile, Exporter, write_transactions_csv};
pub use import::{ImportPreview, Importer, read_backup_file};
