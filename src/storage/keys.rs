//! Key layout of the store.

use chrono::NaiveDate;

use crate::domain::BackupId;

pub const CARD_RECEIPTS: &str = "working/card_receipts";
pub const COUNTER_SALES: &str = "working/counter_sales";
pub const SUPPLIER_PAYMENTS: &str = "working/supplier_payments";
pub const CASH_PAYMENTS: &str = "working/cash_payments";
pub const RECURRING_SUPPLIERS: &str = "working/recurring_suppliers";

pub const RUNNING_BALANCE: &str = "balance/running";

/// Business date of the last completed daily close
pub const LAST_CYCLE: &str = "cycle/last_run";

pub const SNAPSHOT_PREFIX: &str = "snapshot/";
pub const BACKUP_PREFIX: &str = "backup/";

pub fn snapshot(date: NaiveDate) -> String {
    format!("{}{}", SNAPSHOT_PREFIX, date.format("%Y-%m-%d"))
}

pub fn parse_snapshot_date(key: &str) -> Option<NaiveDate> {
    let date = key.strip_prefix(SNAPSHOT_PREFIX)?;
    NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()
}

/// Zero-padded so that lexicographic key order is chronological.
pub fn backup(id: BackupId) -> String {
    format!("{}{:016}", BACKUP_PREFIX, id)
}

pub fn parse_backup_id(key: &str) -> Option<BackupId> {
    key.strip_prefix(BACKUP_PREFIX)?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backup_keys_sort_chronologically() {
        let mut keys = vec![backup(1_717_000_000_000), backup(999), backup(1_717_000_000_001)];
        keys.sort();

        let ids: Vec<BackupId> = keys.iter().filter_map(|k| parse_backup_id(k)).collect();
        assert_eq!(ids, vec![999, 1_717_000_000_000, 1_717_000_000_001]);
    }

    #[test]
    fn test_snapshot_key_roundtrip() {
        let date = NaiveDate::from_ymd_opt(2024, 6, 3).unwrap();
        assert_eq!(snapshot(date), "snapshot/2024-06-03");
        assert_eq!(parse_snapshot_date(&snapshot(date)), Some(date));
        assert_eq!(parse_snapshot_date("backup/2024-06-03"), None);
    }
}
