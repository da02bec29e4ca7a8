//! Typed reads and staged writes of the ledger records.

use chrono::NaiveDate;
use serde::{Serialize, de::DeserializeOwned};

use crate::domain::{RunningBalance, WorkingState};
use crate::storage::{KeyValueStore, WriteBatch, decode, encode, keys};

use super::LedgerError;

pub(crate) async fn load<T, S>(store: &S, key: &str) -> Result<Option<T>, LedgerError>
where
    T: DeserializeOwned,
    S: KeyValueStore,
{
    match store.get(key).await? {
        Some(bytes) => Ok(Some(decode(key, &bytes)?)),
        None => Ok(None),
    }
}

pub(crate) fn stage<T: Serialize>(
    batch: &mut WriteBatch,
    key: &str,
    value: &T,
) -> Result<(), LedgerError> {
    batch.put(key, encode(key, value)?);
    Ok(())
}

/// Load the four working lists and the recurring suppliers. Missing lists are empty.
pub async fn load_working_state<S: KeyValueStore>(store: &S) -> Result<WorkingState, LedgerError> {
    Ok(WorkingState {
        card_receipts: load(store, keys::CARD_RECEIPTS).await?.unwrap_or_default(),
        counter_sales: load(store, keys::COUNTER_SALES).await?.unwrap_or_default(),
        supplier_payments: load(store, keys::SUPPLIER_PAYMENTS).await?.unwrap_or_default(),
        cash_payments: load(store, keys::CASH_PAYMENTS).await?.unwrap_or_default(),
        recurring_suppliers: load(store, keys::RECURRING_SUPPLIERS)
            .await?
            .unwrap_or_default(),
    })
}

pub(crate) fn stage_working_state(
    batch: &mut WriteBatch,
    state: &WorkingState,
) -> Result<(), LedgerError> {
    stage(batch, keys::CARD_RECEIPTS, &state.card_receipts)?;
    stage(batch, keys::COUNTER_SALES, &state.counter_sales)?;
    stage(batch, keys::SUPPLIER_PAYMENTS, &state.supplier_payments)?;
    stage(batch, keys::CASH_PAYMENTS, &state.cash_payments)?;
    stage(batch, keys::RECURRING_SUPPLIERS, &state.recurring_suppliers)?;
    Ok(())
}

pub async fn load_running_balance<S: KeyValueStore>(
    store: &S,
) -> Result<RunningBalance, LedgerError> {
    Ok(load(store, keys::RUNNING_BALANCE).await?.unwrap_or_default())
}

pub async fn load_last_cycle<S: KeyValueStore>(store: &S) -> Result<Option<NaiveDate>, LedgerError> {
    load(store, keys::LAST_CYCLE).await
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::domain::{CounterSale, Settlement};
    use crate::storage::MemoryStore;

    #[tokio::test]
    async fn test_missing_records_load_as_defaults() {
        let store = MemoryStore::new();

        assert_eq!(load_working_state(&store).await.unwrap(), WorkingState::default());
        assert_eq!(
            load_running_balance(&store).await.unwrap(),
            RunningBalance::default()
        );
        assert_eq!(load_last_cycle(&store).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_working_state_roundtrip() {
        let store = MemoryStore::new();
        let mut state = WorkingState::default();
        state.push(CounterSale::new("Candado", 4200, Settlement::Transfer, Utc::now()).into());
        state.remember_supplier("Acme");

        let mut batch = WriteBatch::new();
        stage_working_state(&mut batch, &state).unwrap();
        store.commit(batch).await.unwrap();

        assert_eq!(load_working_state(&store).await.unwrap(), state);
    }

    #[tokio::test]
    async fn test_corrupt_list_is_reported() {
        let store = MemoryStore::new();
        store
            .set(keys::COUNTER_SALES, b"{\"not\": \"a list\"}".to_vec())
            .await
            .unwrap();

        let err = load_working_state(&store).await.unwrap_err();
        assert!(matches!(err, LedgerError::StorageCorrupt { key, .. } if key == keys::COUNTER_SALES));
    }
}
