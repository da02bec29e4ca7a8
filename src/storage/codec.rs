use anyhow::Context;
use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;

use super::StoreError;

/// A stored value that no longer parses as the record it should be.
#[derive(Error, Debug)]
#[error("malformed record at '{key}': {source}")]
pub struct CorruptRecord {
    pub key: String,
    #[source]
    pub source: serde_json::Error,
}

/// Serialize a record to the bytes kept in the store.
pub fn encode<T: Serialize>(key: &str, value: &T) -> Result<Vec<u8>, StoreError> {
    let bytes = serde_json::to_vec(value).with_context(|| format!("Failed to encode '{}'", key))?;
    Ok(bytes)
}

pub fn decode<T: DeserializeOwned>(key: &str, bytes: &[u8]) -> Result<T, CorruptRecord> {
    serde_json::from_slice(bytes).map_err(|source| CorruptRecord {
        key: key.to_string(),
        source,
    })
}
