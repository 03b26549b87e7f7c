//! Typed helpers over [`StoreTrait`]

use crate::error::StoreError;
use crate::key::StoreKey;
use crate::store_trait::StoreTrait;
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Serialize a value for storage
///
/// # Errors
///
/// Returns [`StoreError::Serialization`] if the value cannot be encoded.
pub fn marshal<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, StoreError> {
    Ok(serde_json::to_vec(value)?)
}

/// Decode a stored payload
///
/// # Errors
///
/// Returns [`StoreError::Serialization`] if the payload does not decode as `T`.
pub fn unmarshal<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, StoreError> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Serialize and insert one value
///
/// # Errors
///
/// Propagates encoding and backend errors.
pub async fn insert_value<T: Serialize + Sync + ?Sized>(
    store: &dyn StoreTrait,
    collection: &str,
    key: &StoreKey,
    tag: &str,
    value: &T,
) -> Result<(), StoreError> {
    store.insert(collection, key, tag, marshal(value)?).await
}

/// Find and decode every value selected by the key
///
/// # Errors
///
/// Propagates decoding and backend errors.
pub async fn find_values<T: DeserializeOwned>(
    store: &dyn StoreTrait,
    collection: &str,
    key: &StoreKey,
    tag: &str,
) -> Result<Vec<T>, StoreError> {
    store
        .find(collection, key, tag)
        .await?
        .iter()
        .map(|bytes| unmarshal(bytes))
        .collect()
}

/// Find and decode the first value selected by the key, if any
///
/// # Errors
///
/// Propagates decoding and backend errors.
pub async fn find_value<T: DeserializeOwned>(
    store: &dyn StoreTrait,
    collection: &str,
    key: &StoreKey,
    tag: &str,
) -> Result<Option<T>, StoreError> {
    let values = store.find(collection, key, tag).await?;
    values.first().map(|bytes| unmarshal(bytes)).transpose()
}
