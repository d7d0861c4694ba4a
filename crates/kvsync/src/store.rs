//! Writing objects to a key-value store.
//!
//! The helpers edit or encode the object while holding its lock, then
//! release the lock before writing to the store. Store writes are not
//! covered by the lock.

use serde::Serialize;
use tracing::debug;

use kvsync_encoding::{
    delete_by_fields, encode, set_by_fields, EncodingError, Selector, SharedObject,
};
use kvsync_kvs::Store;

use crate::error::KvsyncResult;

/// Writes the object, or the sub-object at `fields`, to the store.
pub async fn store<S: Store + ?Sized>(
    kvs: &S,
    object: &SharedObject,
    format: &str,
    fields: &[Selector],
) -> KvsyncResult<()> {
    let pairs = {
        let guard = object.lock()?;
        encode(&guard, object.descriptor(), format, fields)?
    };
    debug!(format, pairs = pairs.len(), "Storing object");
    for (key, value) in &pairs {
        kvs.set(key, value).await?;
    }
    Ok(())
}

/// Sets the value at `fields` and writes it to the store.
pub async fn set<S, T>(
    kvs: &S,
    object: &SharedObject,
    format: &str,
    value: &T,
    fields: &[Selector],
) -> KvsyncResult<()>
where
    S: Store + ?Sized,
    T: Serialize + ?Sized,
{
    let value = serde_json::to_value(value).map_err(|e| EncodingError::Codec(e.to_string()))?;
    {
        let mut guard = object.lock()?;
        set_by_fields(&mut guard, object.descriptor(), format, value, fields)?;
    }
    store(kvs, object, format, fields).await
}

/// Removes the map entry at `fields` and deletes its keys from the store.
pub async fn delete<S: Store + ?Sized>(
    kvs: &S,
    object: &SharedObject,
    format: &str,
    fields: &[Selector],
) -> KvsyncResult<()> {
    let key = {
        let mut guard = object.lock()?;
        delete_by_fields(&mut guard, object.descriptor(), format, fields)?
    };
    debug!(key, "Deleting object");
    kvs.delete(&key).await?;
    Ok(())
}
