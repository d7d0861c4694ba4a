use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::KvsResult;
use crate::update::Update;

/// Write access to a key-value store.
#[async_trait]
pub trait Store: Send + Sync {
    /// Sets `key` to `value`.
    async fn set(&self, key: &str, value: &str) -> KvsResult<()>;

    /// Deletes `key`. A key ending with `/` deletes every key under it.
    async fn delete(&self, key: &str) -> KvsResult<()>;
}

/// Read access to a key-value store.
#[async_trait]
pub trait Get: Send + Sync {
    /// Returns the value of `key`, or `Ok(None)` if it is not set.
    async fn get(&self, key: &str) -> KvsResult<Option<String>>;
}

/// Stream of changes of a key-value store.
///
/// When the source is first opened, it must behave as if every existing
/// pair had just been created. There is no ordering guarantee between
/// updates of different keys.
#[async_trait]
pub trait ChangeSource: Send + Sync {
    /// Waits for the next change, or fails with
    /// [`KvsError::Cancelled`](crate::KvsError::Cancelled) once `cancel`
    /// fires.
    async fn next(&self, cancel: &CancellationToken) -> KvsResult<Update>;
}

#[async_trait]
impl<T: Store + ?Sized> Store for Arc<T> {
    async fn set(&self, key: &str, value: &str) -> KvsResult<()> {
        (**self).set(key, value).await
    }

    async fn delete(&self, key: &str) -> KvsResult<()> {
        (**self).delete(key).await
    }
}

#[async_trait]
impl<T: Get + ?Sized> Get for Arc<T> {
    async fn get(&self, key: &str) -> KvsResult<Option<String>> {
        (**self).get(key).await
    }
}

#[async_trait]
impl<T: ChangeSource + ?Sized> ChangeSource for Arc<T> {
    async fn next(&self, cancel: &CancellationToken) -> KvsResult<Update> {
        (**self).next(cancel).await
    }
}
