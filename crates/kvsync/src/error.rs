use kvsync_encoding::EncodingError;
use kvsync_kvs::KvsError;
use kvsync_sync::SyncError;

/// Any error raised by kvsync.
#[derive(Debug, thiserror::Error)]
pub enum KvsyncError {
    #[error(transparent)]
    Encoding(#[from] EncodingError),

    #[error(transparent)]
    Kvs(#[from] KvsError),

    #[error(transparent)]
    Sync(#[from] SyncError),
}

/// Result alias for kvsync operations.
pub type KvsyncResult<T> = Result<T, KvsyncError>;
