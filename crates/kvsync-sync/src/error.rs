use kvsync_encoding::EncodingError;
use kvsync_kvs::KvsError;

use crate::router::RegistrationId;

/// Errors from the change router.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// The format shares a key prefix with an already synchronized object.
    #[error("format {format:?} overlaps the key space of {existing:?}")]
    Overlap { format: String, existing: String },

    /// No synchronized object uses this format.
    #[error("no object is synchronized with format {0:?}")]
    NotRegistered(String),

    /// A change callback failed.
    #[error("callback of registration {id} failed: {message}")]
    Callback { id: RegistrationId, message: String },

    /// Invalid router configuration.
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Encoding(#[from] EncodingError),

    #[error(transparent)]
    Kvs(#[from] KvsError),
}

/// Result alias for router operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Why a [`ChangeEvent`](crate::ChangeEvent) probe failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EventError {
    #[error("no more fields to consume")]
    NoMoreFields,

    #[error("object is not a structure")]
    NotAStruct,

    #[error("object is not a map")]
    NotAMap,

    #[error("object is not a string")]
    NotAString,

    #[error("object is not an integer")]
    NotAnInt,

    #[error("object is not a bool")]
    NotABool,

    /// The map key does not convert to the requested key type.
    #[error("map key type mismatch")]
    WrongKeyType,

    /// The change happened on another field.
    #[error("the modified object is not on this path")]
    NotThisPath,

    #[error("not implemented: {0}")]
    NotImplemented(&'static str),

    #[error("reached nil pointer")]
    NilPointer,

    /// The navigated object no longer exists.
    #[error("object is being deleted")]
    IsDeleted,

    /// The object does not convert to the requested type.
    #[error("cannot decode object: {0}")]
    Decode(String),
}

/// Result alias for event navigation.
pub type EventResult<T> = Result<T, EventError>;
