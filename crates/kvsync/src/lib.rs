//! Keep structured objects synchronized with a key-value store.
//!
//! kvsync maps an object onto a set of keys according to a *format*, and
//! back. Writers push objects (or parts of them) to the store with the
//! helpers of [`store`]; readers register objects with a [`SyncRouter`],
//! which applies every change of the store to the object it concerns and
//! reports it through a [`ChangeEvent`].
//!
//! # Crates
//!
//! - [`encoding`] -- descriptors, formats and the object/key mapping
//! - [`kvs`] -- key-value store interfaces and an in-memory backend
//! - [`sync`] -- change routing and change events

pub mod error;
pub mod store;

pub use kvsync_encoding as encoding;
pub use kvsync_kvs as kvs;
pub use kvsync_sync as sync;

pub use error::{KvsyncError, KvsyncResult};
pub use kvsync_encoding::{
    fields, Describe, DescribeKey, Descriptor, EncodingError, MapDescriptor, Scalar, ScalarKind,
    Selector, SharedObject, StructDescriptor,
};
pub use kvsync_kvs::{ChangeSource, Get, KvsError, MemoryKvs, Store, Update};
pub use kvsync_sync::{
    CallbackErrorPolicy, ChangeEvent, EventError, SyncConfig, SyncError, SyncObject, SyncRouter,
};
