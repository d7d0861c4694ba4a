//! Bidirectional mapping between structured objects and flat key-value pairs.
//!
//! An object is stored under a *format*: a `/`-separated pattern that says
//! which keys hold which parts of the object. Struct fields and map entries
//! can each be stored as a single serialized value or spread recursively
//! over many keys, as chosen by the per-field format tags of its
//! [`Descriptor`].
//!
//! # Operations
//!
//! - [`encode`] -- flattens an object (or part of it) into key/value pairs
//! - [`update_key_object`] -- applies one stored pair back onto the object
//! - [`delete_key_object`] -- applies the deletion of a key or key prefix
//! - [`find_by_key`] / [`find_by_fields`] -- resolve a key-path or a field
//!   path without modifying anything
//! - [`set_by_fields`] / [`delete_by_fields`] -- programmatic edits, which
//!   report the keys to write back to the store
//!
//! # Design Rules
//!
//! 1. Objects are `serde_json::Value` trees described by a [`Descriptor`].
//! 2. Every mutation resolves its whole path before touching the object, so
//!    a failed operation leaves the object unchanged.
//! 3. Map entries are never mutated in place: they are taken out, modified
//!    and put back.
//! 4. Field paths are independent of the storage layout.

pub mod codec;
pub mod descriptor;
pub mod encoder;
pub mod error;
pub mod format;
pub mod map_cursor;
pub mod object;
pub mod selector;
mod walker;

// Re-export primary types at crate root for ergonomic imports.
pub use descriptor::{
    Describe, DescribeKey, Descriptor, FieldDescriptor, MapDescriptor, ScalarKind,
    StructDescriptor,
};
pub use encoder::encode;
pub use error::{EncodingError, EncodingResult};
pub use format::{prefix_collision, split_key, Format, Segment};
pub use map_cursor::MapCursor;
pub use object::SharedObject;
pub use selector::{Scalar, Selector};
pub use walker::{
    delete_by_fields, delete_key_object, find_by_fields, find_by_key, replace_by_fields,
    set_by_fields, update_key_object,
};
