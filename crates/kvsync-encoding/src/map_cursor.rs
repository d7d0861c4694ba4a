//! Copy-modify-write access to map entries.
//!
//! Map entries are never mutated through a borrowed handle: the walker takes
//! the entry out (or a zero value when it is missing), mutates the owned
//! value and puts it back under the same key.

use serde_json::{Map, Value};

use crate::codec;
use crate::descriptor::MapDescriptor;
use crate::error::{EncodingError, EncodingResult};
use crate::selector::Scalar;

/// Entry-level access to one live map.
pub struct MapCursor<'a> {
    entries: &'a mut Map<String, Value>,
    descriptor: &'a MapDescriptor,
}

impl<'a> MapCursor<'a> {
    /// Opens a cursor over `value`, which must be a map of type `descriptor`.
    pub fn new(value: &'a mut Value, descriptor: &'a MapDescriptor) -> EncodingResult<Self> {
        if value.is_null() {
            *value = Value::Object(Map::new());
        }
        match value {
            Value::Object(entries) => Ok(Self {
                entries,
                descriptor,
            }),
            other => Err(EncodingError::MalformedValue(format!(
                "expected a map, found {other}"
            ))),
        }
    }

    /// A copy of the entry at `key`.
    pub fn get(&self, key: &Scalar) -> Option<Value> {
        self.entries.get(&codec::serialize_key(key)).cloned()
    }

    /// Moves the entry at `key` out of the map, or returns a zero value.
    ///
    /// The flag is `true` when the entry did not exist. The entry must be
    /// written back with [`MapCursor::put`].
    pub fn take_or_create(&mut self, key: &Scalar) -> (Value, bool) {
        match self.entries.remove(&codec::serialize_key(key)) {
            Some(entry) => (entry, false),
            None => (self.descriptor.value().zero(), true),
        }
    }

    /// Writes `value` at `key`.
    pub fn put(&mut self, key: &Scalar, value: Value) {
        self.entries.insert(codec::serialize_key(key), value);
    }

    /// Removes the entry at `key`. Returns `false` if it did not exist.
    pub fn remove(&mut self, key: &Scalar) -> bool {
        self.entries.remove(&codec::serialize_key(key)).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
