//! Change events.
//!
//! A [`ChangeEvent`] is handed to the callback of a synchronized object
//! every time the router applies a change to it. It holds the object and
//! the field path of the change, and lets the callback walk down that path
//! one step at a time. Each step either follows the path or fails, and a
//! failed event stays failed, so a callback can probe the shapes it cares
//! about and dispatch on whichever probe succeeds:
//!
//! ```ignore
//! let node = event.field("nodes");
//! let mut id = 0u32;
//! if node.map_value_with_key(&mut id).is_deleted() {
//!     forget(id);
//! }
//! ```

use serde::de::DeserializeOwned;
use serde_json::Value;

use kvsync_encoding::codec;
use kvsync_encoding::{Descriptor, Scalar, Selector};

use crate::error::{EventError, EventResult};

/// View of a synchronized object, positioned somewhere on the field path
/// of a change.
#[derive(Clone, Debug)]
pub struct ChangeEvent<'a> {
    /// `None` once the view went through a removed entry.
    current: Option<&'a Value>,
    descriptor: &'a Descriptor,
    fields: &'a [Selector],
    error: Option<EventError>,
}

impl<'a> ChangeEvent<'a> {
    /// An event positioned at the root of `object`.
    pub fn new(object: &'a Value, descriptor: &'a Descriptor, fields: &'a [Selector]) -> Self {
        Self {
            current: Some(object),
            descriptor,
            fields,
            error: None,
        }
    }

    fn fail(mut self, error: EventError) -> Self {
        self.error = Some(error);
        self
    }

    fn deref_pointers(mut self) -> Self {
        if self.error.is_some() {
            return self;
        }
        let Some(current) = self.current else {
            return self.fail(EventError::IsDeleted);
        };
        while let Descriptor::Pointer(inner) = self.descriptor {
            if current.is_null() {
                return self.fail(EventError::NilPointer);
            }
            // Pointers are transparent in the JSON form.
            self.descriptor = inner;
        }
        self
    }

    /// Steps into the struct field `name`.
    ///
    /// Fails with [`EventError::NotThisPath`] when the change is on another
    /// field.
    pub fn field(&self, name: &str) -> Self {
        let mut event = self.clone().deref_pointers();
        if event.error.is_some() {
            return event;
        }
        let Some((selector, rest)) = event.fields.split_first() else {
            return event.fail(EventError::NoMoreFields);
        };
        let Descriptor::Struct(s) = event.descriptor else {
            return event.fail(EventError::NotAStruct);
        };
        match selector {
            Selector::Field(f) if f == name => {}
            _ => return event.fail(EventError::NotThisPath),
        }
        let Some(field) = s.field_by_name(name) else {
            return event.fail(EventError::NotThisPath);
        };
        event.current = event.current.and_then(|v| v.get(name));
        event.descriptor = field.descriptor();
        event.fields = rest;
        event
    }

    /// Steps into the changed map entry.
    pub fn map_value(&self) -> Self {
        self.step_map(|_| Ok(()))
    }

    /// Steps into the changed map entry and stores its key in `key`.
    ///
    /// Fails with [`EventError::WrongKeyType`] when the key does not
    /// convert to `K`.
    pub fn map_value_with_key<K: DeserializeOwned>(&self, key: &mut K) -> Self {
        self.step_map(|k| {
            *key = serde_json::from_value(k.to_json()).map_err(|_| EventError::WrongKeyType)?;
            Ok(())
        })
    }

    fn step_map(&self, on_key: impl FnOnce(&Scalar) -> EventResult<()>) -> Self {
        let mut event = self.clone().deref_pointers();
        if event.error.is_some() {
            return event;
        }
        let Some((selector, rest)) = event.fields.split_first() else {
            return event.fail(EventError::NoMoreFields);
        };
        let Descriptor::Map(m) = event.descriptor else {
            return event.fail(EventError::NotAMap);
        };
        let Some(key) = selector.as_map_key(m.key()) else {
            return event.fail(EventError::WrongKeyType);
        };
        if let Err(error) = on_key(&key) {
            return event.fail(error);
        }
        let component = codec::serialize_key(&key);
        event.current = event.current.and_then(|v| v.get(&component));
        event.descriptor = m.value();
        event.fields = rest;
        event
    }

    /// Steps into the changed sequence element. Sequences cannot be stored
    /// recursively, so this always fails.
    pub fn index(&self, _index: &mut usize) -> Self {
        if self.error.is_some() {
            return self.clone();
        }
        self.clone().fail(EventError::NotImplemented("sequence elements"))
    }

    /// Whether the object at this position was removed by the change.
    pub fn is_deleted(&self) -> bool {
        self.error.is_none() && self.current.is_none() && self.fields.is_empty()
    }

    /// The first failure met while navigating, if any.
    pub fn error(&self) -> Option<&EventError> {
        self.error.as_ref()
    }

    /// Field path still to be consumed.
    pub fn remaining(&self) -> &'a [Selector] {
        self.fields
    }

    pub fn descriptor(&self) -> &'a Descriptor {
        self.descriptor
    }

    /// The object at this position.
    pub fn current(&self) -> EventResult<&'a Value> {
        if let Some(error) = &self.error {
            return Err(error.clone());
        }
        self.current.ok_or(EventError::IsDeleted)
    }

    fn leaf(&self) -> EventResult<&'a Value> {
        let event = self.clone().deref_pointers();
        match event.error {
            Some(error) => Err(error),
            None => event.current.ok_or(EventError::IsDeleted),
        }
    }

    pub fn as_str(&self) -> EventResult<&'a str> {
        self.leaf()?.as_str().ok_or(EventError::NotAString)
    }

    pub fn as_int(&self) -> EventResult<i64> {
        self.leaf()?.as_i64().ok_or(EventError::NotAnInt)
    }

    pub fn as_bool(&self) -> EventResult<bool> {
        self.leaf()?.as_bool().ok_or(EventError::NotABool)
    }

    /// A typed copy of the object at this position.
    pub fn deserialize<T: DeserializeOwned>(&self) -> EventResult<T> {
        serde_json::from_value(self.current()?.clone())
            .map_err(|e| EventError::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kvsync_encoding::{fields, MapDescriptor, ScalarKind, StructDescriptor};
    use serde_json::json;
    use std::collections::HashMap;

    fn s1() -> Descriptor {
        StructDescriptor::new("S1").field::<i64>("A").build()
    }

    fn root() -> Descriptor {
        StructDescriptor::new("S2")
            .field_with_descriptor("S", Some("S/".into()), s1())
            .field::<String>("B")
            .field_with_descriptor(
                "M",
                Some("map/{key}/s1/".into()),
                Descriptor::Map(MapDescriptor::new(ScalarKind::I64, s1())),
            )
            .field_with_format::<Option<bool>>("P", "P")
            .field_with_format::<HashMap<String, String>>("N", "n/{key}")
            .build()
    }

    fn object() -> Value {
        json!({
            "S": {"A": 5},
            "B": "nya",
            "M": {"123": {"A": 6}},
            "P": null,
            "N": {"x": "y"},
        })
    }

    #[test]
    fn walks_struct_fields() {
        let (o, d) = (object(), root());
        let path = fields!["S", "A"];
        let event = ChangeEvent::new(&o, &d, &path);
        assert_eq!(event.field("S").field("A").as_int(), Ok(5));
        assert_eq!(event.field("B").error(), Some(&EventError::NotThisPath));
        assert_eq!(
            event.field("S").field("A").field("X").error(),
            Some(&EventError::NoMoreFields)
        );
        assert_eq!(event.map_value().error(), Some(&EventError::NotAMap));
    }

    #[test]
    fn failures_are_sticky() {
        let (o, d) = (object(), root());
        let path = fields!["S", "A"];
        let failed = ChangeEvent::new(&o, &d, &path).field("B");
        assert_eq!(failed.field("S").error(), Some(&EventError::NotThisPath));
        assert_eq!(failed.as_str(), Err(EventError::NotThisPath));
        assert_eq!(failed.current(), Err(EventError::NotThisPath));
        assert!(!failed.is_deleted());
    }

    #[test]
    fn map_keys() {
        let (o, d) = (object(), root());
        let path = fields!["M", 123, "A"];
        let event = ChangeEvent::new(&o, &d, &path);

        let mut key = 0i64;
        let entry = event.field("M").map_value_with_key(&mut key);
        assert_eq!(key, 123);
        assert_eq!(entry.field("A").as_int(), Ok(6));

        let mut wrong = String::new();
        assert_eq!(
            event.field("M").map_value_with_key(&mut wrong).error(),
            Some(&EventError::WrongKeyType)
        );
        assert_eq!(event.field("M").field("A").error(), Some(&EventError::NotAStruct));
    }

    #[test]
    fn removed_entries() {
        let (o, d) = (object(), root());
        let path = fields!["M", 9];
        let event = ChangeEvent::new(&o, &d, &path);
        let entry = event.field("M").map_value();
        assert!(entry.is_deleted());
        assert_eq!(entry.current(), Err(EventError::IsDeleted));
        assert_eq!(entry.field("A").error(), Some(&EventError::IsDeleted));
        assert!(!event.field("M").is_deleted());
    }

    #[test]
    fn nil_pointers() {
        let (o, d) = (object(), root());
        let path = fields!["P"];
        let event = ChangeEvent::new(&o, &d, &path).field("P");
        assert_eq!(event.as_bool(), Err(EventError::NilPointer));
        assert_eq!(event.current(), Ok(&Value::Null));
    }

    #[test]
    fn typed_views() {
        let (o, d) = (object(), root());
        let path = fields!["N", "x"];
        let event = ChangeEvent::new(&o, &d, &path);
        let mut key = String::new();
        let entry = event.field("N").map_value_with_key(&mut key);
        assert_eq!(key, "x");
        assert_eq!(entry.as_str(), Ok("y"));
        assert_eq!(entry.as_int(), Err(EventError::NotAnInt));
        assert_eq!(
            event.index(&mut 0).error(),
            Some(&EventError::NotImplemented("sequence elements"))
        );

        let path = fields!["S", "A"];
        let event = ChangeEvent::new(&o, &d, &path);
        let s: HashMap<String, i64> = event.field("S").deserialize().unwrap();
        assert_eq!(s["A"], 5);
        assert!(matches!(
            event.field("B").deserialize::<String>(),
            Err(EventError::NotThisPath)
        ));
    }
}
