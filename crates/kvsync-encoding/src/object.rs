//! Shared live objects.

use std::sync::{Arc, Mutex, MutexGuard};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::descriptor::{Describe, Descriptor};
use crate::error::{EncodingError, EncodingResult};

/// A live object shared between the code that owns it and the router that
/// keeps it in sync.
///
/// The value is only reachable through [`SharedObject::lock`], so every
/// read and write of the object is serialized with the updates applied from
/// the store. Clones share the same object.
#[derive(Clone, Debug)]
pub struct SharedObject {
    descriptor: Arc<Descriptor>,
    value: Arc<Mutex<Value>>,
}

impl SharedObject {
    /// Wraps a value of type `descriptor`.
    pub fn new(descriptor: Descriptor, value: Value) -> EncodingResult<Self> {
        let value = descriptor.normalize(value)?;
        Ok(Self {
            descriptor: Arc::new(descriptor),
            value: Arc::new(Mutex::new(value)),
        })
    }

    /// The zero value of `T`.
    pub fn zeroed<T: Describe>() -> Self {
        let descriptor = T::describe();
        let value = descriptor.zero();
        Self {
            descriptor: Arc::new(descriptor),
            value: Arc::new(Mutex::new(value)),
        }
    }

    /// A copy of `object`.
    pub fn from_typed<T: Describe + Serialize>(object: &T) -> EncodingResult<Self> {
        let value =
            serde_json::to_value(object).map_err(|e| EncodingError::Codec(e.to_string()))?;
        Self::new(T::describe(), value)
    }

    pub fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    /// Locks the object.
    pub fn lock(&self) -> EncodingResult<MutexGuard<'_, Value>> {
        self.value
            .lock()
            .map_err(|e| EncodingError::Poisoned(e.to_string()))
    }

    /// A typed copy of the current state.
    pub fn snapshot<T: DeserializeOwned>(&self) -> EncodingResult<T> {
        let guard = self.lock()?;
        serde_json::from_value(guard.clone()).map_err(|e| EncodingError::Codec(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::StructDescriptor;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    struct Counter {
        name: String,
        hits: u64,
    }

    impl Describe for Counter {
        fn describe() -> Descriptor {
            StructDescriptor::new("Counter")
                .field::<String>("name")
                .field::<u64>("hits")
                .build()
        }
    }

    #[test]
    fn clones_share_state() {
        let a = SharedObject::from_typed(&Counter {
            name: "c".into(),
            hits: 1,
        })
        .unwrap();
        let b = a.clone();
        b.lock().unwrap()["hits"] = json!(2);
        assert_eq!(
            a.snapshot::<Counter>().unwrap(),
            Counter {
                name: "c".into(),
                hits: 2
            }
        );
    }

    #[test]
    fn zeroed_matches_default() {
        let o = SharedObject::zeroed::<Counter>();
        assert_eq!(o.snapshot::<Counter>().unwrap(), Counter::default());
    }

    #[test]
    fn new_checks_the_type() {
        assert_eq!(
            SharedObject::new(Counter::describe(), json!({"hits": "x"})).unwrap_err(),
            EncodingError::SetWrongType
        );
    }
}
