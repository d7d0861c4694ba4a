//! Type descriptors.
//!
//! Objects are handled as `serde_json::Value` trees. A [`Descriptor`] tells
//! the walker what static type sits at each position of such a tree, so
//! that it can keep going through absent values, create missing ones, and
//! parse leaf values with the right type.
//!
//! The JSON shape of each descriptor matches what `serde_json` produces for
//! the corresponding Rust type:
//!
//! - [`Descriptor::Struct`]: an object keyed by field name
//! - [`Descriptor::Map`]: an object keyed by the codec form of the key
//! - [`Descriptor::Pointer`]: `null` or the pointee
//! - [`Descriptor::Scalar`]: a string, number or boolean
//!
//! Recursive types are not supported.

use std::collections::{BTreeMap, HashMap};

use serde_json::{Map, Value};

use crate::codec;
use crate::error::{EncodingError, EncodingResult};
use crate::format::Format;
use crate::selector::Scalar;

/// Kind of a scalar leaf.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    String,
    /// Signed integer of the given bit width.
    Int(u32),
    /// Unsigned integer of the given bit width.
    Uint(u32),
    Float,
    Bool,
}

impl ScalarKind {
    pub const I64: ScalarKind = ScalarKind::Int(64);
    pub const U64: ScalarKind = ScalarKind::Uint(64);

    /// Smallest and largest value of an integer kind.
    fn bounds(self) -> Option<(i128, i128)> {
        match self {
            ScalarKind::Int(bits) => {
                let half = 1i128 << (bits.clamp(1, 64) - 1);
                Some((-half, half - 1))
            }
            ScalarKind::Uint(bits) => Some((0, (1i128 << bits.clamp(1, 64)) - 1)),
            _ => None,
        }
    }

    /// The integer `n` as a scalar of this kind. `None` when this is not an
    /// integer kind or `n` is out of its range.
    pub fn integer(self, n: i128) -> Option<Scalar> {
        let (min, max) = self.bounds()?;
        if n < min || n > max {
            return None;
        }
        match self {
            ScalarKind::Int(_) => i64::try_from(n).ok().map(Scalar::Int),
            _ => u64::try_from(n).ok().map(Scalar::Uint),
        }
    }
}

/// Static description of a type stored in a key-value space.
#[derive(Clone, Debug, PartialEq)]
pub enum Descriptor {
    /// A scalar leaf.
    Scalar(ScalarKind),
    /// Any JSON value. Only storable as a blob.
    Opaque,
    /// An optional value (`Option<T>`).
    Pointer(Box<Descriptor>),
    /// A record with named fields.
    Struct(StructDescriptor),
    /// An associative collection.
    Map(MapDescriptor),
    /// A list. Only storable as a blob.
    Sequence(Box<Descriptor>),
}

/// Fields of a struct, in declaration order.
#[derive(Clone, Debug, PartialEq)]
pub struct StructDescriptor {
    name: String,
    fields: Vec<FieldDescriptor>,
}

/// One struct field.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldDescriptor {
    name: String,
    tag: Option<String>,
    descriptor: Descriptor,
}

/// Key and value types of a map.
#[derive(Clone, Debug, PartialEq)]
pub struct MapDescriptor {
    key: ScalarKind,
    value: Box<Descriptor>,
}

impl StructDescriptor {
    /// Starts describing a struct.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// Adds a field stored under its own name.
    pub fn field<T: Describe>(self, name: impl Into<String>) -> Self {
        self.push(name.into(), None, T::describe())
    }

    /// Adds a field stored according to a format tag.
    ///
    /// The tag uses the format grammar: `"sub/"` stores the field
    /// recursively under `sub/`, `"in/blob"` stores it as a single value,
    /// `"map/{key}/"` stores every map entry under `map/<key>/`.
    pub fn field_with_format<T: Describe>(
        self,
        name: impl Into<String>,
        tag: impl Into<String>,
    ) -> Self {
        self.push(name.into(), Some(tag.into()), T::describe())
    }

    /// Adds a field with an explicit descriptor.
    pub fn field_with_descriptor(
        self,
        name: impl Into<String>,
        tag: Option<String>,
        descriptor: Descriptor,
    ) -> Self {
        self.push(name.into(), tag, descriptor)
    }

    fn push(mut self, name: String, tag: Option<String>, descriptor: Descriptor) -> Self {
        self.fields.push(FieldDescriptor {
            name,
            tag,
            descriptor,
        });
        self
    }

    /// Finishes the struct description.
    pub fn build(self) -> Descriptor {
        Descriptor::Struct(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// Looks up a field by name.
    pub fn field_by_name(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }
}

impl FieldDescriptor {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    pub fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    /// The format used to store this field relative to its struct.
    ///
    /// Without a tag, the field is stored as a blob under its own name.
    pub fn format(&self) -> EncodingResult<Format> {
        match &self.tag {
            None => Ok(Format::literal(&self.name)),
            Some(tag) if tag.is_empty() => Ok(Format::literal(&self.name)),
            Some(tag) => Format::parse_tag(tag),
        }
    }
}

impl MapDescriptor {
    pub fn new(key: ScalarKind, value: Descriptor) -> Self {
        Self {
            key,
            value: Box::new(value),
        }
    }

    pub fn key(&self) -> ScalarKind {
        self.key
    }

    pub fn value(&self) -> &Descriptor {
        &self.value
    }
}

impl Descriptor {
    /// Strips every pointer level.
    pub fn deref(&self) -> &Descriptor {
        let mut d = self;
        while let Descriptor::Pointer(inner) = d {
            d = inner;
        }
        d
    }

    /// The zero value of this type.
    pub fn zero(&self) -> Value {
        match self {
            Descriptor::Scalar(ScalarKind::String) => Value::String(String::new()),
            Descriptor::Scalar(ScalarKind::Int(_)) | Descriptor::Scalar(ScalarKind::Uint(_)) => {
                Value::from(0)
            }
            Descriptor::Scalar(ScalarKind::Float) => Value::from(0.0),
            Descriptor::Scalar(ScalarKind::Bool) => Value::Bool(false),
            Descriptor::Opaque | Descriptor::Pointer(_) => Value::Null,
            Descriptor::Struct(s) => Value::Object(
                s.fields
                    .iter()
                    .map(|f| (f.name.clone(), f.descriptor.zero()))
                    .collect(),
            ),
            Descriptor::Map(_) => Value::Object(Map::new()),
            Descriptor::Sequence(_) => Value::Array(Vec::new()),
        }
    }

    /// Checks that `value` has this type and returns its canonical form.
    ///
    /// Missing struct fields are filled with zero values and map keys are
    /// rewritten in their codec form. Any mismatch, including unknown
    /// struct fields, is [`EncodingError::SetWrongType`].
    pub fn normalize(&self, value: Value) -> EncodingResult<Value> {
        match (self, value) {
            (Descriptor::Pointer(_), Value::Null) => Ok(Value::Null),
            (Descriptor::Pointer(inner), v) => inner.normalize(v),
            (Descriptor::Opaque, v) => Ok(v),
            (Descriptor::Scalar(kind), v) => {
                if scalar_conforms(*kind, &v) {
                    Ok(v)
                } else {
                    Err(EncodingError::SetWrongType)
                }
            }
            (Descriptor::Struct(s), Value::Object(mut obj)) => {
                let mut out = Map::new();
                for field in &s.fields {
                    let v = match obj.remove(&field.name) {
                        Some(v) => field.descriptor.normalize(v)?,
                        None => field.descriptor.zero(),
                    };
                    out.insert(field.name.clone(), v);
                }
                if !obj.is_empty() {
                    return Err(EncodingError::SetWrongType);
                }
                Ok(Value::Object(out))
            }
            (Descriptor::Map(m), Value::Object(obj)) => {
                let mut out = Map::new();
                for (k, v) in obj {
                    let key = codec::deserialize_key(&k, m.key)
                        .map_err(|_| EncodingError::SetWrongType)?;
                    out.insert(codec::serialize_key(&key), m.value.normalize(v)?);
                }
                Ok(Value::Object(out))
            }
            (Descriptor::Sequence(elem), Value::Array(items)) => items
                .into_iter()
                .map(|v| elem.normalize(v))
                .collect::<EncodingResult<Vec<_>>>()
                .map(Value::Array),
            _ => Err(EncodingError::SetWrongType),
        }
    }
}

fn scalar_conforms(kind: ScalarKind, v: &Value) -> bool {
    match kind {
        ScalarKind::String => v.is_string(),
        ScalarKind::Int(_) | ScalarKind::Uint(_) => json_integer(v)
            .and_then(|n| kind.integer(n))
            .is_some(),
        ScalarKind::Float => v.is_number(),
        ScalarKind::Bool => v.is_boolean(),
    }
}

/// The value of an integral JSON number.
pub(crate) fn json_integer(v: &Value) -> Option<i128> {
    v.as_i64()
        .map(i128::from)
        .or_else(|| v.as_u64().map(i128::from))
}

/// Types that can describe themselves.
///
/// Implemented for primitives, `String`, `Option`, `Box`, maps, `Vec` and
/// `serde_json::Value`. Structs implement it with [`StructDescriptor`]:
///
/// ```
/// use kvsync_encoding::{Describe, Descriptor, StructDescriptor};
/// use std::collections::HashMap;
///
/// struct Edge {
///     from: String,
///     to: String,
/// }
///
/// impl Describe for Edge {
///     fn describe() -> Descriptor {
///         StructDescriptor::new("Edge")
///             .field_with_format::<String>("from", "node_id1")
///             .field_with_format::<String>("to", "node_id2")
///             .build()
///     }
/// }
///
/// let d = HashMap::<String, Edge>::describe();
/// assert!(matches!(d, Descriptor::Map(_)));
/// ```
pub trait Describe {
    fn describe() -> Descriptor;
}

/// Types usable as map keys.
pub trait DescribeKey {
    fn key_kind() -> ScalarKind;
}

macro_rules! describe_scalar {
    ($kind:ident: $($t:ty),*) => {
        $(
            impl Describe for $t {
                fn describe() -> Descriptor {
                    Descriptor::Scalar(ScalarKind::$kind)
                }
            }
        )*
    };
}

macro_rules! describe_int {
    ($kind:ident: $($t:ty),*) => {
        $(
            impl Describe for $t {
                fn describe() -> Descriptor {
                    Descriptor::Scalar(ScalarKind::$kind(<$t>::BITS))
                }
            }

            impl DescribeKey for $t {
                fn key_kind() -> ScalarKind {
                    ScalarKind::$kind(<$t>::BITS)
                }
            }
        )*
    };
}

macro_rules! describe_key {
    ($kind:ident: $($t:ty),*) => {
        $(
            impl DescribeKey for $t {
                fn key_kind() -> ScalarKind {
                    ScalarKind::$kind
                }
            }
        )*
    };
}

describe_scalar!(String: String);
describe_int!(Int: i8, i16, i32, i64, isize);
describe_int!(Uint: u8, u16, u32, u64, usize);
describe_scalar!(Float: f32, f64);
describe_scalar!(Bool: bool);

describe_key!(String: String);
describe_key!(Bool: bool);

impl Describe for Value {
    fn describe() -> Descriptor {
        Descriptor::Opaque
    }
}

impl<T: Describe> Describe for Option<T> {
    fn describe() -> Descriptor {
        Descriptor::Pointer(Box::new(T::describe()))
    }
}

impl<T: Describe> Describe for Box<T> {
    fn describe() -> Descriptor {
        T::describe()
    }
}

impl<T: Describe> Describe for Vec<T> {
    fn describe() -> Descriptor {
        Descriptor::Sequence(Box::new(T::describe()))
    }
}

impl<K: DescribeKey, V: Describe, S> Describe for HashMap<K, V, S> {
    fn describe() -> Descriptor {
        Descriptor::Map(MapDescriptor::new(K::key_kind(), V::describe()))
    }
}

impl<K: DescribeKey, V: Describe> Describe for BTreeMap<K, V> {
    fn describe() -> Descriptor {
        Descriptor::Map(MapDescriptor::new(K::key_kind(), V::describe()))
    }
}
