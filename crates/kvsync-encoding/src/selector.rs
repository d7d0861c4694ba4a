//! Abstract field paths.
//!
//! A field path is the list of [`Selector`]s leading from a root object to
//! one of its nested values: struct fields are selected by name, map entries
//! by their typed key. Field paths never depend on the storage layout, which
//! is what lets callers interpret a change without parsing keys.

use std::fmt;

use serde_json::Value;

use crate::descriptor::ScalarKind;

/// A scalar leaf value, used as a map key.
#[derive(Clone, Debug, PartialEq)]
pub enum Scalar {
    String(String),
    Int(i64),
    Uint(u64),
    Float(f64),
    Bool(bool),
}

impl Scalar {
    /// The kind of this scalar.
    pub fn kind(&self) -> ScalarKind {
        match self {
            Scalar::String(_) => ScalarKind::String,
            Scalar::Int(_) => ScalarKind::I64,
            Scalar::Uint(_) => ScalarKind::U64,
            Scalar::Float(_) => ScalarKind::Float,
            Scalar::Bool(_) => ScalarKind::Bool,
        }
    }

    /// Converts this scalar to the given kind.
    ///
    /// Integers convert to any integer kind whose range holds the value;
    /// every other kind must match exactly.
    pub fn coerce(&self, kind: ScalarKind) -> Option<Scalar> {
        match self {
            Scalar::Int(i) => kind.integer(i128::from(*i)),
            Scalar::Uint(u) => kind.integer(i128::from(*u)),
            s if s.kind() == kind => Some(s.clone()),
            _ => None,
        }
    }

    /// The JSON form of this scalar.
    pub fn to_json(&self) -> Value {
        match self {
            Scalar::String(s) => Value::String(s.clone()),
            Scalar::Int(i) => Value::from(*i),
            Scalar::Uint(u) => Value::from(*u),
            Scalar::Float(f) => Value::from(*f),
            Scalar::Bool(b) => Value::Bool(*b),
        }
    }

    /// Returns the string if this is a string scalar.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Scalar::String(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::String(s) => f.write_str(s),
            Scalar::Int(i) => write!(f, "{i}"),
            Scalar::Uint(u) => write!(f, "{u}"),
            Scalar::Float(x) => write!(f, "{x}"),
            Scalar::Bool(b) => write!(f, "{b}"),
        }
    }
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self {
        Scalar::String(s.to_string())
    }
}

impl From<String> for Scalar {
    fn from(s: String) -> Self {
        Scalar::String(s)
    }
}

impl From<bool> for Scalar {
    fn from(b: bool) -> Self {
        Scalar::Bool(b)
    }
}

impl From<f64> for Scalar {
    fn from(f: f64) -> Self {
        Scalar::Float(f)
    }
}

macro_rules! scalar_from_int {
    ($variant:ident, $target:ty: $($t:ty),*) => {
        $(
            impl From<$t> for Scalar {
                fn from(v: $t) -> Self {
                    Scalar::$variant(v as $target)
                }
            }
        )*
    };
}

scalar_from_int!(Int, i64: i8, i16, i32, i64);
scalar_from_int!(Uint, u64: u8, u16, u32, u64);

/// One step of a field path.
#[derive(Clone, Debug, PartialEq)]
pub enum Selector {
    /// A struct field, by name.
    Field(String),
    /// A map entry, by key.
    Key(Scalar),
}

impl Selector {
    /// Selects a struct field.
    pub fn field(name: impl Into<String>) -> Self {
        Selector::Field(name.into())
    }

    /// Selects a map entry.
    pub fn key(key: impl Into<Scalar>) -> Self {
        Selector::Key(key.into())
    }

    /// The field name this selector designates, if any.
    ///
    /// A string key is accepted as a field name.
    pub fn as_field_name(&self) -> Option<&str> {
        match self {
            Selector::Field(name) => Some(name),
            Selector::Key(Scalar::String(name)) => Some(name),
            Selector::Key(_) => None,
        }
    }

    /// The map key this selector designates, converted to `kind`.
    ///
    /// A field name is accepted as a string key.
    pub fn as_map_key(&self, kind: ScalarKind) -> Option<Scalar> {
        match self {
            Selector::Field(name) if kind == ScalarKind::String => {
                Some(Scalar::String(name.clone()))
            }
            Selector::Field(_) => None,
            Selector::Key(key) => key.coerce(kind),
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::Field(name) => f.write_str(name),
            Selector::Key(key) => write!(f, "[{key}]"),
        }
    }
}

impl From<&str> for Selector {
    fn from(name: &str) -> Self {
        Selector::Field(name.to_string())
    }
}

impl From<String> for Selector {
    fn from(name: String) -> Self {
        Selector::Field(name)
    }
}

impl From<Scalar> for Selector {
    fn from(key: Scalar) -> Self {
        Selector::Key(key)
    }
}

/// Builds a field path from heterogeneous selectors.
///
/// String literals become field selectors; anything else must already be a
/// [`Selector`] or convert into a [`Scalar`] through [`Selector::key`].
#[macro_export]
macro_rules! fields {
    () => { ::std::vec::Vec::<$crate::Selector>::new() };
    ($($sel:expr),+ $(,)?) => { vec![$($crate::selector::IntoSelector::into_selector($sel)),+] };
}

/// Conversion used by the [`fields!`] macro.
pub trait IntoSelector {
    fn into_selector(self) -> Selector;
}

impl IntoSelector for Selector {
    fn into_selector(self) -> Selector {
        self
    }
}

impl IntoSelector for &str {
    fn into_selector(self) -> Selector {
        Selector::Field(self.to_string())
    }
}

impl IntoSelector for String {
    fn into_selector(self) -> Selector {
        Selector::Field(self)
    }
}

impl IntoSelector for bool {
    fn into_selector(self) -> Selector {
        Selector::Key(Scalar::Bool(self))
    }
}

macro_rules! int_into_selector {
    ($($t:ty),*) => {
        $(
            impl IntoSelector for $t {
                fn into_selector(self) -> Selector {
                    Selector::Key(Scalar::from(self))
                }
            }
        )*
    };
}

int_into_selector!(i8, i16, i32, i64, u8, u16, u32, u64);
