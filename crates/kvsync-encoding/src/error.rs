use thiserror::Error;

/// Errors produced while mapping objects to and from key-value pairs.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EncodingError {
    /// A struct field was addressed with something other than a field name.
    #[error("provided field is of wrong type")]
    WrongFieldType,

    /// The struct has no field with this name.
    #[error("provided field does not exist: {0}")]
    WrongFieldName(String),

    /// A map was addressed with a key of the wrong type.
    #[error("provided map key is of wrong type")]
    KeyWrongType,

    /// The addressed map entry (or pointee) does not exist.
    #[error("key was not found in map")]
    KeyNotFound,

    /// The object to encode or delete does not exist.
    #[error("object was not found")]
    ObjectNotFound,

    /// The path continues inside an object stored as a single blob.
    #[error("provided path goes past an encoded object")]
    PathPastObject,

    /// No object is stored at the given key-path.
    #[error("object not found at specified path")]
    PathNotFound,

    /// The key-path stops before reaching a stored value.
    #[error("invalid key for this object")]
    KeyInvalid,

    /// A value was set on an object that does not exist.
    #[error("cannot set non existent object")]
    SetNoExists,

    /// The value to set does not have the type of the target.
    #[error("the provided object is of wrong type")]
    SetWrongType,

    /// A scalar type was given a recursive format.
    #[error("cannot recursively store scalar type")]
    ScalarType,

    /// The type cannot be stored at all.
    #[error("object type not supported")]
    UnsupportedType,

    /// Sequences are not supported yet.
    #[error("not implemented: {0}")]
    NotImplemented(&'static str),

    /// A field format tag starts with `/`.
    #[error("structure field tag cannot start with /: {0:?}")]
    TagFirstSlash(String),

    /// A map was reached while the format did not provide `{key}`.
    #[error("map format must contain a '{{key}}' element")]
    MapFormat,

    /// `{key}` was reached on a type that is not a map.
    #[error("'{{key}}' format element used on a non-map type")]
    StructFormat,

    /// Two paths of the same object encode to the same key.
    #[error("key {key:?} is already used by value {value:?}")]
    DuplicateKey { key: String, value: String },

    /// The deleted object is not a map entry.
    #[error("specified object is not a map index")]
    NotMapIndex,

    /// A key-path component cannot be read as the map key type.
    #[error("invalid map key {segment:?}: {reason}")]
    InvalidMapKey { segment: String, reason: String },

    /// A stored value cannot be read as the target type.
    #[error("codec error: {0}")]
    Codec(String),

    /// A live value does not have the shape its descriptor declares.
    #[error("malformed value: {0}")]
    MalformedValue(String),

    /// The lock protecting a shared object was poisoned.
    #[error("object lock poisoned: {0}")]
    Poisoned(String),
}

/// Result alias for encoding operations.
pub type EncodingResult<T> = Result<T, EncodingError>;
