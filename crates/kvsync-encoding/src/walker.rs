//! Object path walker.
//!
//! Every operation runs in two passes. The locate pass walks a read-only
//! view of the object together with its descriptor and its format, either
//! driven by a field path or by a key-path, and produces the canonical field
//! path of the target, its key-path and the part of the format that was not
//! consumed. Type and path errors are all detected there, before anything is
//! touched. The apply pass then follows the canonical field path on the
//! mutable object, creating missing intermediate values and rewriting map
//! entries through [`MapCursor`].

use serde_json::Value;
use tracing::{debug, warn};

use crate::codec;
use crate::descriptor::{Descriptor, MapDescriptor};
use crate::error::{EncodingError, EncodingResult};
use crate::format::{split_relative_key, Format, Segment};
use crate::map_cursor::MapCursor;
use crate::selector::{Scalar, Selector};

/// Position reached by a locate pass.
#[derive(Clone, Debug)]
pub(crate) struct Cursor<'a> {
    /// `None` once the walk went through an absent map entry or pointee.
    value: Option<&'a Value>,
    descriptor: &'a Descriptor,
    /// Type of the position before pointers were stripped. Leaf values are
    /// parsed and checked against it, so that `null` stays a valid pointer.
    declared: &'a Descriptor,
    keypath: Vec<String>,
    fields: Vec<Selector>,
    format: Format,
}

#[derive(Clone, Copy, Debug, Default)]
struct KeyOptions {
    /// Accept a key-path that stops at a recursive object, as deletions of
    /// whole subtrees do.
    accept_prefix: bool,
}

impl<'a> Cursor<'a> {
    pub(crate) fn new(value: &'a Value, descriptor: &'a Descriptor, format: Format) -> Self {
        Self {
            value: Some(value),
            descriptor,
            declared: descriptor,
            keypath: Vec::new(),
            fields: Vec::new(),
            format,
        }
    }

    /// A cursor for Key-mode walks, where a leading `/` carries no meaning.
    fn relative(value: &'a Value, descriptor: &'a Descriptor, format: &str) -> Self {
        let mut format = Format::parse(format);
        format.strip_root();
        Self::new(value, descriptor, format)
    }

    pub(crate) fn value(&self) -> Option<&'a Value> {
        self.value
    }

    pub(crate) fn descriptor(&self) -> &'a Descriptor {
        self.descriptor
    }

    pub(crate) fn declared(&self) -> &'a Descriptor {
        self.declared
    }

    pub(crate) fn keypath(&self) -> &[String] {
        &self.keypath
    }

    pub(crate) fn format(&self) -> &Format {
        &self.format
    }

    /// Key-path of the target followed by the unconsumed format.
    fn full_key(&self) -> String {
        let mut parts = self.keypath.clone();
        parts.extend(self.format.segments().map(|s| s.as_str().to_string()));
        parts.join("/")
    }

    fn deref(mut self) -> Self {
        while let Descriptor::Pointer(inner) = self.descriptor {
            self.value = self.value.filter(|v| !v.is_null());
            self.descriptor = inner;
        }
        self
    }

    /// Moves every leading literal of the format to the key-path.
    fn take_literals(&mut self) {
        while let Some(Segment::Literal(_)) = self.format.first() {
            if let Some(Segment::Literal(lit)) = self.format.pop_front() {
                self.keypath.push(lit);
            }
        }
    }

    /// Matches leading literals of the format against `path` and returns
    /// what is left of `path`. Stops early when `path` runs out.
    fn match_literals<'p>(&mut self, mut path: &'p [String]) -> EncodingResult<&'p [String]> {
        while let Some(Segment::Literal(lit)) = self.format.first() {
            let Some((head, rest)) = path.split_first() else {
                break;
            };
            if head != lit {
                return Err(EncodingError::PathNotFound);
            }
            self.keypath.push(head.clone());
            self.format.pop_front();
            path = rest;
        }
        Ok(path)
    }

    fn enter_field(&mut self, name: &str, descriptor: &'a Descriptor, format: Format) {
        self.value = self.value.and_then(|v| v.get(name));
        self.descriptor = descriptor;
        self.declared = descriptor;
        self.format = format;
        self.fields.push(Selector::field(name));
    }

    fn enter_map(&mut self, map: &'a MapDescriptor, key: Scalar) -> EncodingResult<()> {
        match self.format.pop_front() {
            Some(Segment::Key) => {}
            Some(Segment::Index) => return Err(EncodingError::NotImplemented("{index}")),
            _ => return Err(EncodingError::MapFormat),
        }
        let component = codec::serialize_key(&key);
        self.value = self
            .value
            .and_then(Value::as_object)
            .and_then(|entries| entries.get(&component));
        self.descriptor = map.value();
        self.declared = map.value();
        self.keypath.push(component);
        self.fields.push(Selector::Key(key));
        Ok(())
    }
}

/// A struct must be stored recursively to be walked into.
fn expect_end(format: &Format) -> EncodingResult<()> {
    match format.first() {
        Some(Segment::Key) => Err(EncodingError::StructFormat),
        Some(Segment::Index) => Err(EncodingError::NotImplemented("{index}")),
        _ => Ok(()),
    }
}

/// Locate pass driven by a field path.
pub(crate) fn locate_fields<'a>(
    cursor: Cursor<'a>,
    fields: &[Selector],
) -> EncodingResult<Cursor<'a>> {
    let mut cursor = cursor.deref();
    cursor.take_literals();

    let Some((selector, rest)) = fields.split_first() else {
        return Ok(cursor);
    };
    if cursor.format.is_empty() {
        return Err(EncodingError::PathPastObject);
    }

    let descriptor = cursor.descriptor;
    match descriptor {
        Descriptor::Struct(s) => {
            expect_end(&cursor.format)?;
            let name = selector
                .as_field_name()
                .ok_or(EncodingError::WrongFieldType)?;
            let field = s
                .field_by_name(name)
                .ok_or_else(|| EncodingError::WrongFieldName(name.to_string()))?;
            cursor.enter_field(field.name(), field.descriptor(), field.format()?);
        }
        Descriptor::Map(m) => {
            let key = selector
                .as_map_key(m.key())
                .ok_or(EncodingError::KeyWrongType)?;
            cursor.enter_map(m, key)?;
        }
        Descriptor::Sequence(_) => return Err(EncodingError::NotImplemented("sequence fields")),
        Descriptor::Scalar(_) | Descriptor::Opaque => return Err(EncodingError::ScalarType),
        Descriptor::Pointer(_) => return Err(EncodingError::UnsupportedType),
    }
    locate_fields(cursor, rest)
}

/// Locate pass driven by a key-path.
fn locate_key<'a>(
    cursor: Cursor<'a>,
    path: &[String],
    options: KeyOptions,
) -> EncodingResult<Cursor<'a>> {
    let mut cursor = cursor.deref();
    let path = cursor.match_literals(path)?;

    if cursor.format.is_empty() {
        return if path.is_empty() {
            Ok(cursor)
        } else {
            Err(EncodingError::PathPastObject)
        };
    }

    match path {
        [] => {
            return match cursor.format.first() {
                Some(Segment::Literal(_)) => Err(EncodingError::PathNotFound),
                _ if options.accept_prefix => Ok(cursor),
                _ => Err(EncodingError::KeyInvalid),
            };
        }
        [last] if last.is_empty() => return Ok(cursor),
        [first, ..] if first.is_empty() => return Err(EncodingError::KeyInvalid),
        _ => {}
    }

    let descriptor = cursor.descriptor;
    match descriptor {
        Descriptor::Struct(s) => {
            expect_end(&cursor.format)?;
            // First field whose literal prefix agrees with the path wins.
            for field in s.fields() {
                let mut candidate = cursor.clone();
                candidate.enter_field(field.name(), field.descriptor(), field.format()?);
                let Ok(rest) = candidate.match_literals(path) else {
                    continue;
                };
                return locate_key(candidate, rest, options);
            }
            Err(EncodingError::PathNotFound)
        }
        Descriptor::Map(m) => {
            let key = codec::deserialize_key(&path[0], m.key())?;
            cursor.enter_map(m, key)?;
            locate_key(cursor, &path[1..], options)
        }
        Descriptor::Sequence(_) => Err(EncodingError::NotImplemented("sequence keys")),
        Descriptor::Scalar(_) | Descriptor::Opaque => Err(EncodingError::ScalarType),
        Descriptor::Pointer(_) => Err(EncodingError::UnsupportedType),
    }
}

enum Mutation {
    /// Replace the target.
    Set(Value),
    /// Remove an entry of the target map.
    Remove(Scalar),
}

/// Apply pass: follows a canonical field path, creating what is missing.
fn apply(
    value: &mut Value,
    descriptor: &Descriptor,
    fields: &[Selector],
    mutation: Mutation,
) -> EncodingResult<()> {
    if let Descriptor::Pointer(inner) = descriptor {
        if value.is_null() {
            *value = inner.zero();
        }
        return apply(value, inner, fields, mutation);
    }

    let Some((selector, rest)) = fields.split_first() else {
        return match (mutation, descriptor) {
            (Mutation::Set(new), _) => {
                *value = new;
                Ok(())
            }
            (Mutation::Remove(key), Descriptor::Map(m)) => {
                MapCursor::new(value, m)?.remove(&key);
                Ok(())
            }
            (Mutation::Remove(_), _) => Err(EncodingError::NotMapIndex),
        };
    };

    match descriptor {
        Descriptor::Struct(s) => {
            let name = selector
                .as_field_name()
                .ok_or(EncodingError::WrongFieldType)?;
            let field = s
                .field_by_name(name)
                .ok_or_else(|| EncodingError::WrongFieldName(name.to_string()))?;
            if value.is_null() {
                *value = descriptor.zero();
            }
            let Value::Object(entries) = value else {
                return Err(EncodingError::MalformedValue(format!(
                    "expected struct {}, found {value}",
                    s.name()
                )));
            };
            let slot = entries
                .entry(name.to_string())
                .or_insert_with(|| field.descriptor().zero());
            apply(slot, field.descriptor(), rest, mutation)
        }
        Descriptor::Map(m) => {
            let key = selector
                .as_map_key(m.key())
                .ok_or(EncodingError::KeyWrongType)?;
            let mut entries = MapCursor::new(value, m)?;
            let (mut entry, created) = entries.take_or_create(&key);
            let result = apply(&mut entry, m.value(), rest, mutation);
            if result.is_ok() || !created {
                entries.put(&key, entry);
            }
            result
        }
        Descriptor::Sequence(_) => Err(EncodingError::NotImplemented("sequence fields")),
        _ => Err(EncodingError::ScalarType),
    }
}

/// Finds the value at a field path.
///
/// Returns the value together with its key: the key-path of the value
/// followed by the rest of its format, so a recursive object yields a key
/// ending with `/`.
pub fn find_by_fields<'a>(
    object: &'a Value,
    descriptor: &'a Descriptor,
    format: &str,
    fields: &[Selector],
) -> EncodingResult<(&'a Value, String)> {
    let cursor = locate_fields(Cursor::new(object, descriptor, Format::parse(format)), fields)?;
    let value = cursor.value.ok_or(EncodingError::KeyNotFound)?;
    Ok((value, cursor.full_key()))
}

/// Finds the value stored at a key-path, with the field path leading to it.
pub fn find_by_key<'a>(
    object: &'a Value,
    descriptor: &'a Descriptor,
    format: &str,
    key: &str,
) -> EncodingResult<(&'a Value, Vec<Selector>)> {
    let cursor = locate_key(
        Cursor::relative(object, descriptor, format),
        &split_relative_key(key),
        KeyOptions::default(),
    )?;
    let value = cursor.value.ok_or(EncodingError::KeyNotFound)?;
    Ok((value, cursor.fields))
}

/// Applies a stored key/value pair to `object`.
///
/// Missing map entries and pointees on the way are created. When `value`
/// cannot be parsed as the target type, the target is reset to its zero
/// value if `ignore_unmarshal_failure` is set, and the error is returned
/// otherwise. Returns the field path of the updated value.
pub fn update_key_object(
    object: &mut Value,
    descriptor: &Descriptor,
    format: &str,
    key: &str,
    value: &str,
    ignore_unmarshal_failure: bool,
) -> EncodingResult<Vec<Selector>> {
    let (fields, new_value) = {
        let cursor = locate_key(
            Cursor::relative(object, descriptor, format),
            &split_relative_key(key),
            KeyOptions::default(),
        )?;
        let new_value = match codec::deserialize(value, cursor.declared) {
            Ok(v) => v,
            Err(error) if ignore_unmarshal_failure => {
                warn!(key, %error, "Stored value does not parse, resetting to zero");
                cursor.declared.zero()
            }
            Err(error) => return Err(error),
        };
        (cursor.fields, new_value)
    };
    apply(object, descriptor, &fields, Mutation::Set(new_value))?;
    debug!(key, fields = fields.len(), "Applied stored value");
    Ok(fields)
}

/// Removes the map entry stored at a key-path.
///
/// The key-path may stop at a recursive object, which is what the deletion
/// of a whole subtree looks like. Returns the field path of the removed
/// entry.
pub fn delete_key_object(
    object: &mut Value,
    descriptor: &Descriptor,
    format: &str,
    key: &str,
) -> EncodingResult<Vec<Selector>> {
    let fields = locate_key(
        Cursor::relative(object, descriptor, format),
        &split_relative_key(key),
        KeyOptions {
            accept_prefix: true,
        },
    )?
    .fields;
    delete_by_fields(object, descriptor, format, &fields)?;
    Ok(fields)
}

/// Sets the value at a field path, creating missing intermediate values.
///
/// `value` must have the type of the target.
pub fn set_by_fields(
    object: &mut Value,
    descriptor: &Descriptor,
    format: &str,
    value: Value,
    fields: &[Selector],
) -> EncodingResult<()> {
    let (fields, value) = {
        let cursor =
            locate_fields(Cursor::new(object, descriptor, Format::parse(format)), fields)?;
        let value = cursor.declared.normalize(value)?;
        (cursor.fields, value)
    };
    apply(object, descriptor, &fields, Mutation::Set(value))
}

/// Replaces the value at a field path, which must already exist.
pub fn replace_by_fields(
    object: &mut Value,
    descriptor: &Descriptor,
    format: &str,
    value: Value,
    fields: &[Selector],
) -> EncodingResult<()> {
    let (fields, value) = {
        let cursor =
            locate_fields(Cursor::new(object, descriptor, Format::parse(format)), fields)?;
        if cursor.value.is_none() {
            return Err(EncodingError::SetNoExists);
        }
        let value = cursor.declared.normalize(value)?;
        (cursor.fields, value)
    };
    apply(object, descriptor, &fields, Mutation::Set(value))
}

/// Removes the map entry at a field path.
///
/// Returns the key under which the entry was stored, ending with `/` when
/// the entry was stored recursively, so that it can be deleted from the
/// store as a prefix.
pub fn delete_by_fields(
    object: &mut Value,
    descriptor: &Descriptor,
    format: &str,
    fields: &[Selector],
) -> EncodingResult<String> {
    let Some((last, parents)) = fields.split_last() else {
        return Err(EncodingError::NotMapIndex);
    };
    let (parents, key, stored_key) = {
        let parent = locate_fields(
            Cursor::new(object, descriptor, Format::parse(format)),
            parents,
        )?;
        let Descriptor::Map(m) = parent.descriptor else {
            return Err(EncodingError::NotMapIndex);
        };
        let key = last.as_map_key(m.key()).ok_or(EncodingError::KeyWrongType)?;
        let parents = parent.fields.clone();
        let entry = locate_fields(parent, std::slice::from_ref(last))?;
        if entry.value.is_none() {
            return Err(EncodingError::ObjectNotFound);
        }
        let mut stored_key = entry.keypath.join("/");
        if !entry.format.is_empty() {
            stored_key.push('/');
        }
        (parents, key, stored_key)
    };
    apply(object, descriptor, &parents, Mutation::Remove(key))?;
    Ok(stored_key)
}
